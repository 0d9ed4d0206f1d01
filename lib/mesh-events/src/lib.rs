//! Event options and an in-memory event store with live subscriptions
pub mod options;
pub mod store;

pub use options::{PublishOptions, ReadOptions, SubscribeOptions, WriteOptions};
pub use store::{Event, MemoryStore};
