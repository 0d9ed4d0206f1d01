//! Message broker backends
pub mod broker;
pub mod memory;

pub use broker::{Broker, BrokerMessage, BrokerOptions, BrokerPublishOptions};
pub use memory::MemoryBroker;
