//! Payload codecs
pub mod codec;
pub mod json;
pub mod noop;
pub mod payload;

pub use codec::{Codec, Header, MessageType};
pub use json::JsonCodec;
pub use noop::NoopCodec;
pub use payload::{Envelope, Frame, Payload, PayloadMut};
