//! Client-side message publication
pub mod message;
pub mod options;
pub mod publish;

pub use message::Message;
pub use options::PublishOptions;
pub use publish::Publisher;
