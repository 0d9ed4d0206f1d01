//! Codec contract and the message header exchanged by framing codecs

use crate::payload::{Payload, PayloadMut};
use mesh_core::{Metadata, Result};

/// Kind of message being framed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageType {
    #[default]
    Request,
    Response,
    Event,
    Error,
}

/// Codec-level message header
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub id: String,
    pub kind: MessageType,
    pub target: String,
    pub method: String,
    pub endpoint: String,
    pub error: String,
    pub header: Metadata,
}

/// Marshals payloads to bytes and decodes bytes into payload targets
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// MIME type of the bytes this codec produces
    fn content_type(&self) -> &str;

    /// `None` marshals to empty bytes
    fn marshal(&self, payload: Option<&Payload>) -> Result<Vec<u8>>;

    /// A `None` target accepts and discards the data
    fn unmarshal(&self, data: &[u8], target: Option<PayloadMut<'_>>) -> Result<()>;
}
