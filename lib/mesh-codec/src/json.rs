//! JSON codec, the built-in default for publishing

use crate::codec::Codec;
use crate::payload::{Payload, PayloadMut};
use mesh_core::Result;

/// JsonCodec encodes payloads with serde_json.
///
/// Raw frames are passed through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn marshal(&self, payload: Option<&Payload>) -> Result<Vec<u8>> {
        let Some(payload) = payload else {
            return Ok(Vec::new());
        };

        let bytes = match payload {
            Payload::RawFrame(frame) => frame.data.clone(),
            Payload::Text(text) => serde_json::to_vec(text)?,
            Payload::Bytes(bytes) => serde_json::to_vec(bytes)?,
            Payload::Envelope(envelope) => serde_json::to_vec(envelope)?,
            Payload::Value(value) => serde_json::to_vec(value)?,
        };
        Ok(bytes)
    }

    fn unmarshal(&self, data: &[u8], target: Option<PayloadMut<'_>>) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        if data.is_empty() {
            return Ok(());
        }

        match target {
            PayloadMut::Frame(frame) => frame.data = data.to_vec(),
            PayloadMut::Text(text) => *text = serde_json::from_slice(data)?,
            PayloadMut::Bytes(bytes) => *bytes = serde_json::from_slice(data)?,
            PayloadMut::Envelope(envelope) => *envelope = serde_json::from_slice(data)?,
            PayloadMut::Value(value) => *value = serde_json::from_slice(data)?,
        }
        Ok(())
    }
}
