//! Pass-through codec that moves raw bytes without framing

use crate::codec::{Codec, Header, MessageType};
use crate::payload::{Payload, PayloadMut};
use mesh_core::{MeshError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// NoopCodec copies bytes in and out of payloads unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCodec;

impl NoopCodec {
    pub fn new() -> Self {
        Self
    }

    /// Headers are not framed; nothing is read
    pub async fn read_header<R>(
        &self,
        _conn: &mut R,
        _header: &mut Header,
        _kind: MessageType,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        Ok(())
    }

    /// Drain `conn` and write everything read into `target`
    pub async fn read_body<R>(&self, conn: &mut R, target: Option<PayloadMut<'_>>) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = Vec::new();
        conn.read_to_end(&mut buf).await?;
        trace!(bytes = buf.len(), "Read body");
        self.unmarshal(&buf, target)
    }

    /// Marshal `payload` and write all of its bytes to `conn`
    pub async fn write<W>(&self, conn: &mut W, _header: &Header, payload: Option<&Payload>) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if payload.is_none() {
            return Ok(());
        }
        let bytes = self.marshal(payload)?;
        conn.write_all(&bytes).await?;
        trace!(bytes = bytes.len(), "Wrote body");
        Ok(())
    }
}

impl Codec for NoopCodec {
    fn name(&self) -> &str {
        "noop"
    }

    fn content_type(&self) -> &str {
        "application/octet-stream"
    }

    fn marshal(&self, payload: Option<&Payload>) -> Result<Vec<u8>> {
        let Some(payload) = payload else {
            return Ok(Vec::new());
        };

        match payload {
            Payload::RawFrame(frame) => Ok(frame.data.clone()),
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Envelope(envelope) => Ok(envelope.body.clone()),
            Payload::Value(_) => Err(MeshError::UnsupportedPayload(format!(
                "{} codec cannot marshal a {} payload",
                self.name(),
                payload.shape()
            ))),
        }
    }

    fn unmarshal(&self, data: &[u8], target: Option<PayloadMut<'_>>) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };

        match target {
            PayloadMut::Frame(frame) => frame.data = data.to_vec(),
            PayloadMut::Text(text) => {
                *text = String::from_utf8(data.to_vec()).map_err(|e| {
                    MeshError::Decoding(format!("{} codec text target: {}", self.name(), e))
                })?
            }
            PayloadMut::Bytes(bytes) => *bytes = data.to_vec(),
            PayloadMut::Envelope(envelope) => envelope.body = data.to_vec(),
            PayloadMut::Value(_) => {
                return Err(MeshError::UnsupportedPayload(format!(
                    "{} codec cannot unmarshal into a value target",
                    self.name()
                )))
            }
        }
        Ok(())
    }
}
