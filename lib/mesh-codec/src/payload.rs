//! Payload shapes understood by codecs

use mesh_core::Metadata;
use serde::{Deserialize, Serialize};

/// Pre-encoded bytes that bypass codec marshaling
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// Header plus body, marshaled by the no-op codec as its body alone
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Metadata,
    pub body: Vec<u8>,
}

/// A payload handed to a codec for marshaling
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    RawFrame(Frame),
    Text(String),
    Bytes(Vec<u8>),
    Envelope(Envelope),
    /// Structured value; only structured codecs can encode it
    Value(serde_json::Value),
}

impl Payload {
    /// Short name of the active variant
    pub fn shape(&self) -> &'static str {
        match self {
            Payload::RawFrame(_) => "raw frame",
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "bytes",
            Payload::Envelope(_) => "envelope",
            Payload::Value(_) => "value",
        }
    }
}

impl From<Frame> for Payload {
    fn from(frame: Frame) -> Self {
        Payload::RawFrame(frame)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Envelope> for Payload {
    fn from(envelope: Envelope) -> Self {
        Payload::Envelope(envelope)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

/// A mutable target that decoded bytes are written into
#[derive(Debug)]
pub enum PayloadMut<'a> {
    Frame(&'a mut Frame),
    Text(&'a mut String),
    Bytes(&'a mut Vec<u8>),
    /// Only the body is written
    Envelope(&'a mut Envelope),
    Value(&'a mut serde_json::Value),
}

impl PayloadMut<'_> {
    pub fn shape(&self) -> &'static str {
        match self {
            PayloadMut::Frame(_) => "raw frame",
            PayloadMut::Text(_) => "text",
            PayloadMut::Bytes(_) => "bytes",
            PayloadMut::Envelope(_) => "envelope",
            PayloadMut::Value(_) => "value",
        }
    }
}

impl<'a> From<&'a mut Frame> for PayloadMut<'a> {
    fn from(frame: &'a mut Frame) -> Self {
        PayloadMut::Frame(frame)
    }
}

impl<'a> From<&'a mut String> for PayloadMut<'a> {
    fn from(text: &'a mut String) -> Self {
        PayloadMut::Text(text)
    }
}

impl<'a> From<&'a mut Vec<u8>> for PayloadMut<'a> {
    fn from(bytes: &'a mut Vec<u8>) -> Self {
        PayloadMut::Bytes(bytes)
    }
}

impl<'a> From<&'a mut Envelope> for PayloadMut<'a> {
    fn from(envelope: &'a mut Envelope) -> Self {
        PayloadMut::Envelope(envelope)
    }
}

impl<'a> From<&'a mut serde_json::Value> for PayloadMut<'a> {
    fn from(value: &'a mut serde_json::Value) -> Self {
        PayloadMut::Value(value)
    }
}
