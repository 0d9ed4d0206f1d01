//! Messages sent through the publish pipeline

use mesh_codec::Payload;

/// An event bound for a topic
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub topic: String,
    /// `None` publishes an empty body
    pub payload: Option<Payload>,
    /// `None` takes the content type of the codec that encodes the body
    pub content_type: Option<String>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            topic: topic.into(),
            payload: Some(payload.into()),
            content_type: None,
        }
    }

    /// Message without a payload
    pub fn empty(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: None,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
