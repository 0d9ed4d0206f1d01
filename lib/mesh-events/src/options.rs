//! Options for publishing, subscribing to, writing and reading events

use chrono::{DateTime, Utc};
use mesh_core::Metadata;
use std::time::Duration;

/// Options applied when publishing an event
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    /// Keys the event can later be queried by, for example a customer id
    pub metadata: Metadata,
    /// Event time; `None` means now
    pub timestamp: Option<DateTime<Utc>>,
}

impl PublishOptions {
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.metadata = metadata.clone();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Options applied when subscribing to a topic
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    /// Subscribers sharing a queue name split the topic's new events
    /// between them, one member per event
    pub queue: Option<String>,
    /// Replay events from this time; `None` starts at subscription time
    pub start_at: Option<DateTime<Utc>>,
}

impl SubscribeOptions {
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_start_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }
}

/// Options applied when writing an event to a store
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// How long the event is kept; zero keeps it indefinitely
    pub ttl: Duration,
}

impl WriteOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Options applied when reading events from a store
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Only events on this topic; `None` reads every topic
    pub topic: Option<String>,
    /// Metadata every returned event must match
    pub query: Metadata,
    /// Maximum number of events; `None` is unbounded
    pub limit: Option<usize>,
    /// Events to skip, for pagination
    pub offset: usize,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add a key/value pair to the query
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
