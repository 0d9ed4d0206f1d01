//! In-process broker

use crate::broker::{Broker, BrokerMessage, BrokerOptions, BrokerPublishOptions};
use async_trait::async_trait;
use mesh_codec::Codec;
use mesh_core::{Context, MeshError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Capacity of each topic's subscriber channel
const SUBSCRIBER_CAPACITY: usize = 256;

/// MemoryBroker records published messages per topic and fans them out to
/// in-process subscribers
pub struct MemoryBroker {
    options: BrokerOptions,
    connected: AtomicBool,
    messages: Arc<RwLock<HashMap<String, Vec<BrokerMessage>>>>,
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<BrokerMessage>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_options(BrokerOptions::default())
    }

    pub fn with_options(options: BrokerOptions) -> Self {
        Self {
            options,
            connected: AtomicBool::new(false),
            messages: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Broker whose options name a default codec
    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self::with_options(BrokerOptions { codec: Some(codec) })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drop the connection; publishes fail until the next connect
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Receive every message published to `topic` from now on
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<BrokerMessage> {
        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_CAPACITY).0)
            .subscribe()
    }

    /// Messages published to `topic` so far
    pub async fn messages(&self, topic: &str) -> Vec<BrokerMessage> {
        let messages = self.messages.read().await;
        messages.get(topic).cloned().unwrap_or_default()
    }

    /// Topics that have received at least one message
    pub async fn topics(&self) -> Vec<String> {
        let messages = self.messages.read().await;
        let mut topics: Vec<String> = messages.keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    fn options(&self) -> &BrokerOptions {
        &self.options
    }

    async fn connect(&self, ctx: &Context) -> Result<()> {
        if ctx.is_done() {
            return Err(MeshError::Cancelled("broker connect".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        ctx: &Context,
        topic: &str,
        message: BrokerMessage,
        opts: BrokerPublishOptions,
    ) -> Result<()> {
        if !self.is_connected() {
            return Err(MeshError::backend(self.name(), "not connected"));
        }
        if ctx.is_done() || opts.context.as_ref().is_some_and(Context::is_done) {
            return Err(MeshError::Cancelled(format!("publish to {}", topic)));
        }

        {
            let mut messages = self.messages.write().await;
            messages
                .entry(topic.to_string())
                .or_default()
                .push(message.clone());
        }

        let subscribers = self.subscribers.read().await;
        if let Some(tx) = subscribers.get(topic) {
            // no receivers left is not a publish failure
            let delivered = tx.send(message).unwrap_or(0);
            debug!("Published to {} ({} subscriber(s))", topic, delivered);
        } else {
            debug!("Published to {}", topic);
        }
        Ok(())
    }
}
