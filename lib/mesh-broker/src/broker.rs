//! Broker backend contract

use async_trait::async_trait;
use mesh_codec::Codec;
use mesh_core::{Context, Metadata, Result};
use std::fmt;
use std::sync::Arc;

/// Message as handed to the broker
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerMessage {
    pub header: Metadata,
    pub body: Vec<u8>,
}

/// Broker-wide settings
#[derive(Clone, Default)]
pub struct BrokerOptions {
    /// Codec publishers should use for non-raw payloads
    pub codec: Option<Arc<dyn Codec>>,
}

impl fmt::Debug for BrokerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerOptions")
            .field("codec", &self.codec.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

/// Per-publish settings
#[derive(Clone, Debug, Default)]
pub struct BrokerPublishOptions {
    /// Context scoped to the publish itself, separate from the call context
    pub context: Option<Context>,
}

/// Pluggable message broker
#[async_trait]
pub trait Broker: Send + Sync {
    /// Identifier stamped into node metadata
    fn name(&self) -> &str;

    fn options(&self) -> &BrokerOptions;

    async fn connect(&self, ctx: &Context) -> Result<()>;

    async fn publish(
        &self,
        ctx: &Context,
        topic: &str,
        message: BrokerMessage,
        opts: BrokerPublishOptions,
    ) -> Result<()>;
}
