//! Publish pipeline: body resolution, header enrichment and topic routing

use crate::message::Message;
use crate::options::PublishOptions;
use mesh_broker::{Broker, BrokerMessage, BrokerPublishOptions};
use mesh_codec::{Codec, JsonCodec, Payload};
use mesh_core::metadata::{HEADER_CONTENT_TYPE, HEADER_TOPIC};
use mesh_core::metrics::{self, NoopReporter, Reporter};
use mesh_core::{Context, MeshError, Result};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Publishes messages to a broker backend.
///
/// There is no internal retry; a failed publish is reported to the caller.
pub struct Publisher {
    broker: Arc<dyn Broker>,
    default_codec: Arc<dyn Codec>,
    reporter: Arc<dyn Reporter>,
}

impl Publisher {
    /// Publisher falling back to JSON when the broker names no codec
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            default_codec: Arc::new(JsonCodec),
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Codec used when the broker options carry none
    pub fn with_default_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.default_codec = codec;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn publish(
        &self,
        ctx: &Context,
        message: &Message,
        options: PublishOptions,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.publish_inner(ctx, message, options).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        let tags = metrics::tags([("status", status)]);
        let outcome = self
            .reporter
            .count("broker.publish", 1, &tags)
            .and_then(|_| {
                self.reporter
                    .timing("broker.publish.duration", started.elapsed(), &tags)
            });
        if let Err(e) = outcome {
            warn!("Failed to report publish metrics: {}", e);
        }

        result
    }

    async fn publish_inner(
        &self,
        ctx: &Context,
        message: &Message,
        options: PublishOptions,
    ) -> Result<()> {
        self.broker
            .connect(ctx)
            .await
            .map_err(|e| MeshError::BrokerUnavailable(Box::new(e)))?;

        let codec = self.codec();
        let content_type = message
            .content_type
            .clone()
            .unwrap_or_else(|| codec.content_type().to_string());

        let mut header = ctx.metadata().cloned().unwrap_or_default();
        header.insert(HEADER_CONTENT_TYPE.to_string(), content_type);
        header.insert(HEADER_TOPIC.to_string(), message.topic.clone());

        let body = Self::resolve_body(codec.as_ref(), message)?;

        let topic = options
            .effective_exchange()
            .unwrap_or(message.topic.as_str())
            .to_string();

        debug!(topic = %topic, bytes = body.len(), "Publishing message");
        self.broker
            .publish(
                ctx,
                &topic,
                BrokerMessage { header, body },
                BrokerPublishOptions {
                    context: options.context,
                },
            )
            .await
    }

    /// The broker's codec, or the default when it names none
    fn codec(&self) -> Arc<dyn Codec> {
        self.broker
            .options()
            .codec
            .clone()
            .unwrap_or_else(|| self.default_codec.clone())
    }

    fn resolve_body(codec: &dyn Codec, message: &Message) -> Result<Vec<u8>> {
        if let Some(Payload::RawFrame(frame)) = &message.payload {
            trace!("Raw frame payload, skipping codec");
            return Ok(frame.data.clone());
        }

        trace!(codec = codec.name(), "Marshaling payload");
        codec
            .marshal(message.payload.as_ref())
            .map_err(|e| MeshError::Encoding(Box::new(e)))
    }
}
