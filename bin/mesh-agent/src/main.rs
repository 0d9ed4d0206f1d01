use anyhow::Result;
use mesh_broker::{Broker, MemoryBroker};
use mesh_client::{Message, PublishOptions, Publisher};
use mesh_core::{
    AddressResolver, BackendIdentity, Context, MemoryRegistry, PrometheusReporter, Registry,
    ServiceDescriptor,
};
use mesh_server::{build_service_descriptor, RegistrationManager};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::AgentConfig;

/// Server implementation name stamped into node metadata
const SERVER_NAME: &str = "mesh";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting mesh-agent...");

    let config = AgentConfig::load()?;
    let registration = &config.server.registration;

    let registry = Arc::new(MemoryRegistry::new());
    let broker = Arc::new(MemoryBroker::new());
    let reporter = Arc::new(PrometheusReporter::new(&config.metrics_namespace));

    let identity = BackendIdentity {
        server: SERVER_NAME.to_string(),
        broker: broker.name().to_string(),
        registry: registry.name().to_string(),
    };
    let service = build_service_descriptor(&config.server, &identity, &AddressResolver::new())?;
    info!(
        "Service {} v{} resolved to {}",
        service.name,
        service.version,
        service.nodes.iter().map(|n| n.address.as_str()).collect::<Vec<_>>().join(",")
    );

    let manager = RegistrationManager::new(registry.clone(), Arc::new(config.backoff.clone()))
        .with_reporter(reporter.clone());
    let publisher = Publisher::new(broker.clone()).with_reporter(reporter.clone());

    let ctx = Context::new();

    // A service that cannot register must not start
    manager.register(&ctx, &service, registration).await?;
    info!(
        "Registered {} in namespace {}",
        service.name, registration.namespace
    );

    if let Err(e) = announce(&publisher, &ctx, &config.startup_topic, &service).await {
        warn!("Failed to announce startup on {}: {}", config.startup_topic, e);
    }

    tokio::select! {
        _ = manager.keep_registered(&ctx, &service, registration) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, deregistering...");
        }
    }
    ctx.cancel();

    let shutdown_ctx = Context::new().with_timeout(config.shutdown_timeout());
    if let Err(e) = manager.deregister(&shutdown_ctx, &service, registration).await {
        error!("Error deregistering {}: {}", service.name, e);
    } else {
        info!("Deregistered {}", service.name);
    }
    broker.disconnect();

    match reporter.gather() {
        Ok(text) => debug!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to gather metrics: {}", e),
    }

    Ok(())
}

async fn announce(
    publisher: &Publisher,
    ctx: &Context,
    topic: &str,
    service: &ServiceDescriptor,
) -> mesh_core::Result<()> {
    let nodes: Vec<_> = service
        .nodes
        .iter()
        .map(|n| json!({"id": n.id, "address": n.address}))
        .collect();
    let message = Message::new(
        topic,
        json!({
            "event": "started",
            "service": service.name,
            "version": service.version,
            "nodes": nodes,
        }),
    );
    publisher.publish(ctx, &message, PublishOptions::new()).await
}
