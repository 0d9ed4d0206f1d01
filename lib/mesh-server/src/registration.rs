//! Service registration lifecycle against a discovery backend

use crate::options::{RegistrationConfig, ServerOptions};
use mesh_core::metrics::{self, NoopReporter, Reporter};
use mesh_core::retry::{retry, RetryError};
use mesh_core::{
    AddressResolver, Backoff, BackendIdentity, Context, DeregisterOptions, MeshError, Node,
    RegisterOptions, Registry, Result, ServiceDescriptor,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Build the descriptor announced for this server
///
/// The node address is resolved from the advertise/bind pair; a malformed
/// address is returned as an error without contacting the registry.
pub fn build_service_descriptor(
    opts: &ServerOptions,
    identity: &BackendIdentity,
    resolver: &AddressResolver,
) -> Result<ServiceDescriptor> {
    let address = resolver.resolve(&opts.advertise, &opts.address)?;
    let node = Node::new(&opts.name, &opts.id, address, &opts.metadata, identity);
    Ok(ServiceDescriptor::single(&opts.name, &opts.version, node))
}

/// Registers and deregisters a service with bounded retry
pub struct RegistrationManager {
    registry: Arc<dyn Registry>,
    backoff: Arc<dyn Backoff>,
    reporter: Arc<dyn Reporter>,
}

impl RegistrationManager {
    pub fn new(registry: Arc<dyn Registry>, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            registry,
            backoff,
            reporter: Arc::new(NoopReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Register `service`, trying up to `register_attempts + 1` times.
    ///
    /// Only the final attempt's error is returned.
    pub async fn register(
        &self,
        ctx: &Context,
        service: &ServiceDescriptor,
        config: &RegistrationConfig,
    ) -> Result<()> {
        let opts = RegisterOptions {
            ttl: config.register_ttl,
            domain: config.namespace.clone(),
        };

        let started = Instant::now();
        let result = retry(ctx, config.register_attempts, self.backoff.as_ref(), |attempt| {
            debug!(service = %service.name, attempt, "Registering service");
            self.registry.register(service, &opts)
        })
        .await;
        self.report("register", &service.name, &result, started);

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => MeshError::Registration {
                service: service.name.clone(),
                attempts,
                source: Box::new(last),
            },
            RetryError::Cancelled { attempts, .. } => MeshError::Cancelled(format!(
                "register {} after {} attempt(s)",
                service.name, attempts
            )),
        })
    }

    /// Deregister `service`, trying up to `deregister_attempts + 1` times.
    pub async fn deregister(
        &self,
        ctx: &Context,
        service: &ServiceDescriptor,
        config: &RegistrationConfig,
    ) -> Result<()> {
        let opts = DeregisterOptions {
            domain: config.namespace.clone(),
        };

        let started = Instant::now();
        let result = retry(ctx, config.deregister_attempts, self.backoff.as_ref(), |attempt| {
            debug!(service = %service.name, attempt, "Deregistering service");
            self.registry.deregister(service, &opts)
        })
        .await;
        self.report("deregister", &service.name, &result, started);

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => MeshError::Deregistration {
                service: service.name.clone(),
                attempts,
                source: Box::new(last),
            },
            RetryError::Cancelled { attempts, .. } => MeshError::Cancelled(format!(
                "deregister {} after {} attempt(s)",
                service.name, attempts
            )),
        })
    }

    /// Re-register every `register_interval` until `ctx` is done.
    ///
    /// Failed renewals are logged and retried on the next tick.
    pub async fn keep_registered(
        &self,
        ctx: &Context,
        service: &ServiceDescriptor,
        config: &RegistrationConfig,
    ) {
        if config.register_interval.is_zero() {
            ctx.done().await;
            return;
        }

        let mut ticker = tokio::time::interval_at(
            Instant::now() + config.register_interval,
            config.register_interval,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.register(ctx, service, config).await {
                        if ctx.is_done() {
                            return;
                        }
                        warn!("Re-registration of {} failed: {}", service.name, e);
                    }
                }
                _ = ctx.done() => return,
            }
        }
    }

    fn report<T>(
        &self,
        op: &str,
        service: &str,
        result: &std::result::Result<T, RetryError<MeshError>>,
        started: Instant,
    ) {
        let status = if result.is_ok() { "ok" } else { "error" };
        let tags = metrics::tags([("service", service), ("status", status)]);
        let outcome = self
            .reporter
            .count(&format!("registry.{}", op), 1, &tags)
            .and_then(|_| {
                self.reporter
                    .timing(&format!("registry.{}.duration", op), started.elapsed(), &tags)
            });
        if let Err(e) = outcome {
            warn!("Failed to report {} metrics: {}", op, e);
        }
    }
}
