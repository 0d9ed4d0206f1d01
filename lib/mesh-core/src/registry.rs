//! Discovery backend contract and an in-memory implementation

use crate::service::{Node, ServiceDescriptor};
use crate::{MeshError, Result};
use crate::metadata::Metadata;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Domain used when a registration carries an empty one
pub const DEFAULT_DOMAIN: &str = "default";

/// Options for a single register call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterOptions {
    /// How long the record stays valid without renewal; zero means forever
    pub ttl: Duration,
    pub domain: String,
}

/// Options for a single deregister call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeregisterOptions {
    pub domain: String,
}

/// Pluggable discovery backend
#[async_trait]
pub trait Registry: Send + Sync {
    /// Identifier stamped into node metadata
    fn name(&self) -> &str;

    async fn register(&self, service: &ServiceDescriptor, opts: &RegisterOptions) -> Result<()>;

    async fn deregister(&self, service: &ServiceDescriptor, opts: &DeregisterOptions)
        -> Result<()>;
}

#[derive(Clone, Debug)]
struct RegisteredNode {
    node: Node,
    expires_at: Option<Instant>,
}

impl RegisteredNode {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Clone, Debug)]
struct RegisteredService {
    name: String,
    version: String,
    metadata: Metadata,
    nodes: HashMap<String, RegisteredNode>,
}

impl RegisteredService {
    fn snapshot(&self, now: Instant) -> ServiceDescriptor {
        let mut nodes: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.is_live(now))
            .map(|n| n.node.clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        ServiceDescriptor {
            name: self.name.clone(),
            version: self.version.clone(),
            nodes,
            metadata: self.metadata.clone(),
        }
    }
}

fn domain_or_default(domain: &str) -> &str {
    if domain.is_empty() {
        DEFAULT_DOMAIN
    } else {
        domain
    }
}

fn service_key(domain: &str, name: &str) -> String {
    format!("{}/{}", domain_or_default(domain), name)
}

/// MemoryRegistry keeps registrations in process, partitioned by domain
pub struct MemoryRegistry {
    // Map of domain/name to the registered service
    services: Arc<RwLock<HashMap<String, RegisteredService>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get a service with its live nodes
    pub async fn get_service(&self, domain: &str, name: &str) -> Result<ServiceDescriptor> {
        let key = service_key(domain, name);
        let services = self.services.read().await;
        let now = Instant::now();
        services
            .get(&key)
            .map(|svc| svc.snapshot(now))
            .filter(|svc| !svc.nodes.is_empty())
            .ok_or(MeshError::ServiceNotFound(key))
    }

    /// List services in a domain that have at least one live node
    pub async fn list_services(&self, domain: &str) -> Vec<ServiceDescriptor> {
        let prefix = format!("{}/", domain_or_default(domain));
        let services = self.services.read().await;
        let now = Instant::now();
        let mut listed: Vec<ServiceDescriptor> = services
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, svc)| svc.snapshot(now))
            .filter(|svc| !svc.nodes.is_empty())
            .collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        listed
    }

    /// Number of services with at least one live node, across domains
    pub async fn service_count(&self) -> usize {
        let services = self.services.read().await;
        let now = Instant::now();
        services
            .values()
            .filter(|svc| svc.nodes.values().any(|n| n.is_live(now)))
            .count()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn name(&self) -> &str {
        "memory"
    }

    async fn register(&self, service: &ServiceDescriptor, opts: &RegisterOptions) -> Result<()> {
        let key = service_key(&opts.domain, &service.name);
        let expires_at = (!opts.ttl.is_zero()).then(|| Instant::now() + opts.ttl);

        let mut services = self.services.write().await;
        let entry = services.entry(key.clone()).or_insert_with(|| RegisteredService {
            name: service.name.clone(),
            version: service.version.clone(),
            metadata: Metadata::new(),
            nodes: HashMap::new(),
        });
        entry.version = service.version.clone();
        entry.metadata = service.metadata.clone();
        for node in &service.nodes {
            entry.nodes.insert(
                node.id.clone(),
                RegisteredNode {
                    node: node.clone(),
                    expires_at,
                },
            );
        }

        debug!("Registered service {} with {} node(s)", key, service.nodes.len());
        Ok(())
    }

    async fn deregister(
        &self,
        service: &ServiceDescriptor,
        opts: &DeregisterOptions,
    ) -> Result<()> {
        let key = service_key(&opts.domain, &service.name);

        let mut services = self.services.write().await;
        if let Some(entry) = services.get_mut(&key) {
            for node in &service.nodes {
                entry.nodes.remove(&node.id);
            }
            if entry.nodes.is_empty() {
                services.remove(&key);
            }
        }

        debug!("Deregistered service: {}", key);
        Ok(())
    }
}
