//! Service descriptors announced to a discovery backend
use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};

/// Metadata key naming the server implementation
pub const META_SERVER: &str = "server";
/// Metadata key naming the broker backend
pub const META_BROKER: &str = "broker";
/// Metadata key naming the registry backend
pub const META_REGISTRY: &str = "registry";

/// Names of the backends a node runs with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendIdentity {
    pub server: String,
    pub broker: String,
    pub registry: String,
}

/// A single running instance of a service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub address: String,
    pub metadata: Metadata,
}

impl Node {
    /// Create a node whose id is `name-instance_id`.
    ///
    /// `server`, `broker` and `registry` metadata keys are always set from
    /// `identity` and override same-named keys in `metadata`.
    pub fn new(
        name: &str,
        instance_id: &str,
        address: String,
        metadata: &Metadata,
        identity: &BackendIdentity,
    ) -> Self {
        let mut metadata = metadata.clone();
        metadata.insert(META_SERVER.to_string(), identity.server.clone());
        metadata.insert(META_BROKER.to_string(), identity.broker.clone());
        metadata.insert(META_REGISTRY.to_string(), identity.registry.clone());

        Self {
            id: format!("{}-{}", name, instance_id),
            address,
            metadata,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub version: String,
    pub nodes: Vec<Node>,
    pub metadata: Metadata,
}

impl ServiceDescriptor {
    /// Descriptor for a single-instance registration
    pub fn single(name: &str, version: &str, node: Node) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            nodes: vec![node],
            metadata: Metadata::new(),
        }
    }
}
