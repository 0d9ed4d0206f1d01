//! Core building blocks of the mesh client
//!
//! This library provides:
//! - Service descriptors and the discovery backend contract
//! - Address resolution for advertised node addresses
//! - Backoff policies and cancellable retry
//! - Call context, metadata and metrics reporting

pub mod address;
pub mod backoff;
pub mod context;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod service;

pub use address::{AddressResolver, InterfaceProbe, SystemProbe};
pub use backoff::{Backoff, ExponentialBackoff};
pub use context::Context;
pub use error::{MeshError, Result};
pub use metadata::Metadata;
pub use metrics::{NoopReporter, PrometheusReporter, Reporter};
pub use registry::{DeregisterOptions, MemoryRegistry, RegisterOptions, Registry};
pub use service::{BackendIdentity, Node, ServiceDescriptor};
