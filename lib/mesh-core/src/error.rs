use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Invalid address {address:?}: {reason}")]
    AddressFormat { address: String, reason: String },

    #[error("Failed to register service {service} after {attempts} attempt(s): {source}")]
    Registration {
        service: String,
        attempts: u32,
        #[source]
        source: Box<MeshError>,
    },

    #[error("Failed to deregister service {service} after {attempts} attempt(s): {source}")]
    Deregistration {
        service: String,
        attempts: u32,
        #[source]
        source: Box<MeshError>,
    },

    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(#[source] Box<MeshError>),

    #[error("Encoding error: {0}")]
    Encoding(#[source] Box<MeshError>),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("{backend} backend error: {message}")]
    Backend { backend: String, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeshError {
    /// Build a backend error from any displayable cause
    pub fn backend(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MeshError::Backend {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}
