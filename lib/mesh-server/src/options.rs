//! Server and registration settings

use mesh_core::registry::DEFAULT_DOMAIN;
use mesh_core::Metadata;
use serde::Deserialize;
use std::time::Duration;

/// Registration settings
///
/// Attempt counts are extra retries: a value of 2 means up to 3 tries.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// How long a registration stays valid without renewal
    #[serde(with = "secs")]
    pub register_ttl: Duration,
    /// Interval between re-registrations; zero disables renewal
    #[serde(with = "secs")]
    pub register_interval: Duration,
    pub register_attempts: u32,
    pub deregister_attempts: u32,
    /// Discovery domain the service is registered under
    pub namespace: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            register_ttl: Duration::from_secs(90),
            register_interval: Duration::from_secs(30),
            register_attempts: 3,
            deregister_attempts: 3,
            namespace: DEFAULT_DOMAIN.to_string(),
        }
    }
}

/// Identity and addressing of the running server
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub name: String,
    pub version: String,
    /// Instance id; node id is `name-id`
    pub id: String,
    /// Address the server binds to
    pub address: String,
    /// Address to announce instead of `address`, if set
    pub advertise: String,
    pub metadata: Metadata,
    pub registration: RegistrationConfig,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "mesh.server".to_string(),
            version: "latest".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            address: "0.0.0.0:0".to_string(),
            advertise: String::new(),
            metadata: Metadata::new(),
            registration: RegistrationConfig::default(),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
