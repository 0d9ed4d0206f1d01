//! Agent configuration: YAML file plus environment overrides

use anyhow::{Context, Result};
use mesh_core::ExponentialBackoff;
use mesh_server::ServerOptions;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming the YAML config file
pub const CONFIG_ENV: &str = "MESH_CONFIG";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server: ServerOptions,
    pub backoff: ExponentialBackoff,
    /// Topic the agent announces itself on after registering
    pub startup_topic: String,
    pub metrics_namespace: String,
    /// Upper bound on deregistration at shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            backoff: ExponentialBackoff::default(),
            startup_topic: "mesh.lifecycle".to_string(),
            metrics_namespace: "mesh".to_string(),
            shutdown_timeout_secs: 10,
        }
    }
}

impl AgentConfig {
    /// Load from `MESH_CONFIG` if set, then apply `MESH_*` overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                Self::from_yaml(&raw)?
            }
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Invalid agent configuration")
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("MESH_NAME") {
            self.server.name = name;
        }
        if let Some(address) = lookup("MESH_ADDRESS") {
            self.server.address = address;
        }
        if let Some(advertise) = lookup("MESH_ADVERTISE") {
            self.server.advertise = advertise;
        }
        if let Some(namespace) = lookup("MESH_NAMESPACE") {
            self.server.registration.namespace = namespace;
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_yaml() {
        let config = AgentConfig::from_yaml(
            r#"
server:
  name: orders
  version: "2.1"
  address: "0.0.0.0:9000"
  metadata:
    zone: eu-1
  registration:
    register_ttl: 30
    register_attempts: 5
    namespace: prod
backoff:
  initial_backoff: 250
startup_topic: orders.lifecycle
"#,
        )
        .unwrap();

        assert_eq!(config.server.name, "orders");
        assert_eq!(config.server.version, "2.1");
        assert_eq!(config.server.metadata.get("zone").map(String::as_str), Some("eu-1"));
        assert_eq!(config.server.registration.register_ttl, Duration::from_secs(30));
        assert_eq!(config.server.registration.register_attempts, 5);
        assert_eq!(config.server.registration.namespace, "prod");
        assert_eq!(config.backoff.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.startup_topic, "orders.lifecycle");
        assert_eq!(config.metrics_namespace, "mesh");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MESH_ADDRESS", "0.0.0.0:7000"),
            ("MESH_NAMESPACE", "staging"),
        ]
        .into();

        let mut config = AgentConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.address, "0.0.0.0:7000");
        assert_eq!(config.server.registration.namespace, "staging");
        assert_eq!(config.server.advertise, "");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(AgentConfig::from_yaml("server: [1, 2").is_err());
    }
}
