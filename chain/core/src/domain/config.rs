// Copyright (c) 2026 chainreact contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Chain Configuration
//!
//! YAML configuration manifest for a chainreact host. The primary
//! credential may come from the manifest or from the
//! `CHAINREACT_PRIMARY_CREDENTIAL` environment variable (the env
//! value wins). Missing store configuration or a missing primary
//! credential is fatal at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::repository::{SledConfig, StorageBackend};

/// Environment variable holding the primary instance credential.
pub const PRIMARY_CREDENTIAL_ENV: &str = "CHAINREACT_PRIMARY_CREDENTIAL";

/// Default locations probed when no config path is given.
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["chainreact.yaml", "config/chainreact.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not readable at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Primary credential not configured (set `primary_credential` or {PRIMARY_CREDENTIAL_ENV})")]
    MissingPrimaryCredential,

    #[error("Storage backend `sled` requires a `storage.path`")]
    MissingStorePath,

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),
}

/// Top-level host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChainConfig {
    pub storage: StorageSection,
    pub network: NetworkSection,
    pub worker: WorkerSection,
    /// Primary instance credential; overridden by the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_credential: Option<String>,
}

/// `storage:` section: which store backend holds the three
/// collections (instances, packs, overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// `sled` or `memory`.
    pub backend: String,
    /// Sled database directory (the store connection string).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "sled".to_string(),
            path: None,
        }
    }
}

/// `network:` section, same-host ring addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Host every signal URL is built from. The design assumes one
    /// host coordinating same-host instances over loopback.
    pub host: String,
    /// Lowest port the allocator will hand out.
    pub port_floor: u16,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port_floor: 5000,
        }
    }
}

/// `worker:` section, event loop and propagation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Event poll cadence; also how quickly a stop is observed.
    pub poll_interval_ms: u64,
    /// Timeout on a single signal delivery.
    pub signal_timeout_secs: u64,
    /// Delay between instance starts during bootstrap, staggering the
    /// unprotected allocate-then-persist window.
    pub start_stagger_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            signal_timeout_secs: 5,
            start_stagger_ms: 2000,
        }
    }
}

impl ChainConfig {
    /// Load configuration from an explicit path, or discover one of
    /// the default locations. No file at all yields the defaults
    /// (useful with the env credential and the default store path).
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists()),
        };

        let mut config = match candidate {
            Some(p) => {
                let raw = std::fs::read_to_string(&p).map_err(|source| {
                    ConfigError::Unreadable {
                        path: p.clone(),
                        source,
                    }
                })?;
                serde_yaml::from_str::<ChainConfig>(&raw)?
            }
            None => ChainConfig::default(),
        };

        if let Ok(credential) = std::env::var(PRIMARY_CREDENTIAL_ENV) {
            if !credential.is_empty() {
                config.primary_credential = Some(credential);
            }
        }

        Ok(config)
    }

    /// Reject configurations the system cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend.as_str() {
            "memory" => {}
            "sled" => {
                if self.storage.path.is_none() {
                    return Err(ConfigError::MissingStorePath);
                }
            }
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        }

        if self.primary_credential.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingPrimaryCredential);
        }

        Ok(())
    }

    /// The selected storage backend.
    pub fn storage_backend(&self) -> Result<StorageBackend, ConfigError> {
        match self.storage.backend.as_str() {
            "memory" => Ok(StorageBackend::InMemory),
            "sled" => {
                let path = self
                    .storage
                    .path
                    .clone()
                    .ok_or(ConfigError::MissingStorePath)?;
                Ok(StorageBackend::Sled(SledConfig { path }))
            }
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loopback_and_port_5000() {
        let config = ChainConfig::default();
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.network.port_floor, 5000);
        assert_eq!(config.storage.backend, "sled");
    }

    #[test]
    fn validate_rejects_missing_credential() {
        let mut config = ChainConfig::default();
        config.storage.backend = "memory".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrimaryCredential)
        ));
    }

    #[test]
    fn validate_rejects_sled_without_path() {
        let mut config = ChainConfig::default();
        config.primary_credential = Some("1234567890:credential-credential-credential".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::MissingStorePath)));
    }

    #[test]
    fn parses_manifest() {
        let raw = r#"
storage:
  backend: memory
network:
  host: 127.0.0.1
  port_floor: 6000
worker:
  poll_interval_ms: 250
primary_credential: "1234567890:AAFbfZhf-abcdefghijk1234567890abcdef"
"#;
        let config: ChainConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.network.port_floor, 6000);
        assert_eq!(config.worker.poll_interval_ms, 250);
        assert!(matches!(
            config.storage_backend(),
            Ok(StorageBackend::InMemory)
        ));
        config.validate().unwrap();
    }
}
