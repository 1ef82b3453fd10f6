//! Daemon configuration from environment variables
//!
//! Scalars come from `MRPC_*` environment variables with sensible defaults.
//! Two optional YAML files complete the picture: per-service attribute
//! overrides (`MRPC_SERVICE_CONFIG`) and initial records (`MRPC_SEED_FILE`).

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransportMode {
    #[default]
    Unix,
    Tcp,
}

/// Where the daemon listens, resolved from [`DaemonConfig`]
#[derive(Debug, Clone, PartialEq)]
pub enum Listen {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

/// Daemon configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Transport mode: "unix" or "tcp"
    pub transport_mode: TransportMode,

    /// gRPC address (TCP mode only)
    pub grpc_addr: String,

    /// gRPC Unix socket path (Unix socket mode only)
    pub grpc_socket: String,

    /// YAML file with per-service attribute overrides
    pub service_config: Option<String>,

    /// YAML file with records loaded at startup
    pub seed_file: Option<String>,

    pub log_level: String,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            transport_mode: Self::parse_transport_mode(),
            grpc_addr: env::var("MRPC_GRPC_ADDR")
                .unwrap_or_else(|_| crate::DEFAULT_GRPC_ADDR.to_string()),
            grpc_socket: env::var("MRPC_GRPC_SOCKET")
                .unwrap_or_else(|_| crate::DEFAULT_GRPC_SOCKET.to_string()),
            service_config: env::var("MRPC_SERVICE_CONFIG").ok(),
            seed_file: env::var("MRPC_SEED_FILE").ok(),
            log_level: Self::parse_log_level(),
        }
    }

    fn parse_transport_mode() -> TransportMode {
        env::var("MRPC_TRANSPORT_MODE")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "tcp" => Some(TransportMode::Tcp),
                "unix" => Some(TransportMode::Unix),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn parse_log_level() -> String {
        // MRPC_LOG_LEVEL > RUST_LOG > default
        env::var("MRPC_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Resolve the listening endpoint, failing on a malformed TCP address
    pub fn listen(&self) -> Result<Listen, ConfigError> {
        match self.transport_mode {
            TransportMode::Tcp => self
                .grpc_addr
                .parse()
                .map(Listen::Tcp)
                .map_err(|e| {
                    ConfigError::Invalid(format!("MRPC_GRPC_ADDR {:?}: {}", self.grpc_addr, e))
                }),
            TransportMode::Unix => Ok(Listen::Unix(PathBuf::from(&self.grpc_socket))),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen()?;
        if self.transport_mode == TransportMode::Unix && self.grpc_socket.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "MRPC_GRPC_SOCKET must not be empty in unix mode".to_string(),
            ));
        }
        Ok(())
    }
}

/// Attribute overrides keyed by service name
///
/// ```yaml
/// AccountService:
///   lookup_field: username
///   ordering: "-id"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ServiceOverrides {
    services: HashMap<String, BTreeMap<String, Value>>,
}

impl ServiceOverrides {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(read_yaml(path.as_ref())?.unwrap_or_default())
    }

    /// Overrides for one service, in key order
    pub fn for_service(&self, service: &str) -> Vec<(String, Value)> {
        self.services
            .get(service)
            .map(|attrs| attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

/// Load a YAML list of records
pub fn load_seed<M: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<M>, ConfigError> {
    Ok(read_yaml(path.as_ref())?.unwrap_or_default())
}

// Blank files and explicit nulls both read as `None`.
fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
