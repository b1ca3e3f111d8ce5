//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and listen address.
    pub server: ServerConfig,
    /// Optional TLS listen configuration.
    pub tls: Option<TlsConfig>,
    /// Shared directory backend.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Event bus backend.
    #[serde(default)]
    pub bus: BusConfig,
    /// Known users for the credential store.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "chat1.example.net"). Used in logs only.
    pub name: String,
    /// Plaintext listen address.
    pub listen: SocketAddr,
    /// Room a connection lands in after login and after `/leave`.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Prometheus metrics HTTP port. 0 disables the endpoint (used by tests).
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// TLS listen address.
    pub address: SocketAddr,
    /// Path to the PEM certificate chain.
    pub cert_path: String,
    /// Path to the PEM PKCS#8 private key.
    pub key_path: String,
}

/// Shared directory backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// "redis" for the cluster-wide store, "memory" for a process-local one.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_redis_url(),
        }
    }
}

/// Event bus backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// "redis" for cross-process pub/sub, "memory" for a process-local bus.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Pub/sub channel all processes share.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_redis_url(),
            channel: default_channel(),
        }
    }
}

/// A credential store entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    /// Username presented in `LOGIN`.
    pub name: String,
    /// Bcrypt hash of the user's password.
    pub password_hash: String,
}

fn default_room() -> String {
    "lobby".to_string()
}

fn default_backend() -> String {
    "redis".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_channel() -> String {
    "global_chat_events".to_string()
}
