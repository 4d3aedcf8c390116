use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".into()
}
const fn default_port() -> u16 {
    5004
}
const fn default_timeout_ms() -> u64 {
    30_000
}
const fn default_max_message_size() -> usize {
    16 * 1024 * 1024
}
fn default_name() -> String {
    "actorlink".into()
}
fn default_package_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

// ---------------------------------------------------------------------------
// ExchangeConfig
// ---------------------------------------------------------------------------

/// Connection and identity settings for one exchange session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Peer host name or address (default: `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,

    /// Peer port (default: 5004).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect and read timeout in milliseconds. `0` blocks forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest framed message accepted or sent, in bytes (default: 16 MiB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Local identity announced in the handshake greeting.
    #[serde(default = "default_name")]
    pub name: String,

    /// Local package version announced in the handshake greeting.
    #[serde(default = "default_package_version")]
    pub package_version: String,

    /// Seed forwarded to the peer in the greeting.
    #[serde(default)]
    pub seed: Option<i32>,

    /// Named capabilities advertised in the greeting.
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            max_message_size: default_max_message_size(),
            name: default_name(),
            package_version: default_package_version(),
            seed: None,
            capabilities: HashMap::new(),
        }
    }
}

impl ExchangeConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".into(),
                message: "must be non-zero".into(),
            });
        }
        if self.max_message_size < 1024 {
            return Err(ConfigError::InvalidValue {
                field: "max_message_size".into(),
                message: format!("{} is below the 1024 byte minimum", self.max_message_size),
            });
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// `host:port` string suitable for socket address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport timeout, or `None` when the transport should block forever.
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
