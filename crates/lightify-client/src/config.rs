//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/lightify/config.toml` by default:
//!
//! ```toml
//! debug = false
//!
//! [gateway]
//! host = "192.168.1.20"
//! port = 4000
//! request_timeout_ms = 3000
//! poll_interval_secs = 30
//! group_poll_interval_secs = 300
//! grace_scans = 0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use lightify_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for the lightify client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Gateway connection settings.
    pub gateway: GatewaySettings,
}

/// Gateway connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Gateway host name or IP address.
    pub host: Option<String>,

    /// Gateway TCP port.
    pub port: u16,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Seconds between device scans in watch mode.
    pub poll_interval_secs: u64,

    /// Seconds between group scans in watch mode.
    pub group_poll_interval_secs: u64,

    /// Scans a device may be missing from before it is reported lost.
    pub grace_scans: u64,

    /// How often a busy device is polled again.
    pub busy_retries: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            host: None,
            port: defaults.port,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            poll_interval_secs: defaults.poll_interval.as_secs(),
            group_poll_interval_secs: defaults.group_poll_interval.as_secs(),
            grace_scans: defaults.grace_scans,
            busy_retries: defaults.busy_retries,
        }
    }
}

impl GatewaySettings {
    /// Builds the gateway configuration. `host` overrides the configured host.
    ///
    /// # Errors
    ///
    /// `Config` if no host is configured anywhere.
    pub fn to_gateway_config(&self, host: Option<&str>) -> ClientResult<GatewayConfig> {
        let host = host.or(self.host.as_deref()).ok_or_else(|| {
            ClientError::Config(format!(
                "no gateway host configured. Add to {}:\n  \
                 [gateway]\n  \
                 host = \"192.168.1.20\"\n\n  \
                 Or pass --host",
                ClientConfig::default_path().display()
            ))
        })?;

        let mut config = GatewayConfig::new(host)
            .with_port(self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_group_poll_interval(Duration::from_secs(self.group_poll_interval_secs))
            .with_grace_scans(self.grace_scans);
        config.busy_retries = self.busy_retries;
        Ok(config)
    }
}

impl ClientConfig {
    /// Loads configuration from the default path; a missing file yields
    /// defaults.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lightify")
    }
}
