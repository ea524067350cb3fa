//! Configuration for discovery and casting
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";
pub const SSDP_PORT: u16 = 1900;
pub const MEDIA_RENDERER_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub cast: CastConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else the default config file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `<config dir>/dlnalink/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dlnalink").join("config.toml"))
}

/// SSDP search and description fetch settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Destination of M-SEARCH requests
    pub multicast_addr: String,
    pub port: u16,
    /// Primary ST header; a second search for `ssdp:all` always follows
    pub search_target: String,
    /// MX header: max response delay advertised to responders, in seconds
    pub mx: u8,
    /// Whole receive window, measured from the first receive call
    pub receive_timeout_ms: u64,
    pub buffer_size: usize,
    pub user_agent: String,
    /// Connect and total timeout for the description GET
    pub description_timeout_ms: u64,
}

impl DiscoveryConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn description_timeout(&self) -> Duration {
        Duration::from_millis(self.description_timeout_ms)
    }

    /// `host:port` of the search destination
    pub fn target(&self) -> String {
        format!("{}:{}", self.multicast_addr, self.port)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_addr: SSDP_MULTICAST_ADDR.to_string(),
            port: SSDP_PORT,
            search_target: MEDIA_RENDERER_TARGET.to_string(),
            mx: 3,
            receive_timeout_ms: 8000,
            buffer_size: 8192,
            user_agent: "dlnalink UPnP/1.0".to_string(),
            description_timeout_ms: 5000,
        }
    }
}

/// SOAP control settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// Connect and total timeout for each SOAP request
    pub soap_timeout_ms: u64,
    /// Title put in the DIDL-Lite metadata
    pub title: String,
    pub user_agent: String,
}

impl CastConfig {
    pub fn soap_timeout(&self) -> Duration {
        Duration::from_millis(self.soap_timeout_ms)
    }
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            soap_timeout_ms: 10_000,
            title: "DLNA Cast Video".to_string(),
            user_agent: "dlnalink DLNA/1.0".to_string(),
        }
    }
}
