//! Server configuration
//!
//! Everything here is optional; a missing field falls back to its default.

use serde::Deserialize;
use std::path::Path;

/// Flavour of server being emulated
///
/// Some commands only exist on one flavour; the registry hides them on the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Redis,
    Valkey,
    Dragonfly,
}

impl Default for ServerType {
    fn default() -> Self {
        ServerType::Redis
    }
}

/// Emulated server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Major protocol version emulated (6 or 7)
    pub version: u8,

    /// Server flavour
    pub server_type: ServerType,

    /// Number of logical databases
    pub databases: usize,

    /// Address for the optional TCP listener
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            version: 7,
            server_type: ServerType::default(),
            databases: 16,
            listen_addr: "127.0.0.1:6379".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
                Self::from_json_str(&text)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(6..=7).contains(&self.version) {
            anyhow::bail!("unsupported version {}, expected 6 or 7", self.version);
        }
        if self.databases == 0 {
            anyhow::bail!("databases must be at least 1");
        }
        Ok(())
    }
}
