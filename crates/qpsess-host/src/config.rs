//! Host configuration.
//!
//! Stored at `~/.qpsess/config.toml`. Every field has a default, so a partial
//! file (or no file at all) is valid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use qpsess_bridge::BridgeOptions;
use qpsess_clarabel::EngineOptions;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Configuration of the `qpsess-host` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Live session cap (0 = unlimited).
    pub max_sessions: usize,

    /// Initialise settings with the solver defaults when a session is created.
    pub default_settings_on_new: bool,

    /// Clarabel engine options.
    pub solver: EngineOptions,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            max_sessions: 0,
            default_settings_on_new: false,
            solver: EngineOptions::default(),
        }
    }
}

impl HostConfig {
    /// Get the default config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".qpsess"))
    }

    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from the default location.
    ///
    /// Returns default config if file doesn't exist.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// The configured log level.
    pub fn level(&self) -> Result<Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid log_level {:?}", self.log_level))
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            max_sessions: self.max_sessions,
            default_settings_on_new: self.default_settings_on_new,
        }
    }
}
