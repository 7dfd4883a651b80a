//! Application configuration.
//!
//! Stored as pretty-printed JSON at the platform config directory
//! (`config.json`). A missing file yields defaults; command-line flags
//! override whatever the file holds.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no configuration directory.
    #[error("failed to determine configuration directory")]
    NoConfigDir,

    /// No proxy address configured.
    #[error("no proxy address configured (use --proxy host:port or set proxy_address in {0})")]
    MissingProxyAddress(String),

    /// Poll interval is zero.
    #[error("poll interval must be at least 1 second")]
    InvalidInterval,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Proxy address written when the trusted network is detected.
    pub proxy_address: String,
    /// Seconds between evaluations.
    pub poll_interval_secs: u64,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            proxy_address: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub proxy_address: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Resolves the config file location.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => paths::config_path().ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Loads configuration, returning defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes configuration, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(address) = &overrides.proxy_address {
            self.proxy_address = address.trim().to_string();
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        self
    }

    /// Checks the settings required to run the control loop.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.proxy_address.trim().is_empty() {
            return Err(ConfigError::MissingProxyAddress(path.display().to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
