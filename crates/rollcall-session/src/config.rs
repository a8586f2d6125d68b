//! Configuration for the session coordinator and reaper.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [session]
//! id_pattern = "^[A-Za-z0-9-]{1,64}$"
//! retention_secs = 86400
//! reap_interval_secs = 86400
//! max_sessions = 10000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default session id pattern: alphanumeric plus hyphen, 1 to 64 characters.
pub const DEFAULT_SESSION_ID_PATTERN: &str = "^[A-Za-z0-9-]{1,64}$";

/// Default retention for finished or idle sessions (one day).
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;

/// Default reaper period (once a day).
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "ROLLCALL_CONFIG_DIR";

const APP_NAME: &str = "rollcall";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    /// Session lifecycle settings.
    pub session: SessionConfig,
}

impl RollcallConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RollcallConfig = toml::from_str(toml_str)?;
        config.session.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Load from `path` if given, else from the default location if a file
    /// exists there, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Get the config directory for rollcall.
///
/// Checks `ROLLCALL_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Default config file path (`<config_dir>/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Regular expression every session id must match.
    pub id_pattern: String,
    /// Seconds after creation before a non-active session may be reaped.
    pub retention_secs: u64,
    /// Seconds between reaper runs.
    pub reap_interval_secs: u64,
    /// Optional bound on the number of stored sessions.
    pub max_sessions: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_pattern: DEFAULT_SESSION_ID_PATTERN.to_string(),
            retention_secs: DEFAULT_RETENTION_SECS,
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
            max_sessions: None,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id pattern.
    pub fn with_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.id_pattern = pattern.into();
        self
    }

    /// Set the retention period.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    /// Set the reaper period.
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval_secs = interval.as_secs();
        self
    }

    /// Bound the number of stored sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Retention period as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Reaper period as a duration.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// Compile the session id pattern.
    pub fn compile_id_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.id_pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.id_pattern.clone(),
            source,
        })
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile_id_pattern()?;
        if self.reap_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "reap_interval_secs",
            });
        }
        Ok(())
    }
}
