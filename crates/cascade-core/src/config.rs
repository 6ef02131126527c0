//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! max_lag_days = 365
//! start_policy = "flag_only"   # or "auto_start"
//! max_cascade_tasks = 10000
//! event_buffer = 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_LAG_DAYS: u32 = 365;
/// Largest accepted `max_lag_days`, about a century.
pub const MAX_LAG_DAYS_LIMIT: u32 = 36_500;
pub const DEFAULT_MAX_CASCADE_TASKS: usize = 10_000;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// What the cascade does with a pending successor that just became
/// startable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Report it as startable; a person or another service starts it.
    #[default]
    FlagOnly,
    /// Move it to `in_progress` right away.
    AutoStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound for `lag_days` on an edge.
    pub max_lag_days: u32,

    pub start_policy: StartPolicy,

    /// A single cascade touching more tasks than this is aborted.
    pub max_cascade_tasks: usize,

    /// Capacity of the broadcast channel behind the event bus.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_lag_days: DEFAULT_MAX_LAG_DAYS,
            start_policy: StartPolicy::default(),
            max_cascade_tasks: DEFAULT_MAX_CASCADE_TASKS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lag_days > MAX_LAG_DAYS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_lag_days must be at most {MAX_LAG_DAYS_LIMIT}"
            )));
        }
        if self.max_cascade_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_cascade_tasks must be at least 1".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_start_policy(mut self, policy: StartPolicy) -> Self {
        self.start_policy = policy;
        self
    }
}
