//! Client configuration, loaded from RON.
//!
//! ```ron
//! (
//!     heartbeat_interval: (secs: 10, nanos: 0),
//!     active_window: (secs: 15, nanos: 0),
//!     default_columns: ["Backlog", "Doing", "Done"],
//! )
//! ```
//!
//! Every field is optional; omitted fields take the values in
//! [`constants`](crate::constants).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    ACTIVE_WINDOW, AUTH_TIMEOUT, DEFAULT_COLUMNS, DEFAULT_SOLO_NAME, HEARTBEAT_INTERVAL,
    NOTICE_CAPACITY, RECENT_TASK_LIMIT,
};

/// Tunables for a board session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub heartbeat_interval: Duration,
    pub active_window: Duration,
    pub auth_timeout: Duration,
    pub notice_capacity: usize,
    pub recent_task_limit: usize,
    pub default_solo_name: String,
    pub default_columns: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            active_window: ACTIVE_WINDOW,
            auth_timeout: AUTH_TIMEOUT,
            notice_capacity: NOTICE_CAPACITY,
            recent_task_limit: RECENT_TASK_LIMIT,
            default_solo_name: DEFAULT_SOLO_NAME.to_string(),
            default_columns: DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ClientConfig {
    /// Parse from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid("heartbeat_interval must be non-zero".into()));
        }
        if self.active_window < self.heartbeat_interval {
            return Err(ConfigError::Invalid(
                "active_window must be at least one heartbeat_interval".into(),
            ));
        }
        if self.default_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid("default column titles must be non-empty".into()));
        }
        Ok(())
    }
}
