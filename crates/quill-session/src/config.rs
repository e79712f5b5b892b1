//! Session configuration
//!
//! [`QuillConfig`] is plain serde data with defaults for every field, so a
//! TOML file only needs the values it changes:
//!
//! ```toml
//! [poller]
//! max_attempts = 10
//! interval_ms = 500
//!
//! [logging]
//! filter = "quill_session=debug"
//! ```

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Recovery poller settings
    pub poller: PollerConfig,
    /// Derived view settings
    pub views: ViewConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

impl QuillConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poller settings
    #[inline]
    #[must_use]
    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    /// With memoization capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.views.cache_capacity = capacity;
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// `ConfigParse` on invalid TOML, `Config` on out-of-range values
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigIo` if the file cannot be read, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| SessionError::config_io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `Config` describing the first invalid value
    pub fn validate(&self) -> SessionResult<()> {
        if self.poller.max_attempts == 0 {
            return Err(SessionError::Config(
                "poller.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.poller.request_timeout_ms == 0 {
            return Err(SessionError::Config(
                "poller.request_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.views.cache_capacity == 0 {
            return Err(SessionError::Config(
                "views.cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recovery poller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Wait between status checks, in milliseconds
    pub interval_ms: u64,
    /// Longest a single status check may take, in milliseconds
    pub request_timeout_ms: u64,
}

impl PollerConfig {
    /// Create poller settings
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: millis(interval),
            ..Self::default()
        }
    }

    /// With a per-check timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    /// Wait between status checks
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Longest a single status check may take
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            interval_ms: 3_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Derived view settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Memoized attribution and diff results kept per session
    pub cache_capacity: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { cache_capacity: 64 }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
