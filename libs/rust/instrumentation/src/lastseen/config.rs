//! Tracker configuration.

use crate::error::ConfigError;

/// Environment variable holding the flush interval in seconds.
pub const FLUSH_INTERVAL_ENV: &str = "LAST_SEEN_FLUSH_INTERVAL_SECONDS";
/// Environment variable enabling ticker mode (`true`/`1`).
pub const USE_TICKER_ENV: &str = "LAST_SEEN_USE_TICKER";

/// Last-seen tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Minimum number of seconds between two exports of a field (default: 30)
    pub flush_interval_seconds: i64,
    /// Flush from a periodic task instead of after every observation
    pub use_ticker: bool,
    /// Prefix of the tracker metric names (default: "instrumentation")
    pub metrics_prefix: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval_seconds: 30,
            use_ticker: false,
            metrics_prefix: "instrumentation".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Read the configuration from the environment, `.env` included.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the flush interval is not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let interval = std::env::var(FLUSH_INTERVAL_ENV).unwrap_or_default();
        let use_ticker = std::env::var(USE_TICKER_ENV)
            .is_ok_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Self::default()
            .with_flush_interval_str(&interval)?
            .with_ticker(use_ticker))
    }

    /// Set the flush interval in seconds.
    #[must_use]
    pub const fn with_flush_interval(mut self, seconds: i64) -> Self {
        self.flush_interval_seconds = seconds;
        self
    }

    /// Set the flush interval from a decimal string.
    ///
    /// An empty string keeps the current value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFlushInterval`] if `value` is not a
    /// 32-bit integer.
    pub fn with_flush_interval_str(self, value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(self);
        }
        let seconds = value
            .parse::<i32>()
            .map_err(|e| ConfigError::InvalidFlushInterval {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.with_flush_interval(i64::from(seconds)))
    }

    /// Select ticker mode.
    #[must_use]
    pub const fn with_ticker(mut self, use_ticker: bool) -> Self {
        self.use_ticker = use_ticker;
        self
    }

    /// Set the metric name prefix.
    #[must_use]
    pub fn with_metrics_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metrics_prefix = prefix.into();
        self
    }
}
