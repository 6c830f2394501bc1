//! Global configuration parsing and validation.

use std::time::Duration;

use serde::Deserialize;

use crate::stream::codec::MAX_LINE_BYTES;
use crate::{AppError, Result};

fn default_pre_request_delay_ms() -> u64 {
    500
}

fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}

fn default_event_channel_capacity() -> usize {
    64
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Base URL of the analysis service, without a trailing slash.
    pub api_base_url: String,
    /// Simulated "thinking" delay before each stage request; 0 disables it.
    #[serde(default = "default_pre_request_delay_ms")]
    pub pre_request_delay_ms: u64,
    /// Maximum accepted length of a single streamed record.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Capacity of the stage event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Connect timeout for stage requests in seconds; 0 means no timeout.
    ///
    /// Applies to connection establishment only. A stalled stream is never
    /// timed out once connected; stages run zero-retry with no stream
    /// deadline.
    #[serde(default)]
    pub connect_timeout_seconds: u64,
}

impl GlobalConfig {
    /// Parse and validate a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the TOML is malformed, `api_base_url`
    /// is empty, or `event_channel_capacity` is zero.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;

        config.api_base_url = config.api_base_url.trim_end_matches('/').to_owned();
        if config.api_base_url.is_empty() {
            return Err(AppError::Config("api_base_url must not be empty".into()));
        }
        if config.event_channel_capacity == 0 {
            return Err(AppError::Config(
                "event_channel_capacity must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    /// The simulated pre-request delay as a [`Duration`].
    #[must_use]
    pub fn pre_request_delay(&self) -> Duration {
        Duration::from_millis(self.pre_request_delay_ms)
    }

    /// The connect timeout, or `None` when disabled.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.connect_timeout_seconds))
    }
}
