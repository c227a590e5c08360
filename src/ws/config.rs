#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
}

impl Config {
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Base duration the exponential backoff grows from
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: u32) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Backoff before reconnection attempt number `attempt`:
    /// `min(initial_backoff * backoff_multiplier ^ attempt, max_backoff)`.
    ///
    /// Saturates instead of overflowing, so very large attempt numbers
    /// simply yield `max_backoff`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .checked_pow(attempt)
            .unwrap_or(u32::MAX);

        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
