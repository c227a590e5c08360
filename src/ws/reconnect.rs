use std::time::Duration;

use super::config::ReconnectConfig;

/// A reconnection the policy has approved.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAttempt {
    /// 1-based number of this attempt since the last successful open
    pub attempt: u32,
    /// How long to wait before connecting
    pub delay: Duration,
}

/// Counts consecutive reconnection attempts and computes their backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Attempts made since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    /// Approve one more attempt, or `None` once `max_attempts` is reached.
    ///
    /// The delay is computed from the incremented attempt count, so with the default
    /// configuration the first retry waits two seconds.
    pub fn next_attempt(&mut self) -> Option<ScheduledAttempt> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts = self.attempts.saturating_add(1);

        Some(ScheduledAttempt {
            attempt: self.attempts,
            delay: self.config.delay(self.attempts),
        })
    }
}
