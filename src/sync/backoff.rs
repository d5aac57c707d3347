use std::time::Duration;

use crate::config::SyncConfig;

/// Delay between reconnection attempts, doubling from the configured minimum
/// up to the maximum and starting over once a connection succeeded.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    /// Backoff starting at the configured minimum.
    pub fn new(config: &SyncConfig) -> Self {
        let min = config.min_retry();
        Self {
            min,
            max: config.max_retry(),
            current: min,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Start over from the minimum delay.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}
