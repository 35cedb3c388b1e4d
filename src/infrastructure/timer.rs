use crate::types::{MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY};
use std::time::Duration;

/// Reconnection backoff: `base × attempt`, bounded by an attempt ceiling.
#[derive(Debug, Clone)]
pub struct Timer {
    attempts: u32,
    base: Duration,
    max_attempts: u32,
}

impl Timer {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            base,
            max_attempts,
        }
    }

    /// Delay before the next attempt, or `None` once the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        Some(self.base * self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(RECONNECT_DELAY),
            MAX_RECONNECT_ATTEMPTS,
        )
    }
}
