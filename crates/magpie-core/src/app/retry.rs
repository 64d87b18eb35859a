//! Retry policy: decides backoff delays for transient upload failures.

use std::time::Duration;

/// Exponential backoff with a bounded attempt count.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// Total attempts before giving up (including the first).
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Default upload policy: 3 attempts, delays 1s then 2s.
    pub fn default_upload() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }

    /// Delay before the next retry, given the number of attempts already
    /// made (1-indexed): `base_delay * multiplier^(attempts - 1)`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}
