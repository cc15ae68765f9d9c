//! Retry policy applied around adapter calls.

use std::time::Duration;

use rand::Rng;

use crate::models::RetryConfig;

/// How often and how far apart an adapter call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay_ms: min_delay_ms.min(max_delay_ms),
            max_delay_ms,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.min_delay_ms, config.max_delay_ms)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Jittered delay before the next attempt, uniform in `[min, max]`.
    pub fn delay(&self) -> Duration {
        if self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Uniform random delay in `[min_ms, max_ms]`.
pub fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms == 0 || min_ms >= max_ms {
        return Duration::from_millis(max_ms.min(min_ms));
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
