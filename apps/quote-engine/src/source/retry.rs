//! Retry policy and backoff calculation for quote fetches.
//!
//! The refresh loop makes a small, fixed number of attempts per cycle
//! with a short pause between them; a halted engine is preferable to a
//! hammered quote API. The calculator supports a multiplier so callers
//! can opt into exponential growth, but the default policy is a fixed
//! interval.

use std::time::Duration;

use crate::config::RefreshConfig;

/// Retry policy for one fetch operation.
#[derive(Debug, Clone)]
pub struct FetchRetryPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Pause before the first retry.
    pub initial_backoff: Duration,
    /// Growth factor between pauses (1.0 = fixed).
    pub multiplier: f64,
}

impl Default for FetchRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 1.0,
        }
    }
}

impl From<&RefreshConfig> for FetchRetryPolicy {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            max_attempts: config.max_fetch_attempts,
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
            multiplier: config.retry_multiplier,
        }
    }
}

/// Backoff calculator for one fetch operation.
#[derive(Debug)]
pub struct BackoffCalculator {
    attempt: u32,
    max_attempts: u32,
    current: Duration,
    multiplier: f64,
}

impl BackoffCalculator {
    /// Create a calculator from a policy.
    #[must_use]
    pub const fn new(policy: &FetchRetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts,
            current: policy.initial_backoff,
            multiplier: policy.multiplier,
        }
    }

    /// Pause before the next attempt, or `None` when attempts are spent.
    ///
    /// The first call accounts for attempt 1 having failed; after
    /// `max_attempts` failures it returns `None`.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current;
        self.current = Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier);
        Some(backoff)
    }

    /// Attempts consumed so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
