//! Staleness policy for externally sourced datasets.
//!
//! A dataset is stale when its last recorded write is absent or older
//! than the policy's maximum age. The symbol directory uses the weekly
//! policy; per-symbol bar tables get their freshness from the planner
//! instead, which understands the trading calendar.

use chrono::{DateTime, Duration, Utc};

/// Age threshold after which a dataset must be refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    /// Policy with a custom maximum age.
    #[must_use]
    pub const fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Policy expiring after the given number of days.
    #[must_use]
    pub const fn days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }

    /// One-week policy used by the symbol directory.
    #[must_use]
    pub const fn weekly() -> Self {
        Self::days(7)
    }

    /// Whether a dataset with the given last write is stale at `now`.
    ///
    /// No recorded write means the dataset has never been populated and
    /// is always stale.
    #[must_use]
    pub fn is_stale(&self, last_write: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_write.is_none_or(|ts| now - ts >= self.max_age)
    }
}
