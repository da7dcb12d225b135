//! Trading-day calendar and session hours.
//!
//! A date is a trading day if it is a weekday. Exchange holidays are NOT
//! excluded; the upstream data source simply returns no bar for them, so
//! a holiday is indistinguishable from a slow feed until the next session.
//! The gap-tolerant store makes this safe, but callers should not assume
//! every business day has a bar.
//!
//! Session hours are [09:30:00, 16:00:00) market time: the open is
//! inclusive, the close exclusive.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};

/// Session open, inclusive.
pub const SESSION_OPEN: NaiveTime = match NaiveTime::from_hms_opt(9, 30, 0) {
    Some(t) => t,
    None => unreachable!(),
};

/// Session close, exclusive.
pub const SESSION_CLOSE: NaiveTime = match NaiveTime::from_hms_opt(16, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};

/// Whether `date` falls Monday through Friday.
#[must_use]
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Most recent business day strictly before `date`.
#[must_use]
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut day = date - Duration::days(1);
    while !is_business_day(day) {
        day -= Duration::days(1);
    }
    day
}

/// Earliest business day strictly after `date`.
#[must_use]
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut day = date + Duration::days(1);
    while !is_business_day(day) {
        day += Duration::days(1);
    }
    day
}

/// Whether `time` falls inside the trading session.
#[must_use]
pub fn session_contains(time: NaiveTime) -> bool {
    (SESSION_OPEN..SESSION_CLOSE).contains(&time)
}

/// Whether the market is open at the given market-timezone date and time.
#[must_use]
pub fn market_open_at(date: NaiveDate, time: NaiveTime) -> bool {
    is_business_day(date) && session_contains(time)
}
