//! Completion planner.
//!
//! Compares the newest stored date against the newest date the market
//! could have produced and decides the minimal fetch that brings the
//! local series current. The plan is a pure function of the stored state
//! and the clock snapshot, so re-planning after a committed fetch
//! converges to `RefreshLast` and stays there.

use chrono::NaiveDate;

use crate::clock::calendar::{
    SESSION_OPEN, is_business_day, next_business_day, previous_business_day,
};
use crate::models::ClockState;

/// The fetch a cycle should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// The table is empty; fetch the entire available history.
    FullFetch,
    /// The series is current; refetch only the newest row, whose values
    /// keep moving intraday.
    RefreshLast {
        /// Newest stored date.
        last: NaiveDate,
    },
    /// The series is behind; fetch from the first missing business day
    /// through today.
    GapFill {
        /// First date to request, inclusive.
        start: NaiveDate,
    },
}

/// The most recent date for which the market can have produced a bar.
///
/// Today counts once the session has opened; before the open, and on
/// weekends, the previous business day is the best possible last entry.
#[must_use]
pub fn expected_last_trading_date(clock: &ClockState) -> NaiveDate {
    if is_business_day(clock.market_date) && clock.market_time > SESSION_OPEN {
        clock.market_date
    } else {
        previous_business_day(clock.market_date)
    }
}

/// Plan the next fetch for a series whose newest stored date is
/// `last_entry`.
#[must_use]
pub fn plan(last_entry: Option<NaiveDate>, clock: &ClockState) -> FetchPlan {
    let Some(last) = last_entry else {
        return FetchPlan::FullFetch;
    };

    if last >= expected_last_trading_date(clock) {
        FetchPlan::RefreshLast { last }
    } else {
        FetchPlan::GapFill {
            start: next_business_day(last),
        }
    }
}
