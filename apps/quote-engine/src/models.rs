//! Core data types shared across the engine.
//!
//! Everything here is plain data: the durable `Bar`/`Series` shapes that
//! live in the SQLite cache, the wholesale-published `ClockState`, and the
//! per-cycle `QuoteSnapshot` consumed by display windows.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Bars and Series
// ============================================================================

/// One trading day's OHLCV record for a symbol.
///
/// `date` is the primary key within a symbol's table; prices are
/// non-negative and `volume` carries an integral value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Trading date (unique per symbol).
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Split/dividend adjusted close.
    pub adj_close: f64,
    /// Traded volume (integral-valued).
    pub volume: f64,
}

/// Ordered-by-date collection of bars for one symbol.
///
/// Invariant: dates are strictly increasing with no duplicates. Gaps are
/// expected on non-trading days. The store owns mutation; readers get
/// clones of the whole view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series from bars already ordered ascending by date.
    ///
    /// Returns `None` if the ordering/uniqueness invariant is violated.
    #[must_use]
    pub fn from_sorted(bars: Vec<Bar>) -> Option<Self> {
        let ordered = bars.windows(2).all(|w| w[0].date < w[1].date);
        if ordered { Some(Self { bars }) } else { None }
    }

    /// Empty series.
    #[must_use]
    pub const fn empty() -> Self {
        Self { bars: Vec::new() }
    }

    /// Number of bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series holds no bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Date of the most recent bar, if any.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Most recent bar, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bars ordered ascending by date.
    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Closing prices of the last two bars: (latest, previous).
    #[must_use]
    pub fn last_two_closes(&self) -> (Option<f64>, Option<f64>) {
        let n = self.bars.len();
        let latest = self.bars.last().map(|b| b.close);
        let previous = n.checked_sub(2).and_then(|i| self.bars.get(i)).map(|b| b.close);
        (latest, previous)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

// ============================================================================
// Clock State
// ============================================================================

/// Single-writer/multi-reader snapshot of local and market-timezone time.
///
/// Published wholesale by the market clock every tick so readers never
/// observe a torn mix of old/new fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    /// Wall-clock time in the process-local timezone.
    pub local_time: NaiveTime,
    /// Calendar date in the process-local timezone.
    pub local_date: NaiveDate,
    /// Wall-clock time in the market timezone.
    pub market_time: NaiveTime,
    /// Calendar date in the market timezone.
    pub market_date: NaiveDate,
    /// Whether the market is currently open.
    pub market_open: bool,
}

// ============================================================================
// Quote Snapshots
// ============================================================================

/// Fields returned by the remote source's current-quote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDetails {
    /// Company long name.
    pub long_name: String,
    /// Full exchange name.
    pub full_exchange_name: String,
    /// Best bid price.
    pub bid: f64,
    /// Bid size (board lots).
    pub bid_size: f64,
    /// Best ask price.
    pub ask: f64,
    /// Ask size (board lots).
    pub ask_size: f64,
    /// Market capitalization.
    pub market_cap: f64,
}

/// Ephemeral per-refresh-cycle quote view published to display windows.
///
/// Replaced wholesale each cycle; readers must not assume monotonic fields
/// across replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    /// Current-quote fields from the remote source.
    pub details: QuoteDetails,
    /// Close of the most recent bar in the refreshed read view.
    pub last_close: Option<f64>,
    /// Close of the bar before it, for change/flash computation.
    pub previous_close: Option<f64>,
}

// ============================================================================
// Symbol Directory and Access Log
// ============================================================================

/// One row of the symbol directory table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolListing {
    /// Ticker symbol (primary key).
    pub symbol: String,
    /// Security name as listed.
    pub security_name: String,
}

/// Logical table operation recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Table read.
    Read,
    /// Table write.
    Write,
}

impl Operation {
    /// Stable string form stored in the logs table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only access-log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    /// When the operation happened.
    pub timestamp: DateTime<Utc>,
    /// Logical table name.
    pub table_name: String,
    /// Read or write.
    pub operation: Operation,
}
