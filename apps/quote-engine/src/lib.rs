// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Quote Engine - data refresh and local time-series cache
//!
//! Core library for the `StockWatch` desktop quote watcher. Display windows
//! depend on this crate for everything except rendering:
//!
//! - `clock`: process-wide market clock publishing wholesale
//!   [`models::ClockState`] snapshots, plus the trading calendar
//! - `store`: SQLite-backed per-symbol bar tables, the append-only access
//!   log, and the cached exchange symbol directory
//! - `source`: the [`source::QuoteSource`] port to the remote quote API
//!   and its production Yahoo adapter
//! - `engine`: one refresh loop per watched symbol, planning the minimal
//!   fetch (full backfill, gap fill, or last-row refresh) and publishing
//!   read views and quote snapshots
//!
//! # Concurrency
//!
//! One clock task and one engine task per symbol run on the tokio runtime.
//! Engines never share mutable state with each other; the single SQLite
//! pool plus per-operation transactions keep concurrent commits isolated.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Modules
// =============================================================================

/// Market clock and trading calendar.
pub mod clock;

/// Configuration loading and validation.
pub mod config;

/// Per-symbol refresh engine and completion planner.
pub mod engine;

/// Error taxonomy shared across the crate.
pub mod error;

/// Plain data types: bars, series, clock state, quote snapshots.
pub mod models;

/// Remote quote source port, retry policy, and the Yahoo adapter.
pub mod source;

/// SQLite persistence: series tables, access log, symbol directory.
pub mod store;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{MarketClock, MarketClockHandle};
pub use config::{EngineConfig, load_config};
pub use engine::{EngineState, EngineStatus, SymbolEngine, planner::FetchPlan};
pub use error::{EngineError, StoreError};
pub use models::{Bar, ClockState, QuoteSnapshot, Series};
pub use source::{FetchError, QuoteSource, yahoo::YahooSource};
pub use store::{Db, directory::SymbolDirectory, series::SeriesStore};
