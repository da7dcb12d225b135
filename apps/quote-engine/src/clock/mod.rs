//! Shared market clock.
//!
//! One clock task runs per process, independent of any symbol. Every tick
//! (default 100ms) it recomputes local and market-timezone date/time plus
//! the market-open signal, and publishes the whole [`ClockState`] through
//! a watch channel. Readers borrow the latest snapshot without blocking
//! the updater, and replacement is wholesale, so a reader can never see a
//! torn mix of old and new fields.
//!
//! Shutdown is cooperative: [`MarketClockHandle::stop`] flips a flag the
//! loop observes at the next tick boundary.

pub mod calendar;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{ClockConfig, ConfigError};
use crate::models::ClockState;

/// Handle to the running market clock.
///
/// Cheap to clone; every refresh engine holds one read-only subscription.
#[derive(Debug, Clone)]
pub struct MarketClockHandle {
    state_rx: watch::Receiver<ClockState>,
    alive: Arc<AtomicBool>,
}

impl MarketClockHandle {
    /// Subscribe to clock snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClockState> {
        self.state_rx.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn current(&self) -> ClockState {
        *self.state_rx.borrow()
    }

    /// Request the clock loop to exit at its next tick boundary.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    /// Whether the loop has been asked to keep running.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

/// Process-wide clock source.
pub struct MarketClock;

impl MarketClock {
    /// Start the background clock task and return its handle.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configured market
    /// timezone is unknown.
    pub fn start(config: &ClockConfig) -> Result<MarketClockHandle, ConfigError> {
        let tz: Tz = config.market_timezone.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "clock.market_timezone '{}' is not a known timezone",
                config.market_timezone
            ))
        })?;

        let (state_tx, state_rx) = watch::channel(snapshot_at(Utc::now(), tz));
        let alive = Arc::new(AtomicBool::new(true));
        let tick = std::time::Duration::from_millis(config.tick_ms);

        let loop_alive = Arc::clone(&alive);
        tokio::spawn(async move {
            info!(timezone = %tz, tick_ms = tick.as_millis(), "Market clock started");
            while loop_alive.load(Ordering::Relaxed) {
                state_tx.send_replace(snapshot_at(Utc::now(), tz));
                tokio::time::sleep(tick).await;
            }
            debug!("Market clock stopped");
        });

        Ok(MarketClockHandle { state_rx, alive })
    }
}

/// Compute the clock snapshot for a given instant.
///
/// Split out from the loop so the calendar/session logic is testable
/// without spawning the task.
#[must_use]
pub fn snapshot_at(now: DateTime<Utc>, tz: Tz) -> ClockState {
    let local = now.with_timezone(&Local);
    let market = now.with_timezone(&tz);
    let market_date = market.date_naive();
    let market_time = market.time();

    ClockState {
        local_time: local.time(),
        local_date: local.date_naive(),
        market_time,
        market_date,
        market_open: calendar::market_open_at(market_date, market_time),
    }
}
