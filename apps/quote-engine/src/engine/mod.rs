//! Per-symbol refresh engine.
//!
//! One engine task runs per watched symbol. Each cycle it reads the local
//! series, asks the [`planner`] for the minimal fetch, pulls bars and the
//! current quote from the source with bounded retries, commits through the
//! store's transactional writes, and publishes a fresh read view plus
//! [`QuoteSnapshot`] for display consumers.
//!
//! While the market-open signal is false the engine idles instead of
//! fetching; the first cycle after start always fetches so a freshly
//! watched symbol paints immediately even on a weekend. After the
//! configured fetch attempts are exhausted in one cycle the engine halts
//! and stays halted until restarted.

pub mod planner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::error::EngineError;
use crate::models::{Bar, ClockState, QuoteDetails, QuoteSnapshot, Series};
use crate::source::QuoteSource;
use crate::source::retry::{BackoffCalculator, FetchRetryPolicy};
use crate::store::series::SeriesStore;
use planner::FetchPlan;

const STATUS_FETCHING: &str = "Fetching Data..";
const STATUS_FETCHED: &str = "Data Fetched";
const STATUS_HALTED: &str = "Error: Unable to fetch data";
const STATUS_MARKET_CLOSED: &str = "Market Closed, Auto Update Disabled";
const STATUS_STOPPED: &str = "Stopped";

fn retrying_text(attempt: u32) -> String {
    format!("Error.. Retrying..{attempt}")
}

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of a symbol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, no cycle run yet.
    Init,
    /// Mid-cycle, talking to the remote source.
    Fetching,
    /// Mid-cycle, writing fetched rows to the store.
    Committing,
    /// Between cycles.
    Idle,
    /// Gave up after exhausting fetch attempts; stays here until restart.
    Halted,
    /// Loop exited after a stop request.
    Stopped,
}

/// Published status of a symbol engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    /// Lifecycle state.
    pub state: EngineState,
    /// Human-readable status line for display windows.
    pub text: String,
    /// Measured wall-clock seconds between the last two cycle starts.
    pub measured_interval_secs: Option<f64>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Init,
            text: String::new(),
            measured_interval_secs: None,
        }
    }
}

#[derive(Debug, Default)]
struct Published {
    status: EngineStatus,
    view: Series,
    snapshot: Option<QuoteSnapshot>,
}

// ============================================================================
// Engine
// ============================================================================

/// Handle to one symbol's refresh loop.
///
/// Cheap to clone; all clones share the loop and its published state.
#[derive(Clone)]
pub struct SymbolEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: SeriesStore,
    source: Arc<dyn QuoteSource>,
    clock: watch::Receiver<ClockState>,
    policy: FetchRetryPolicy,
    cadence: Duration,
    alive: AtomicBool,
    running: AtomicBool,
    published: RwLock<Published>,
}

impl SymbolEngine {
    /// Build an engine for the symbol served by `store`.
    #[must_use]
    pub fn new(
        store: SeriesStore,
        source: Arc<dyn QuoteSource>,
        clock: watch::Receiver<ClockState>,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                source,
                clock,
                policy: FetchRetryPolicy::from(config),
                cadence: Duration::from_millis(config.cadence_ms),
                alive: AtomicBool::new(false),
                running: AtomicBool::new(false),
                published: RwLock::new(Published::default()),
            }),
        }
    }

    /// The symbol this engine refreshes.
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.inner.store.symbol()
    }

    /// Spawn the refresh loop. A second call while running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.alive.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run().await;
        });
    }

    /// Ask the loop to exit after the cycle in progress.
    pub fn stop(&self) {
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    /// Whether the loop task is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.inner.published.read().status.clone()
    }

    /// Latest committed read view of the series.
    #[must_use]
    pub fn read_view(&self) -> Series {
        self.inner.published.read().view.clone()
    }

    /// Latest quote snapshot, if a cycle has completed.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<QuoteSnapshot> {
        self.inner.published.read().snapshot.clone()
    }
}

impl EngineInner {
    async fn run(self: Arc<Self>) {
        info!(symbol = %self.store.symbol(), "refresh engine started");

        let mut first_run = true;
        let mut refetch = true;
        let mut last_cycle_start: Option<Instant> = None;
        let mut halted = false;

        while self.alive.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();
            let measured = last_cycle_start.map(|t| (cycle_start - t).as_secs_f64());
            last_cycle_start = Some(cycle_start);

            if first_run || refetch {
                if let Err(e) = self.run_cycle(measured).await {
                    match &e {
                        EngineError::Connection { attempts } => {
                            warn!(
                                symbol = %self.store.symbol(),
                                attempts,
                                "fetch attempts exhausted, halting"
                            );
                        }
                        other => {
                            error!(
                                symbol = %self.store.symbol(),
                                error = %other,
                                "refresh cycle failed, halting"
                            );
                        }
                    }
                    self.publish_status(EngineState::Halted, STATUS_HALTED.to_string(), measured);
                    halted = true;
                    break;
                }
                first_run = false;
            } else {
                self.publish_status(
                    EngineState::Idle,
                    STATUS_MARKET_CLOSED.to_string(),
                    measured,
                );
            }

            // Sampled once per cycle; the next cycle fetches only if the
            // market was open when this one finished.
            refetch = self.clock.borrow().market_open;

            let elapsed = cycle_start.elapsed();
            if elapsed < self.cadence {
                tokio::time::sleep(self.cadence - elapsed).await;
            }
        }

        if !halted {
            self.publish_status(EngineState::Stopped, STATUS_STOPPED.to_string(), None);
        }
        self.alive.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        info!(symbol = %self.store.symbol(), halted, "refresh engine exited");
    }

    async fn run_cycle(&self, measured: Option<f64>) -> Result<(), EngineError> {
        self.publish_status(EngineState::Fetching, STATUS_FETCHING.to_string(), measured);

        let view = self.store.read_all().await?;
        let plan = planner::plan(view.last_date(), &self.clock.borrow());
        debug!(symbol = %self.store.symbol(), ?plan, "cycle plan");

        let bars = self.fetch_bars(plan, measured).await?;

        self.publish_status(EngineState::Committing, STATUS_FETCHING.to_string(), measured);
        match plan {
            FetchPlan::FullFetch => self.store.bulk_insert(&bars).await?,
            FetchPlan::RefreshLast { .. } | FetchPlan::GapFill { .. } => {
                self.store.upsert_recent(&bars).await?;
            }
        }

        let details = self.fetch_quote(measured).await?;

        let view = self.store.read_all().await?;
        let (last_close, previous_close) = view.last_two_closes();

        let mut published = self.published.write();
        published.view = view;
        published.snapshot = Some(QuoteSnapshot {
            details,
            last_close,
            previous_close,
        });
        published.status = EngineStatus {
            state: EngineState::Idle,
            text: STATUS_FETCHED.to_string(),
            measured_interval_secs: measured,
        };
        Ok(())
    }

    async fn fetch_bars(
        &self,
        plan: FetchPlan,
        measured: Option<f64>,
    ) -> Result<Vec<Bar>, EngineError> {
        let start = match plan {
            FetchPlan::FullFetch => None,
            FetchPlan::RefreshLast { last } => Some(last),
            FetchPlan::GapFill { start } => Some(start),
        };

        let mut backoff = BackoffCalculator::new(&self.policy);
        loop {
            match self.source.historical(self.store.symbol(), start).await {
                Ok(bars) => return Ok(bars),
                Err(e) if e.is_retryable() => match backoff.next_backoff() {
                    Some(pause) => {
                        let attempt = backoff.attempt();
                        warn!(
                            symbol = %self.store.symbol(),
                            attempt,
                            error = %e,
                            "historical fetch failed, retrying"
                        );
                        self.publish_status(EngineState::Fetching, retrying_text(attempt), measured);
                        tokio::time::sleep(pause).await;
                    }
                    None => {
                        return Err(EngineError::Connection {
                            attempts: backoff.attempt(),
                        });
                    }
                },
                Err(e) => return Err(EngineError::Fetch(e)),
            }
        }
    }

    async fn fetch_quote(&self, measured: Option<f64>) -> Result<QuoteDetails, EngineError> {
        let mut backoff = BackoffCalculator::new(&self.policy);
        loop {
            match self.source.current_quote(self.store.symbol()).await {
                Ok(details) => return Ok(details),
                Err(e) if e.is_retryable() => match backoff.next_backoff() {
                    Some(pause) => {
                        let attempt = backoff.attempt();
                        warn!(
                            symbol = %self.store.symbol(),
                            attempt,
                            error = %e,
                            "quote fetch failed, retrying"
                        );
                        self.publish_status(EngineState::Fetching, retrying_text(attempt), measured);
                        tokio::time::sleep(pause).await;
                    }
                    None => {
                        return Err(EngineError::Connection {
                            attempts: backoff.attempt(),
                        });
                    }
                },
                Err(e) => return Err(EngineError::Fetch(e)),
            }
        }
    }

    fn publish_status(&self, state: EngineState, text: String, measured: Option<f64>) {
        let mut published = self.published.write();
        published.status = EngineStatus {
            state,
            text,
            measured_interval_secs: measured,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::calendar::market_open_at;
    use crate::source::{FetchError, MockQuoteSource};
    use crate::store::test_db;
    use chrono::NaiveDateTime;

    fn clock_at(market: &str) -> ClockState {
        let dt: NaiveDateTime = market.parse().unwrap();
        ClockState {
            local_date: dt.date(),
            local_time: dt.time(),
            market_date: dt.date(),
            market_time: dt.time(),
            market_open: market_open_at(dt.date(), dt.time()),
        }
    }

    fn bar(date: &str, close: f64) -> Bar {
        Bar {
            date: date.parse().unwrap(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            adj_close: close,
            volume: 10_000.0,
        }
    }

    fn details() -> QuoteDetails {
        QuoteDetails {
            long_name: "Acme Corp".to_string(),
            full_exchange_name: "NasdaqGS".to_string(),
            bid: 11.9,
            bid_size: 10.0,
            ask: 12.1,
            ask_size: 8.0,
            market_cap: 1_000_000.0,
        }
    }

    fn fast_config() -> RefreshConfig {
        RefreshConfig {
            cadence_ms: 5,
            max_fetch_attempts: 3,
            retry_backoff_ms: 1,
            retry_multiplier: 1.0,
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 5s");
    }

    #[tokio::test]
    async fn full_fetch_then_refresh_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let store = SeriesStore::open(&db, "ACME").await.unwrap();

        let mut source = MockQuoteSource::new();
        source.expect_historical().returning(|_, start| {
            Ok(match start {
                // Empty table: full history.
                None => vec![bar("2026-08-20", 10.0), bar("2026-08-21", 11.0)],
                // Later cycles refresh the newest row with moving values.
                Some(_) => vec![bar("2026-08-21", 11.5)],
            })
        });
        source.expect_current_quote().returning(|_| Ok(details()));

        // Friday mid-session: every cycle fetches.
        let (_clock_tx, clock_rx) = watch::channel(clock_at("2026-08-21T10:00:00"));
        let engine = SymbolEngine::new(store.clone(), Arc::new(source), clock_rx, &fast_config());

        engine.start();
        engine.start(); // idempotent

        let probe = engine.clone();
        wait_for(move || {
            probe.latest_snapshot().is_some() && probe.read_view().len() == 2
        })
        .await;

        let snapshot = engine.latest_snapshot().unwrap();
        assert_eq!(snapshot.details.long_name, "Acme Corp");
        assert_eq!(snapshot.previous_close, Some(10.0));

        // The refresh upsert replaced the newest row in the store.
        let probe = engine.clone();
        wait_for(move || probe.latest_snapshot().is_some_and(|s| s.last_close == Some(11.5))).await;
        let persisted = store.read_all().await.unwrap();
        assert_eq!(persisted.last().unwrap().close, 11.5);

        engine.stop();
        let probe = engine.clone();
        wait_for(move || !probe.is_running()).await;
        assert_eq!(engine.status().state, EngineState::Stopped);
    }

    #[tokio::test]
    async fn market_closed_fetches_once_then_idles() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let store = SeriesStore::open(&db, "ACME").await.unwrap();

        let mut source = MockQuoteSource::new();
        // The first cycle always fetches, even on a weekend.
        source
            .expect_historical()
            .times(1)
            .returning(|_, _| Ok(vec![bar("2026-08-21", 11.0)]));
        source
            .expect_current_quote()
            .times(1)
            .returning(|_| Ok(details()));

        // Saturday: market closed.
        let (_clock_tx, clock_rx) = watch::channel(clock_at("2026-08-22T12:00:00"));
        let engine = SymbolEngine::new(store, Arc::new(source), clock_rx, &fast_config());

        engine.start();
        let probe = engine.clone();
        wait_for(move || probe.status().text == STATUS_MARKET_CLOSED).await;

        // The first cycle's snapshot survives while the engine idles.
        assert_eq!(engine.latest_snapshot().unwrap().last_close, Some(11.0));
        assert_eq!(engine.status().state, EngineState::Idle);

        engine.stop();
        let probe = engine.clone();
        wait_for(move || !probe.is_running()).await;
    }

    #[tokio::test]
    async fn exhausted_retries_halt_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let store = SeriesStore::open(&db, "ACME").await.unwrap();

        let mut source = MockQuoteSource::new();
        source
            .expect_historical()
            .times(3)
            .returning(|_, _| Err(FetchError::Transient("connection refused".to_string())));

        let (_clock_tx, clock_rx) = watch::channel(clock_at("2026-08-21T10:00:00"));
        let engine = SymbolEngine::new(store.clone(), Arc::new(source), clock_rx, &fast_config());

        engine.start();
        let probe = engine.clone();
        wait_for(move || !probe.is_running()).await;

        let status = engine.status();
        assert_eq!(status.state, EngineState::Halted);
        assert_eq!(status.text, STATUS_HALTED);

        // Nothing was committed and no snapshot was published.
        assert!(engine.latest_snapshot().is_none());
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn symbol_not_found_halts_without_retrying() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let store = SeriesStore::open(&db, "ZZZZ").await.unwrap();

        let mut source = MockQuoteSource::new();
        source
            .expect_historical()
            .times(1)
            .returning(|_, _| Err(FetchError::SymbolNotFound("ZZZZ".to_string())));

        let (_clock_tx, clock_rx) = watch::channel(clock_at("2026-08-21T10:00:00"));
        let engine = SymbolEngine::new(store, Arc::new(source), clock_rx, &fast_config());

        engine.start();
        let probe = engine.clone();
        wait_for(move || !probe.is_running()).await;
        assert_eq!(engine.status().state, EngineState::Halted);
    }
}
