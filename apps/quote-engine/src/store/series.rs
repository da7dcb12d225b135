//! Per-symbol time-series store.
//!
//! Each tracked symbol owns one table named after the ticker, created
//! lazily on first open with the fixed OHLCV schema. Mutation happens two
//! ways only: `bulk_insert` for the initial backfill of an empty table,
//! and `upsert_recent` for gap-fill and last-row refresh. Both run in a
//! single scoped transaction, so a failed batch leaves the table exactly
//! as it was.

use chrono::NaiveDate;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, info};

use super::access_log::AccessLog;
use super::{Db, table_ident};
use crate::error::StoreError;
use crate::models::{Bar, Operation, Series};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Store for one symbol's daily bars.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    db: Db,
    log: AccessLog,
    symbol: String,
    table: String,
}

impl SeriesStore {
    /// Open the store for `symbol`, creating its table if missing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSymbol` for tickers unusable as identifiers, or a
    /// store error if table creation fails.
    pub async fn open(db: &Db, symbol: &str) -> Result<Self, StoreError> {
        let table = table_ident(symbol)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                Date TEXT PRIMARY KEY,
                High REAL NOT NULL,
                Low REAL NOT NULL,
                Open REAL NOT NULL,
                Close REAL NOT NULL,
                Volume REAL NOT NULL,
                AdjClose REAL NOT NULL
            )"
        ))
        .execute(db.pool())
        .await?;

        debug!(symbol = %table, "series table ready");
        Ok(Self {
            db: db.clone(),
            log: AccessLog::new(db.clone()),
            symbol: table.clone(),
            table,
        })
    }

    /// The symbol this store serves.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Read the full series, ordered ascending by date.
    pub async fn read_all(&self) -> Result<Series, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT Date, High, Low, Open, Close, Volume, AdjClose
             FROM \"{}\" ORDER BY Date ASC",
            self.table
        ))
        .fetch_all(self.db.pool())
        .await?;

        let bars = rows
            .iter()
            .map(row_to_bar)
            .collect::<Result<Vec<_>, _>>()?;

        self.log.record(&self.table, Operation::Read).await?;

        Series::from_sorted(bars).ok_or_else(|| {
            StoreError::Query(format!("table '{}' violates date ordering", self.table))
        })
    }

    /// Insert all `bars` into an empty table, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if any date already exists; no rows are kept.
    pub async fn bulk_insert(&self, bars: &[Bar]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;

        for bar in bars {
            sqlx::query(&format!(
                "INSERT INTO \"{}\" (Date, High, Low, Open, Close, Volume, AdjClose)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                self.table
            ))
            .bind(bar.date.format(DATE_FORMAT).to_string())
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.open)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.adj_close)
            .execute(&mut *tx)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict { .. } => StoreError::Conflict {
                    table: self.table.clone(),
                },
                other => other,
            })?;
        }

        tx.commit().await?;
        self.log.record(&self.table, Operation::Write).await?;

        info!(symbol = %self.symbol, rows = bars.len(), "bulk insert committed");
        Ok(())
    }

    /// Insert-or-replace each bar by date, all in one transaction.
    ///
    /// Used for gap-fill and last-row refresh; either the whole batch
    /// commits or none of it does.
    pub async fn upsert_recent(&self, bars: &[Bar]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;

        for bar in bars {
            sqlx::query(&format!(
                "INSERT OR REPLACE INTO \"{}\" (Date, High, Low, Open, Close, Volume, AdjClose)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                self.table
            ))
            .bind(bar.date.format(DATE_FORMAT).to_string())
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.open)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.adj_close)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.log.record(&self.table, Operation::Write).await?;

        debug!(symbol = %self.symbol, rows = bars.len(), "upsert committed");
        Ok(())
    }
}

fn row_to_bar(row: &SqliteRow) -> Result<Bar, StoreError> {
    let raw_date: String = row.try_get("Date")?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| StoreError::Query(format!("bad date '{raw_date}': {e}")))?;

    Ok(Bar {
        date,
        high: row.try_get("High")?,
        low: row.try_get("Low")?,
        open: row.try_get("Open")?,
        close: row.try_get("Close")?,
        volume: row.try_get("Volume")?,
        adj_close: row.try_get("AdjClose")?,
    })
}
