//! Append-only access log.
//!
//! Records one timestamped row per logical table read or write. The only
//! consumer today is the staleness check ("when was this table last
//! written?") used by the symbol directory cache, but the log is kept for
//! every table so future cleanup jobs can reason about cold tables.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::debug;

use super::Db;
use crate::error::StoreError;
use crate::models::{AccessLogEntry, Operation};

/// Access log over the fixed `logs` table.
#[derive(Debug, Clone)]
pub struct AccessLog {
    db: Db,
}

impl AccessLog {
    /// Wrap the shared database handle.
    #[must_use]
    pub const fn new(db: Db) -> Self {
        Self { db }
    }

    /// Append an entry for `table` with the current timestamp.
    pub async fn record(&self, table: &str, op: Operation) -> Result<(), StoreError> {
        let timestamp = format_timestamp(Utc::now());
        sqlx::query("INSERT INTO logs (Timestamp, TableName, Operation) VALUES (?, ?, ?)")
            .bind(&timestamp)
            .bind(table)
            .bind(op.as_str())
            .execute(self.db.pool())
            .await?;

        debug!(table, op = %op, "access logged");
        Ok(())
    }

    /// Timestamp of the most recent matching entry, or `None`.
    pub async fn last_operation(
        &self,
        table: &str,
        op: Operation,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query(
            "SELECT Timestamp FROM logs
             WHERE TableName = ? AND Operation = ?
             ORDER BY Timestamp DESC LIMIT 1",
        )
        .bind(table)
        .bind(op.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|r| {
            let raw: String = r.try_get("Timestamp").map_err(StoreError::from)?;
            parse_timestamp(&raw)
        })
        .transpose()
    }

    /// All entries for a table, oldest first. Used by tests and cleanup.
    pub async fn entries(&self, table: &str) -> Result<Vec<AccessLogEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT Timestamp, TableName, Operation FROM logs
             WHERE TableName = ? ORDER BY Timestamp ASC",
        )
        .bind(table)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|r| {
                let raw: String = r.try_get("Timestamp")?;
                let table_name: String = r.try_get("TableName")?;
                let op_raw: String = r.try_get("Operation")?;
                let operation = if op_raw == "write" {
                    Operation::Write
                } else {
                    Operation::Read
                };
                Ok(AccessLogEntry {
                    timestamp: parse_timestamp(&raw)?,
                    table_name,
                    operation,
                })
            })
            .collect()
    }
}

/// Fixed-width UTC timestamp so lexicographic order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("bad log timestamp '{raw}': {e}")))
}
