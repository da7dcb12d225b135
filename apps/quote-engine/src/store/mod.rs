//! Local SQLite persistence.
//!
//! One [`Db`] (and one connection pool) is shared by every store in the
//! process. Each logical operation runs in its own scoped transaction, so
//! concurrent commits from different symbol engines never interleave
//! partial writes.
//!
//! Fixed tables are created at connect time; per-symbol bar tables are
//! created lazily by [`series::SeriesStore`] on first access.

pub mod access_log;
pub mod directory;
pub mod series;
pub mod staleness;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::StoreError;

/// Shared handle to the local database.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database file and bootstrap the
    /// fixed tables.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the file cannot be opened.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let db = Self { pool };
        db.bootstrap().await?;

        info!(path = %config.path, "Database connection pool initialized");
        Ok(db)
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the fixed tables if they do not exist.
    async fn bootstrap(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS logs (
                Timestamp TEXT PRIMARY KEY,
                TableName TEXT NOT NULL,
                Operation TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS symbols (
                Symbol TEXT PRIMARY KEY,
                SecurityName TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Validate a symbol for use as a table identifier.
///
/// Symbols are uppercased tickers; anything outside `A-Z0-9.-` would need
/// quoting games and is rejected outright.
pub(crate) fn table_ident(symbol: &str) -> Result<String, StoreError> {
    let upper = symbol.trim().to_ascii_uppercase();
    let valid = !upper.is_empty()
        && upper
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if valid {
        Ok(upper)
    } else {
        Err(StoreError::InvalidSymbol(symbol.to_string()))
    }
}

#[cfg(test)]
pub(crate) async fn test_db(dir: &tempfile::TempDir) -> Db {
    let config = DatabaseConfig {
        path: dir
            .path()
            .join("stocks.db")
            .to_string_lossy()
            .into_owned(),
        max_connections: 5,
    };
    Db::connect(&config).await.unwrap()
}
