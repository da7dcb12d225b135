//! Cached symbol directory.
//!
//! The full exchange listing changes rarely, so it is cached in the
//! `symbols` table and refetched from the source only when the cache is
//! empty or its last write is at least a week old per [`StalenessPolicy`].

use chrono::Utc;
use sqlx::Row;
use tracing::{debug, info, warn};

use super::access_log::AccessLog;
use super::staleness::StalenessPolicy;
use super::Db;
use crate::config::DirectoryConfig;
use crate::error::StoreError;
use crate::models::{Operation, SymbolListing};
use crate::source::QuoteSource;

const SYMBOLS_TABLE: &str = "symbols";

/// Cache over the `symbols` table with staleness-driven refresh.
#[derive(Debug, Clone)]
pub struct SymbolDirectory {
    db: Db,
    log: AccessLog,
    policy: StalenessPolicy,
}

impl SymbolDirectory {
    /// Wrap the shared database handle with the configured refresh age.
    #[must_use]
    pub fn new(db: Db, config: &DirectoryConfig) -> Self {
        Self {
            log: AccessLog::new(db.clone()),
            db,
            policy: StalenessPolicy::days(i64::from(config.refresh_after_days)),
        }
    }

    /// All cached listings, ordered by symbol.
    pub async fn all(&self) -> Result<Vec<SymbolListing>, StoreError> {
        let rows = sqlx::query("SELECT Symbol, SecurityName FROM symbols ORDER BY Symbol ASC")
            .fetch_all(self.db.pool())
            .await?;

        self.log.record(SYMBOLS_TABLE, Operation::Read).await?;

        rows.into_iter()
            .map(|r| {
                Ok(SymbolListing {
                    symbol: r.try_get("Symbol")?,
                    security_name: r.try_get("SecurityName")?,
                })
            })
            .collect()
    }

    /// Whether `symbol` appears in the cached listing.
    pub async fn contains(&self, symbol: &str) -> Result<bool, StoreError> {
        let upper = symbol.trim().to_ascii_uppercase();
        let row = sqlx::query("SELECT 1 FROM symbols WHERE Symbol = ? LIMIT 1")
            .bind(&upper)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Refetch the directory from `source` if the cache is empty or stale.
    ///
    /// A fetch failure on a non-empty cache is logged and swallowed; the
    /// stale listing keeps serving until the next attempt.
    pub async fn ensure_fresh(&self, source: &dyn QuoteSource) -> Result<(), StoreError> {
        let count = self.count().await?;
        let last_write = self.log.last_operation(SYMBOLS_TABLE, Operation::Write).await?;

        if count > 0 && !self.policy.is_stale(last_write, Utc::now()) {
            debug!(count, "symbol directory fresh");
            return Ok(());
        }

        match source.symbol_directory().await {
            Ok(listings) => {
                self.replace_all(&listings).await?;
                info!(count = listings.len(), "symbol directory refreshed");
                Ok(())
            }
            Err(e) if count > 0 => {
                warn!(error = %e, "directory refresh failed, serving stale listing");
                Ok(())
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "symbol directory unavailable: {e}"
            ))),
        }
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM symbols")
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn replace_all(&self, listings: &[SymbolListing]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM symbols").execute(&mut *tx).await?;
        for listing in listings {
            sqlx::query("INSERT OR IGNORE INTO symbols (Symbol, SecurityName) VALUES (?, ?)")
                .bind(&listing.symbol)
                .bind(&listing.security_name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.log.record(SYMBOLS_TABLE, Operation::Write).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FetchError, MockQuoteSource};
    use crate::store::test_db;

    fn listing(symbol: &str, name: &str) -> SymbolListing {
        SymbolListing {
            symbol: symbol.to_string(),
            security_name: name.to_string(),
        }
    }

    fn directory(db: &Db) -> SymbolDirectory {
        SymbolDirectory::new(db.clone(), &DirectoryConfig::default())
    }

    #[tokio::test]
    async fn empty_cache_triggers_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let directory = directory(&db);

        let mut source = MockQuoteSource::new();
        source
            .expect_symbol_directory()
            .times(1)
            .returning(|| Ok(vec![listing("ACME", "Acme Corp"), listing("ZETA", "Zeta Inc")]));

        directory.ensure_fresh(&source).await.unwrap();

        let all = directory.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "ACME");
        assert!(directory.contains("acme").await.unwrap());
        assert!(!directory.contains("NOPE").await.unwrap());
    }

    #[tokio::test]
    async fn fresh_cache_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let directory = directory(&db);

        let mut source = MockQuoteSource::new();
        source
            .expect_symbol_directory()
            .times(1)
            .returning(|| Ok(vec![listing("ACME", "Acme Corp")]));
        directory.ensure_fresh(&source).await.unwrap();

        // Second call within the staleness window must not hit the source.
        let untouched = MockQuoteSource::new();
        directory.ensure_fresh(&untouched).await.unwrap();
        assert_eq!(directory.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_fetch_failure_keeps_old_listing() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let directory = SymbolDirectory::new(
            db.clone(),
            &DirectoryConfig {
                refresh_after_days: 0,
            },
        );

        let mut seed = MockQuoteSource::new();
        seed.expect_symbol_directory()
            .returning(|| Ok(vec![listing("ACME", "Acme Corp")]));
        directory.ensure_fresh(&seed).await.unwrap();

        // Zero-day policy makes the cache immediately stale; the failed
        // refetch must leave the existing rows in place.
        let mut broken = MockQuoteSource::new();
        broken
            .expect_symbol_directory()
            .returning(|| Err(FetchError::Transient("listing host down".to_string())));
        directory.ensure_fresh(&broken).await.unwrap();

        assert_eq!(directory.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_cache_fetch_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let directory = directory(&db);

        let mut broken = MockQuoteSource::new();
        broken
            .expect_symbol_directory()
            .returning(|| Err(FetchError::Transient("listing host down".to_string())));

        let err = directory.ensure_fresh(&broken).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn refresh_replaces_rather_than_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let directory = SymbolDirectory::new(
            db.clone(),
            &DirectoryConfig {
                refresh_after_days: 0,
            },
        );

        let mut first = MockQuoteSource::new();
        first
            .expect_symbol_directory()
            .returning(|| Ok(vec![listing("ACME", "Acme Corp"), listing("OLD", "Delisted")]));
        directory.ensure_fresh(&first).await.unwrap();

        let mut second = MockQuoteSource::new();
        second
            .expect_symbol_directory()
            .returning(|| Ok(vec![listing("ACME", "Acme Corp")]));
        directory.ensure_fresh(&second).await.unwrap();

        let all = directory.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].symbol, "ACME");
    }
}
