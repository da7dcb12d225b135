//! Error taxonomy for the quote engine.
//!
//! Failures split into three tiers:
//!
//! | Error | Scope | Retried |
//! |-------|-------|---------|
//! | [`FetchError::Transient`](crate::source::FetchError) | one fetch attempt | up to 3x |
//! | [`FetchError::SymbolNotFound`](crate::source::FetchError) | one engine | never |
//! | [`StoreError::Unavailable`] | process-wide persistence | never |
//! | [`StoreError::Conflict`] | planner/store disagreement | never (bug-level) |
//!
//! Fetch and commit failures are caught at the engine boundary and turned
//! into a status string plus a loop halt for that symbol; they never crash
//! sibling engines or the market clock.

use thiserror::Error;

use crate::source::FetchError;

/// Errors from the SQLite-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence layer is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A bulk insert hit an existing primary key. Indicates the planner
    /// and the store disagree about table contents.
    #[error("duplicate key in table '{table}'")]
    Conflict {
        /// Table the insert targeted.
        table: String,
    },

    /// Query execution or row decoding failed.
    #[error("query error: {0}")]
    Query(String),

    /// The symbol cannot be used as a table identifier.
    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict {
                table: String::new(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote fetch failed (after retries, where applicable).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The refresh loop gave up after consecutive transient failures.
    #[error("connection error: {attempts} consecutive fetch failures")]
    Connection {
        /// How many attempts were made before halting.
        attempts: u32,
    },
}
