//! Remote quote source port.
//!
//! Two logical calls feed the engine: historical daily bars (optionally
//! from a start date) and the current quote for a symbol. A third call
//! downloads the exchange symbol directory for the validation/autocomplete
//! collaborator. The engine depends only on the [`QuoteSource`] trait;
//! [`yahoo::YahooSource`] is the production adapter.

pub mod retry;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Bar, QuoteDetails, SymbolListing};

/// Errors from the remote quote source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Transient network or server failure; the caller may retry.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// The symbol is unknown to the source. Never retried.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// The response arrived but could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether a retry may help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Port to the remote quote source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch daily bars for `symbol`, ordered ascending by date.
    ///
    /// `start = None` means the entire available history. When `start` is
    /// given, the source returns bars from that date (inclusive) through
    /// the most recent session.
    async fn historical(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, FetchError>;

    /// Fetch the current quote fields for `symbol`.
    async fn current_quote(&self, symbol: &str) -> Result<QuoteDetails, FetchError>;

    /// Download the full exchange symbol directory.
    async fn symbol_directory(&self) -> Result<Vec<SymbolListing>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(FetchError::Transient("503".to_string()).is_retryable());
        assert!(!FetchError::SymbolNotFound("ZZZZ".to_string()).is_retryable());
        assert!(!FetchError::Parse("bad json".to_string()).is_retryable());
    }
}
