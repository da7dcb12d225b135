//! Yahoo Finance adapter for the [`QuoteSource`] port.
//!
//! Uses the v8 chart API for daily bars, the v7 quote API for the
//! current-quote fields, and the Nasdaq Trader symbol directory file for
//! listings. Base URLs are injectable so tests can point the adapter at a
//! local mock server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{FetchError, QuoteSource};
use crate::models::{Bar, QuoteDetails, SymbolListing};

const DEFAULT_CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DEFAULT_QUOTE_BASE: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const DEFAULT_DIRECTORY_URL: &str =
    "https://www.nasdaqtrader.com/dynamic/symdir/nasdaqlisted.txt";

/// Yahoo Finance quote source.
#[derive(Debug, Clone)]
pub struct YahooSource {
    client: Client,
    chart_base: String,
    quote_base: String,
    directory_url: String,
    market_tz: Tz,
}

impl YahooSource {
    /// Create an adapter against the public Yahoo endpoints.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transient` if the HTTP client cannot be built.
    pub fn new(market_tz: Tz) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("stockwatch-quote-engine/0.1")
            .build()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            chart_base: DEFAULT_CHART_BASE.to_string(),
            quote_base: DEFAULT_QUOTE_BASE.to_string(),
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            market_tz,
        })
    }

    /// Override endpoint bases (used by tests against a mock server).
    #[must_use]
    pub fn with_base_urls(
        mut self,
        chart_base: impl Into<String>,
        quote_base: impl Into<String>,
        directory_url: impl Into<String>,
    ) -> Self {
        self.chart_base = chart_base.into();
        self.quote_base = quote_base.into();
        self.directory_url = directory_url.into();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::SymbolNotFound(url.to_string()));
        }
        if !status.is_success() {
            // Rate limits and gateway errors are worth retrying.
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }
}

#[async_trait]
impl QuoteSource for YahooSource {
    async fn historical(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, FetchError> {
        let url = match start {
            Some(date) => {
                let period1 = date.and_time(NaiveTime::MIN).and_utc().timestamp();
                let period2 = Utc::now().timestamp();
                format!(
                    "{}/{symbol}?interval=1d&period1={period1}&period2={period2}",
                    self.chart_base
                )
            }
            None => format!("{}/{symbol}?interval=1d&range=max", self.chart_base),
        };

        debug!(symbol, start = ?start, "fetching historical bars");
        let body = self.get_text(&url).await?;
        let response: ChartResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        if let Some(error) = response.chart.error {
            if error.code.eq_ignore_ascii_case("not found") {
                return Err(FetchError::SymbolNotFound(symbol.to_string()));
            }
            return Err(FetchError::Transient(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        let result = response
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))?;

        Ok(chart_to_bars(&result, self.market_tz))
    }

    async fn current_quote(&self, symbol: &str) -> Result<QuoteDetails, FetchError> {
        let url = format!("{}?symbols={symbol}", self.quote_base);
        debug!(symbol, "fetching current quote");
        let body = self.get_text(&url).await?;
        let response: QuoteResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let result = response
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))?;

        Ok(QuoteDetails {
            long_name: result.long_name.unwrap_or_default(),
            full_exchange_name: result.full_exchange_name.unwrap_or_default(),
            bid: result.bid.unwrap_or_default(),
            bid_size: result.bid_size.unwrap_or_default(),
            ask: result.ask.unwrap_or_default(),
            ask_size: result.ask_size.unwrap_or_default(),
            market_cap: result.market_cap.unwrap_or_default(),
        })
    }

    async fn symbol_directory(&self) -> Result<Vec<SymbolListing>, FetchError> {
        debug!("fetching symbol directory");
        let body = self.get_text(&self.directory_url).await?;
        Ok(parse_directory(&body))
    }
}

/// Convert a chart result into date-keyed bars.
///
/// Rows with missing fields are dropped; duplicate dates (the in-progress
/// session can appear twice) collapse to the latest row.
fn chart_to_bars(result: &ChartResult, tz: Tz) -> Vec<Bar> {
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };
    let adjclose = result
        .indicators
        .adjclose
        .as_ref()
        .and_then(|blocks| blocks.first());

    let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(instant) = DateTime::<Utc>::from_timestamp(*ts, 0) else {
            continue;
        };
        let date = instant.with_timezone(&tz).date_naive();

        let fields = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields else {
            continue;
        };
        let adj_close = adjclose
            .and_then(|block| block.adjclose.get(i).copied().flatten())
            .unwrap_or(close);

        by_date.insert(
            date,
            Bar {
                date,
                open,
                high,
                low,
                close,
                adj_close,
                volume,
            },
        );
    }

    by_date.into_values().collect()
}

/// Parse the pipe-delimited Nasdaq symbol directory file.
fn parse_directory(body: &str) -> Vec<SymbolListing> {
    body.lines()
        .skip(1) // header row
        .filter(|line| !line.starts_with("File Creation Time"))
        .filter_map(|line| {
            let mut fields = line.split('|');
            let symbol = fields.next()?.trim();
            let security_name = fields.next()?.trim();
            let test_issue = fields.nth(1).unwrap_or("N").trim();
            if symbol.is_empty() || test_issue == "Y" {
                return None;
            }
            Some(SymbolListing {
                symbol: symbol.to_string(),
                security_name: security_name.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    adjclose: Option<Vec<AdjCloseBlock>>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(default)]
    result: Vec<QuoteResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResult {
    long_name: Option<String>,
    full_exchange_name: Option<String>,
    bid: Option<f64>,
    bid_size: Option<f64>,
    ask: Option<f64>,
    ask_size: Option<f64>,
    market_cap: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn new_york() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn source_for(server: &MockServer) -> YahooSource {
        YahooSource::new(new_york()).unwrap().with_base_urls(
            format!("{}/v8/finance/chart", server.uri()),
            format!("{}/v7/finance/quote", server.uri()),
            format!("{}/dynamic/symdir/nasdaqlisted.txt", server.uri()),
        )
    }

    fn chart_body() -> serde_json::Value {
        // Two sessions: 2026-08-20 and 2026-08-21, 13:30 UTC == 09:30 EDT
        serde_json::json!({
            "chart": {
                "result": [{
                    "timestamp": [1_787_232_600i64, 1_787_319_000i64],
                    "indicators": {
                        "quote": [{
                            "open": [10.0, 11.0],
                            "high": [12.0, 13.0],
                            "low": [9.0, 10.0],
                            "close": [11.0, 12.0],
                            "volume": [1000.0, 2000.0]
                        }],
                        "adjclose": [{ "adjclose": [11.0, 12.0] }]
                    }
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn historical_parses_bars() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ACME"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
            .mount(&server)
            .await;

        let bars = source_for(&server).historical("ACME", None).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].date < bars[1].date);
        assert_eq!(bars[1].close, 12.0);
        assert_eq!(bars[1].volume, 2000.0);
    }

    #[tokio::test]
    async fn historical_maps_404_to_symbol_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = source_for(&server).historical("NOPE", None).await.unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn historical_maps_server_errors_to_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).historical("ACME", None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn current_quote_parses_fields() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "quoteResponse": {
                "result": [{
                    "longName": "Acme Corporation",
                    "fullExchangeName": "NasdaqGS",
                    "bid": 11.9, "bidSize": 8.0,
                    "ask": 12.1, "askSize": 10.0,
                    "marketCap": 1_000_000_000.0
                }],
                "error": null
            }
        });
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let quote = source_for(&server).current_quote("ACME").await.unwrap();
        assert_eq!(quote.long_name, "Acme Corporation");
        assert_eq!(quote.full_exchange_name, "NasdaqGS");
        assert_eq!(quote.bid, 11.9);
        assert_eq!(quote.ask_size, 10.0);
    }

    #[tokio::test]
    async fn empty_quote_result_is_symbol_not_found() {
        let server = MockServer::start().await;
        let body = serde_json::json!({ "quoteResponse": { "result": [], "error": null } });
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = source_for(&server).current_quote("NOPE").await.unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound(_)));
    }

    #[tokio::test]
    async fn directory_parses_listing_file() {
        let server = MockServer::start().await;
        let body = "Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares\n\
                    AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N\n\
                    ZTST|Test Listing|Q|Y|N|100|N|N\n\
                    File Creation Time: 0821202622:01|||||||";
        Mock::given(method("GET"))
            .and(path("/dynamic/symdir/nasdaqlisted.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let listings = source_for(&server).symbol_directory().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].symbol, "AAPL");
        assert_eq!(listings[0].security_name, "Apple Inc. - Common Stock");
    }

    #[test]
    fn chart_rows_with_missing_fields_are_dropped() {
        let result = ChartResult {
            timestamp: vec![1_787_232_600, 1_787_319_000],
            indicators: Indicators {
                quote: vec![QuoteBlock {
                    open: vec![Some(10.0), None],
                    high: vec![Some(12.0), Some(13.0)],
                    low: vec![Some(9.0), Some(10.0)],
                    close: vec![Some(11.0), Some(12.0)],
                    volume: vec![Some(1000.0), Some(2000.0)],
                }],
                adjclose: None,
            },
        };
        let bars = chart_to_bars(&result, new_york());
        assert_eq!(bars.len(), 1);
        // Missing adjclose block falls back to close.
        assert_eq!(bars[0].adj_close, bars[0].close);
    }
}
