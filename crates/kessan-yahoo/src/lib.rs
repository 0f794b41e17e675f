#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance price history for Tokyo Stock Exchange listings.
//!
//! Implements [`PriceDataProvider`] on top of the chart API. Security codes
//! are queried with the `.T` suffix; bars are dated in Japan time.
//!
//! # Example
//!
//! ```no_run
//! use kessan_yahoo::YahooProvider;
//! use kessan_core::{PriceDataProvider, SecurityCode, DataFrequency};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> kessan_core::Result<()> {
//! let provider = YahooProvider::new();
//! let code = SecurityCode::new("7203");
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!
//! let df = provider.fetch_ohlcv(&code, start, end, DataFrequency::Daily).await?;
//! println!("Fetched {} rows", df.height());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use kessan_core::{
    DataError, DataFrequency, DataProvider, PriceDataProvider, Result, SecurityCode,
};
use polars::prelude::*;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

/// Chart endpoint; the `.T` symbol is appended as a path segment.
pub const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Minimum gap between two chart requests.
pub const DEFAULT_REQUEST_GAP: Duration = Duration::from_secs(1);

// The chart API rejects requests without a browser-like agent.
const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const JST_OFFSET_SECS: i64 = 9 * 3600;

/// Daily, weekly and monthly bars for TSE codes.
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    request_gap_ms: u64,
    last_request_ms: AtomicU64,
}

impl YahooProvider {
    /// Provider spacing requests by [`DEFAULT_REQUEST_GAP`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(DEFAULT_REQUEST_GAP)
    }

    /// Provider over a caller-built client. The client should send a
    /// browser-like user agent.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: CHART_API_URL.to_string(),
            request_gap_ms: DEFAULT_REQUEST_GAP.as_millis() as u64,
            last_request_ms: AtomicU64::new(0),
        }
    }

    /// Provider waiting at least `gap` between requests.
    #[must_use]
    pub fn with_rate_limit(gap: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            request_gap_ms: gap.as_millis() as u64,
            ..Self::with_client(client)
        }
    }

    /// Overrides the chart API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn throttle(&self) {
        let since_last = epoch_millis().saturating_sub(self.last_request_ms.load(Ordering::Relaxed));
        if let Some(wait) = self.request_gap_ms.checked_sub(since_last).filter(|w| *w > 0) {
            debug!(wait_ms = wait, "Throttling chart request");
            sleep(Duration::from_millis(wait)).await;
        }
        self.last_request_ms.store(epoch_millis(), Ordering::Relaxed);
    }

    /// `period1`/`period2` bound the range in Japan time, end inclusive.
    fn build_chart_url(
        &self,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).map_or(0, jst_timestamp);
        let end_ts = end.and_hms_opt(23, 59, 59).map_or(0, jst_timestamp);

        let interval = match frequency {
            DataFrequency::Weekly => "1wk",
            DataFrequency::Monthly => "1mo",
            _ => "1d",
        };

        format!(
            "{}/{}?period1={}&period2={}&interval={}&includeAdjustedClose=true",
            self.base_url,
            code.yahoo_symbol(),
            start_ts,
            end_ts,
            interval
        )
    }
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

fn jst_timestamp(local: NaiveDateTime) -> i64 {
    local.and_utc().timestamp() - JST_OFFSET_SECS
}

fn jst_date(timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp(timestamp + JST_OFFSET_SECS, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default()
}

/// Parse a chart response into an OHLCV DataFrame.
///
/// Columns: `symbol`, `date`, `open`, `high`, `low`, `close`, `volume`,
/// `adjusted_close`. Missing adjusted closes fall back to the close.
fn parse_chart_response(code: &SecurityCode, response: ChartResponse) -> Result<DataFrame> {
    if let Some(error) = response.chart.error {
        if error.code == "Not Found" {
            return Err(DataError::SymbolNotFound(code.to_string()));
        }
        return Err(DataError::Other(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let result = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound(code.to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Err(DataError::DataNotAvailable {
            symbol: code.to_string(),
            start: "N/A".to_string(),
            end: "N/A".to_string(),
        });
    }

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Parse("Missing quote data".to_string()))?;

    let adj_close = result
        .indicators
        .adjclose
        .and_then(|ac| ac.into_iter().next())
        .map(|ac| ac.adjclose)
        .unwrap_or_default();

    // Days since the Unix epoch, in Japan time
    let epoch = NaiveDate::default();
    let dates: Vec<i32> = timestamps
        .iter()
        .map(|&ts| (jst_date(ts) - epoch).num_days() as i32)
        .collect();

    let len = dates.len();
    let column = |values: Vec<Option<f64>>| -> Vec<Option<f64>> {
        let mut values = values;
        values.resize(len, None);
        values
    };

    let closes = column(quote.close);
    let adj_closes = if adj_close.len() == len {
        adj_close
    } else {
        closes.clone()
    };

    let date_col = Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .map_err(|e| DataError::Other(e.to_string()))?;

    DataFrame::new(vec![
        Column::new("symbol".into(), vec![code.as_str(); len]),
        date_col,
        Column::new("open".into(), column(quote.open)),
        Column::new("high".into(), column(quote.high)),
        Column::new("low".into(), column(quote.low)),
        Column::new("close".into(), closes),
        Column::new("volume".into(), column(quote.volume)),
        Column::new("adjusted_close".into(), adj_closes),
    ])
    .map_err(|e| DataError::Other(e.to_string()))
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn description(&self) -> &str {
        "Yahoo Finance price history for Tokyo Stock Exchange listings"
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        &[
            DataFrequency::Daily,
            DataFrequency::Weekly,
            DataFrequency::Monthly,
        ]
    }
}

#[async_trait]
impl PriceDataProvider for YahooProvider {
    async fn fetch_ohlcv(
        &self,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<DataFrame> {
        if start > end {
            return Err(DataError::InvalidParameter(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        if frequency.is_fundamental() {
            return Err(DataError::NotSupported(format!(
                "{:?} bars are not available from Yahoo Finance",
                frequency
            )));
        }

        self.throttle().await;

        let url = self.build_chart_url(code, start, end, frequency);
        debug!(%url, "Requesting chart");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(DataError::RateLimited {
                    provider: self.name().to_string(),
                    retry_after: Some(Duration::from_secs(60)),
                });
            }
            reqwest::StatusCode::NOT_FOUND => {
                return Err(DataError::SymbolNotFound(code.to_string()));
            }
            status => {
                return Err(DataError::Network(format!("chart request for {code} returned {status}")));
            }
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataError::Parse(format!("chart response for {code}: {e}")))?;

        parse_chart_response(code, body)
    }
}

// Chart API payload.

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}
