//! Yahoo Finance chart API adapter.
//!
//! # Endpoint
//! `GET {base}/v8/finance/chart/{ticker}?range=1y&interval=1d`
//!
//! The response carries parallel arrays (timestamps plus one array per OHLCV
//! field). Rows where any field is null are dropped rather than patched, so a
//! partially broken history shrinks instead of producing invented prices.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use lemniscate_common::config::ProviderConfig;

use super::provider::{BarProvider, ProviderError};
use super::PriceBar;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
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

// ============================================================================
// Parsing
// ============================================================================

/// Pick the smallest chart range that covers `lookback` trading days.
fn range_for_lookback(lookback: usize) -> &'static str {
    match lookback {
        0..=5 => "5d",
        6..=21 => "1mo",
        22..=63 => "3mo",
        64..=126 => "6mo",
        127..=252 => "1y",
        253..=504 => "2y",
        _ => "5y",
    }
}

/// Convert a chart payload into ascending bars, keeping the trailing `lookback`.
fn parse_chart(body: &str, ticker: &str, lookback: usize) -> Result<Vec<PriceBar>, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", ticker, e)))?;

    if let Some(err) = envelope.chart.error {
        return Err(ProviderError::DataNotAvailable(format!(
            "{}: {} {}",
            ticker, err.code, err.description
        )));
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| ProviderError::DataNotAvailable(ticker.to_string()))?;

    let offset = result.meta.as_ref().map(|m| m.gmtoffset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = timestamp_to_date(ts + offset)?;
            Some(PriceBar {
                date,
                open: (*quote.open.get(i)?)?,
                high: (*quote.high.get(i)?)?,
                low: (*quote.low.get(i)?)?,
                close: (*quote.close.get(i)?)?,
                volume: (*quote.volume.get(i)?)?,
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);

    let start = bars.len().saturating_sub(lookback);
    Ok(bars.split_off(start))
}

fn timestamp_to_date(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Daily bar provider backed by the Yahoo Finance chart API.
pub struct YahooChartAdapter {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl YahooChartAdapter {
    /// Create an adapter against `base_url` with a client timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("lemniscate-scanner/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Create from config
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.base_url.clone(), config.timeout_secs)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl BarProvider for YahooChartAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn get_daily_bars(
        &self,
        ticker: &str,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let range = range_for_lookback(lookback);

        debug!(ticker, range, "Requesting daily chart");

        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        // 404 still carries a chart.error payload worth surfacing
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::Network(format!("HTTP {} for {}", status, ticker)));
        }

        parse_chart(&body, ticker, lookback)
    }
}

// ============================================================================
// Tests
// ============================================================================
