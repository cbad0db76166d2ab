//! Universe scanner.
//!
//! Fetches every ticker of the configured universe through a bounded worker
//! pool, scores each series and joins the successes into one [`ScanBatch`].

use chrono::{DateTime, SubsecRound, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use lemniscate_common::config::Config;

use crate::data::{canonical_ticker, BarProvider, PriceBar, ProviderError, SharedRateLimiter};
use crate::scoring::{CompositeScorer, ScoreStatus, SignalTier};

// ============================================================================
// Score Record
// ============================================================================

/// One ticker's result in one scan. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Timestamp shared by every record of the batch
    pub scan_timestamp: DateTime<Utc>,
    /// Canonical ticker (e.g., "THYAO.IS")
    pub ticker: String,
    pub score: f64,
    pub last_close: f64,
    pub stop_loss: f64,
    pub signal_tier: SignalTier,
    pub status: ScoreStatus,
}

/// A ticker excluded from a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub reason: String,
    /// Whether a later scan may succeed
    pub recoverable: bool,
}

impl TickerFailure {
    fn from_provider(ticker: &str, err: &ProviderError) -> Self {
        Self {
            ticker: ticker.to_string(),
            reason: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }

    fn timeout(ticker: &str, timeout: Duration) -> Self {
        Self {
            ticker: ticker.to_string(),
            reason: format!("fetch timed out after {}ms", timeout.as_millis()),
            recoverable: true,
        }
    }

    fn unusable(ticker: &str, reason: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
            recoverable: false,
        }
    }
}

// ============================================================================
// Scan Batch
// ============================================================================

/// Records produced by one scan, in universe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanBatch {
    pub scan_timestamp: DateTime<Utc>,
    pub records: Vec<ScoreRecord>,
    /// Distinct canonical tickers attempted
    pub requested: usize,
    pub failed: Vec<TickerFailure>,
}

impl ScanBatch {
    /// Number of tickers that produced a record.
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    /// Records whose score was downgraded by an indicator fault.
    pub fn faulted(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == ScoreStatus::Fault)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top `n` records by score descending; equal scores keep batch order.
    pub fn top(&self, n: usize) -> Vec<&ScoreRecord> {
        let mut ranked: Vec<&ScoreRecord> = self.records.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(n);
        ranked
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} tickers: {} scored ({} faulted), {} failed",
            self.requested,
            self.succeeded(),
            self.faulted(),
            self.failed.len()
        )
    }
}

// ============================================================================
// Scanner Settings
// ============================================================================

/// Scanner parameters resolved from configuration.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub universe: Vec<String>,
    pub ticker_suffix: String,
    pub lookback_bars: usize,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub high_tier_threshold: f64,
}

impl ScannerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            universe: config.scanner.universe.clone(),
            ticker_suffix: config.market.ticker_suffix.clone(),
            lookback_bars: config.scanner.lookback_bars,
            concurrency: config.scanner.concurrency,
            fetch_timeout: Duration::from_secs(config.scanner.fetch_timeout_secs),
            high_tier_threshold: config.scanner.high_tier_threshold,
        }
    }
}

// ============================================================================
// Universe Scanner
// ============================================================================

/// Scans a fixed ticker universe against one bar provider.
///
/// Holds no state between scans; every call works from its arguments and
/// the configured universe.
pub struct UniverseScanner {
    settings: ScannerSettings,
    provider: Arc<dyn BarProvider>,
    limiter: SharedRateLimiter,
    scorer: CompositeScorer,
}

impl UniverseScanner {
    pub fn new(
        settings: ScannerSettings,
        provider: Arc<dyn BarProvider>,
        limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            settings,
            provider,
            limiter,
            scorer: CompositeScorer::new(),
        }
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    /// Canonicalize a raw ticker with the configured market suffix.
    pub fn canonicalize(&self, raw: &str) -> String {
        canonical_ticker(raw, &self.settings.ticker_suffix)
    }

    /// Canonical universe, duplicates removed, first occurrence wins.
    pub fn universe(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.settings
            .universe
            .iter()
            .map(|t| self.canonicalize(t))
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect()
    }

    /// Scan the universe now.
    pub async fn scan(&self) -> ScanBatch {
        self.scan_at(Utc::now()).await
    }

    /// Scan the universe, stamping every record with `scan_timestamp`.
    ///
    /// Never fails: a ticker that cannot be fetched or is unusable lands in
    /// `failed`, and an all-failed scan is simply an empty batch.
    pub async fn scan_at(&self, scan_timestamp: DateTime<Utc>) -> ScanBatch {
        // Storage keeps microseconds
        let scan_timestamp = scan_timestamp.trunc_subsecs(6);
        let tickers = self.universe();
        let requested = tickers.len();
        let started = Instant::now();

        info!(
            scan_timestamp = %scan_timestamp.to_rfc3339(),
            requested,
            provider = self.provider.name(),
            "Starting universe scan"
        );

        let mut results: Vec<(usize, Result<ScoreRecord, TickerFailure>)> =
            stream::iter(tickers.into_iter().enumerate())
                .map(|(idx, ticker)| async move {
                    (idx, self.scan_ticker(&ticker, scan_timestamp).await)
                })
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

        // Join barrier: restore universe order
        results.sort_by_key(|(idx, _)| *idx);

        let mut records = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (_, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(failure) => {
                    warn!(
                        ticker = %failure.ticker,
                        error = %failure.reason,
                        recoverable = failure.recoverable,
                        "Ticker excluded from scan"
                    );
                    failed.push(failure);
                }
            }
        }

        let batch = ScanBatch {
            scan_timestamp,
            records,
            requested,
            failed,
        };

        info!(
            scan_timestamp = %scan_timestamp.to_rfc3339(),
            requested = batch.requested,
            succeeded = batch.succeeded(),
            faulted = batch.faulted(),
            failed = batch.failed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Universe scan complete"
        );

        batch
    }

    /// Latest usable close per ticker.
    ///
    /// Tickers whose fetch fails, times out or has no usable close are absent
    /// from the map. Keys are canonical.
    pub async fn latest_prices(&self, tickers: &[String]) -> HashMap<String, f64> {
        let canonical: Vec<String> = tickers
            .iter()
            .map(|t| self.canonicalize(t))
            .filter(|t| !t.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        stream::iter(canonical)
            .map(|ticker| async move {
                let price = self.fetch_latest_close(&ticker).await;
                (ticker, price)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .filter_map(|(ticker, price)| async move { price.map(|p| (ticker, p)) })
            .collect()
            .await
    }

    /// Trailing `lookback` bars for one ticker, under the scan's rate limit
    /// and fetch timeout.
    pub async fn recent_bars(
        &self,
        ticker: &str,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, TickerFailure> {
        let ticker = self.canonicalize(ticker);
        if ticker.is_empty() {
            return Err(TickerFailure::unusable(&ticker, "blank ticker"));
        }
        self.fetch_bars(&ticker, lookback).await
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    async fn scan_ticker(
        &self,
        ticker: &str,
        scan_timestamp: DateTime<Utc>,
    ) -> Result<ScoreRecord, TickerFailure> {
        let bars = self.fetch_bars(ticker, self.settings.lookback_bars).await?;

        let last_close = match bars.last() {
            None => return Err(TickerFailure::unusable(ticker, "empty series")),
            Some(bar) if !(bar.close.is_finite() && bar.close > 0.0) => {
                return Err(TickerFailure::unusable(ticker, "no usable last close"))
            }
            Some(bar) => bar.close,
        };

        let outcome = self.scorer.score(&bars);
        if outcome.is_fault() {
            warn!(ticker, bars = bars.len(), "Scoring fault, recorded as zero");
        } else {
            debug!(
                ticker,
                bars = bars.len(),
                score = outcome.score,
                status = %outcome.status,
                "Ticker scored"
            );
        }

        Ok(ScoreRecord {
            scan_timestamp,
            ticker: ticker.to_string(),
            score: outcome.score,
            last_close,
            stop_loss: outcome.stop_loss,
            signal_tier: SignalTier::classify(outcome.score, self.settings.high_tier_threshold),
            status: outcome.status,
        })
    }

    async fn fetch_bars(&self, ticker: &str, lookback: usize) -> Result<Vec<PriceBar>, TickerFailure> {
        self.limiter.acquire().await;

        let fetch = self.provider.get_daily_bars(ticker, lookback);
        match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(Ok(bars)) => Ok(bars),
            Ok(Err(e)) => Err(TickerFailure::from_provider(ticker, &e)),
            Err(_) => Err(TickerFailure::timeout(ticker, self.settings.fetch_timeout)),
        }
    }

    async fn fetch_latest_close(&self, ticker: &str) -> Option<f64> {
        self.limiter.acquire().await;

        let fetch = self.provider.get_latest_close(ticker);
        match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                warn!(ticker, error = %e, "Live price unavailable");
                None
            }
            Err(_) => {
                warn!(ticker, "Live price fetch timed out");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
