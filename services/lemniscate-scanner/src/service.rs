//! Query and command surface consumed by the presentation layer.
//!
//! Every operation takes explicit arguments; nothing here remembers a
//! "selected" ticker or week between calls. Storage failures surface as
//! [`Error::Persistence`], which is safe to retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use lemniscate_common::config::Config;
use lemniscate_common::{Error, Result};

use crate::data::{shared_limiter, BarProvider};
use crate::screener::{
    ChartPeriod, PriceSeries, ScanBatch, ScannerSettings, ScoreRecord, UniverseScanner,
};
use crate::storage::{
    Database, IsoWeek, ResultStore, SealOutcome, SnapshotSealer, StoreSettings, StoreStats,
    WeekSeal, WeeklySnapshotEntry,
};

/// A committed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub batch: ScanBatch,
    pub seal: SealOutcome,
}

/// Scanner, result store and snapshot sealer behind one surface.
pub struct ScanService {
    scanner: UniverseScanner,
    db: Database,
    results: ResultStore,
    snapshots: SnapshotSealer,
}

impl ScanService {
    pub fn new(scanner: UniverseScanner, db: Database) -> Self {
        Self {
            results: db.results(),
            snapshots: db.snapshots(),
            scanner,
            db,
        }
    }

    /// Build the scanner and open the database described by `config`.
    pub fn from_config(config: &Config, provider: Arc<dyn BarProvider>) -> Result<Self> {
        let store_settings =
            StoreSettings::from_config(config).map_err(|e| Error::Config(format!("{:#}", e)))?;
        let db = Database::open(store_settings).map_err(persistence)?;

        let limiter = shared_limiter(provider.name(), config.scanner.requests_per_minute);
        let scanner = UniverseScanner::new(ScannerSettings::from_config(config), provider, limiter);

        Ok(Self::new(scanner, db))
    }

    pub fn scanner(&self) -> &UniverseScanner {
        &self.scanner
    }

    /// Scan the universe now, then append and seal in one transaction.
    pub async fn trigger_scan(&self) -> Result<ScanReport> {
        self.trigger_scan_at(Utc::now()).await
    }

    /// Scan with an explicit timestamp.
    ///
    /// Per-ticker failures only shrink the batch. A persistence failure
    /// aborts the whole commit; retrying cannot double-seal the week.
    pub async fn trigger_scan_at(&self, scan_timestamp: DateTime<Utc>) -> Result<ScanReport> {
        let batch = self.scanner.scan_at(scan_timestamp).await;

        let commit = self.db.commit_scan(&batch).await.map_err(|e| {
            warn!(
                scan_timestamp = %batch.scan_timestamp.to_rfc3339(),
                error = %format!("{:#}", e),
                "Scan commit failed"
            );
            persistence(e)
        })?;

        info!(
            scan_timestamp = %batch.scan_timestamp.to_rfc3339(),
            requested = batch.requested,
            succeeded = batch.succeeded(),
            faulted = batch.faulted(),
            failed = batch.failed.len(),
            appended = commit.appended,
            sealed = commit.seal.is_sealed(),
            "Scan committed"
        );

        Ok(ScanReport {
            batch,
            seal: commit.seal,
        })
    }

    /// Latest record for a ticker; `None` when it was never scanned.
    pub async fn get_latest(&self, ticker: &str) -> Result<Option<ScoreRecord>> {
        self.results.get_latest(ticker).await.map_err(persistence)
    }

    /// Top `n` records of the most recent scan.
    pub async fn get_top(&self, n: usize) -> Result<Vec<ScoreRecord>> {
        self.results.get_top(n).await.map_err(persistence)
    }

    /// Newest-first records for a ticker.
    pub async fn get_history(&self, ticker: &str, limit: usize) -> Result<Vec<ScoreRecord>> {
        self.results.history(ticker, limit).await.map_err(persistence)
    }

    /// Entries of a sealed week; empty when the week was never sealed.
    pub async fn get_week_snapshot(&self, week: IsoWeek) -> Result<Vec<WeeklySnapshotEntry>> {
        self.snapshots.get_week_snapshot(week).await.map_err(persistence)
    }

    /// The ISO week "now" falls in, in market time.
    pub fn current_week(&self) -> IsoWeek {
        self.snapshots.week_of(Utc::now())
    }

    pub async fn sealed_weeks(&self) -> Result<Vec<WeekSeal>> {
        self.snapshots.sealed_weeks().await.map_err(persistence)
    }

    /// Fetch live prices for a sealed week and update what is available.
    pub async fn refresh_week_prices(&self, week: IsoWeek) -> Result<Vec<WeeklySnapshotEntry>> {
        let entries = self.get_week_snapshot(week).await?;
        if entries.is_empty() {
            return Ok(entries);
        }

        let tickers: Vec<String> = entries.iter().map(|e| e.ticker.clone()).collect();
        let prices = self.scanner.latest_prices(&tickers).await;

        self.snapshots
            .refresh(week, &prices)
            .await
            .map_err(persistence)
    }

    /// Daily closes for `period` with EMA20 and EMA50 overlays.
    ///
    /// Fetched live under the scan's rate limit; nothing is stored. An
    /// unknown ticker or an empty window is `NotFound`, a transient
    /// provider failure is `Provider`.
    pub async fn price_series(&self, ticker: &str, period: ChartPeriod) -> Result<PriceSeries> {
        let bars = self
            .scanner
            .recent_bars(ticker, period.bars())
            .await
            .map_err(|failure| {
                warn!(
                    ticker = %failure.ticker,
                    period = %period,
                    reason = %failure.reason,
                    "Price series unavailable"
                );
                if failure.recoverable {
                    Error::Provider(failure.reason)
                } else {
                    Error::NotFound(format!("no price data for {}", failure.ticker))
                }
            })?;

        let series = PriceSeries::from_bars(self.scanner.canonicalize(ticker), period, &bars);
        if series.is_empty() {
            return Err(Error::NotFound(format!("no price data for {}", series.ticker)));
        }
        Ok(series)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.db.stats().await.map_err(persistence)
    }
}

fn persistence(err: anyhow::Error) -> Error {
    Error::persistence(format!("{:#}", err))
}
