//! Lemniscate Scanner Library
//!
//! Scores a universe of equities with a composite of classic technical
//! indicators, keeps every scan as an append-only history and freezes the
//! first scan of each ISO week into a leaderboard snapshot whose prices can
//! later be refreshed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 lemniscate-scanner (Rust Service)                   │
//! │                               :4460                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────────┐   ┌────────────────────┐     │
//! │  │ BarProvider │──▶│ UniverseScanner │──▶│ ResultStore        │     │
//! │  │ (chart API) │   │ + scoring       │   │ + SnapshotSealer   │     │
//! │  └─────────────┘   └─────────────────┘   └────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Composite score
//! - Nine additive rules: close over EMA20 (more if EMA20 is over EMA50),
//!   RSI band, MACD over its signal, stochastic %K below 20, close over
//!   SMA20, smoothed true range above zero, rising OBV, a volume surge and
//!   close over the Fibonacci retracement level
//! - Fewer than 50 bars scores neutral; malformed data scores zero
//!
//! ## Weekly snapshot
//! - The first committed scan of an ISO week seals that week's leaders
//! - Entry prices are frozen; current prices move only on refresh

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod indicators;
pub mod routes;
pub mod scoring;
pub mod screener;
pub mod service;
pub mod storage;

use anyhow::Result;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use lemniscate_common::config::Config;

use crate::data::YahooChartAdapter;
use crate::service::ScanService;

/// Floor for the request timeout.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Slack on top of the rate budget for scoring and the commit.
const REQUEST_TIMEOUT_SLACK_SECS: u64 = 30;

/// Request timeout sized for a full scan.
///
/// A scan cannot finish faster than the rate limiter lets the universe
/// through, plus one fetch timeout for the last ticker in flight.
pub fn request_timeout(config: &Config) -> Duration {
    let scanner = &config.scanner;
    let per_minute = u64::from(scanner.requests_per_minute.max(1));
    let tickers = scanner.universe.len() as u64;
    let rate_budget_secs = (tickers * 60).div_ceil(per_minute);

    let sized = Duration::from_secs(
        rate_budget_secs + scanner.fetch_timeout_secs + REQUEST_TIMEOUT_SLACK_SECS,
    );
    sized.max(MIN_REQUEST_TIMEOUT)
}

/// Scanner service state
pub struct ScannerState {
    /// Configuration
    pub config: Config,
    /// Scan, query and snapshot operations
    pub service: ScanService,
}

/// Main scanner service
pub struct ScannerServer {
    state: Arc<ScannerState>,
}

impl ScannerServer {
    pub fn new(state: ScannerState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Wire the chart API provider and open the result store.
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = Arc::new(YahooChartAdapter::from_config(&config.provider));
        let service = ScanService::from_config(&config, provider)?;
        Ok(Self::new(ScannerState { config, service }))
    }

    /// HTTP routes over shared state.
    pub fn router(state: Arc<ScannerState>) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/scans", post(routes::trigger_scan))
            .route("/api/v1/scores/top", get(routes::get_top))
            .route("/api/v1/scores/:ticker", get(routes::get_latest))
            .route("/api/v1/scores/:ticker/history", get(routes::get_history))
            .route("/api/v1/scores/:ticker/chart", get(routes::get_chart))
            .route("/api/v1/snapshots", get(routes::list_weeks))
            .route("/api/v1/snapshots/:week", get(routes::get_week_snapshot))
            .route("/api/v1/snapshots/:week/refresh", post(routes::refresh_week))
            .route("/api/v1/stats", get(routes::get_stats))
            .with_state(state)
    }

    /// Serve until Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let server = &self.state.config.server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

        match self.state.service.stats().await {
            Ok(stats) => tracing::info!(%stats, "Result store ready"),
            Err(e) => tracing::warn!(error = %e, "Result store stats unavailable"),
        }

        let timeout = request_timeout(&self.state.config);
        let app = Self::router(self.state.clone())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ))
            .layer(CorsLayer::permissive());

        tracing::info!(
            address = %addr,
            universe = self.state.service.scanner().universe().len(),
            request_timeout_secs = timeout.as_secs(),
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Scanner stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timeout_floor() {
        let config = Config::default();
        assert_eq!(request_timeout(&config), MIN_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_request_timeout_grows_with_universe() {
        let mut config = Config::default();
        config.scanner.universe = (0..600).map(|i| format!("T{}", i)).collect();
        config.scanner.requests_per_minute = 60;
        config.scanner.fetch_timeout_secs = 15;

        // 600 tickers at 60/min is ten minutes before the last fetch starts
        assert_eq!(request_timeout(&config), Duration::from_secs(600 + 15 + 30));

        config.scanner.requests_per_minute = 600;
        assert_eq!(request_timeout(&config), Duration::from_secs(60 + 15 + 30));
    }
}
