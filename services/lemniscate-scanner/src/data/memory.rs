//! In-memory bar provider.
//!
//! Serves fixed series keyed by ticker. Failures and delays can be injected
//! per ticker, which makes the scanner's partial-failure behaviour testable
//! without a network.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::provider::{BarProvider, ProviderError};
use super::PriceBar;

/// Bar provider backed by in-memory series.
#[derive(Debug, Default)]
pub struct StaticBarProvider {
    series: RwLock<HashMap<String, Vec<PriceBar>>>,
    failing: RwLock<HashSet<String>>,
    delays: RwLock<HashMap<String, Duration>>,
    request_count: AtomicU64,
}

impl StaticBarProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ticker's series (builder style).
    pub fn with_series(self, ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        self.set_series(ticker, bars);
        self
    }

    /// Make every request for `ticker` fail with a network error (builder style).
    pub fn with_failure(self, ticker: impl Into<String>) -> Self {
        self.set_failing(ticker, true);
        self
    }

    /// Delay every request for `ticker` (builder style).
    pub fn with_delay(self, ticker: impl Into<String>, delay: Duration) -> Self {
        self.write_delays().insert(ticker.into(), delay);
        self
    }

    /// Replace a ticker's series.
    pub fn set_series(&self, ticker: impl Into<String>, bars: Vec<PriceBar>) {
        self.series
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ticker.into(), bars);
    }

    /// Toggle failure injection for a ticker.
    pub fn set_failing(&self, ticker: impl Into<String>, failing: bool) {
        let mut set = self.failing.write().unwrap_or_else(|e| e.into_inner());
        let ticker = ticker.into();
        if failing {
            set.insert(ticker);
        } else {
            set.remove(&ticker);
        }
    }

    /// Total requests served or rejected.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn write_delays(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Duration>> {
        self.delays.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BarProvider for StaticBarProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_daily_bars(
        &self,
        ticker: &str,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, ProviderError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let delay = self
            .delays
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(ticker)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(ticker);
        if failing {
            return Err(ProviderError::Network(format!("injected failure for {}", ticker)));
        }

        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        let bars = series
            .get(ticker)
            .ok_or_else(|| ProviderError::DataNotAvailable(ticker.to_string()))?;

        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(n: usize) -> Vec<PriceBar> {
        (0..n)
            .map(|i| PriceBar {
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Days::new(i as u64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0 + i as f64,
                volume: 1000.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_lookback_returns_trailing_bars() {
        let provider = StaticBarProvider::new().with_series("THYAO.IS", series(10));
        let bars = provider.get_daily_bars("THYAO.IS", 3).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert!((bars[2].close - 19.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_available() {
        let provider = StaticBarProvider::new();
        let err = provider.get_daily_bars("NOPE.IS", 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_can_be_cleared() {
        let provider = StaticBarProvider::new()
            .with_series("GARAN.IS", series(5))
            .with_failure("GARAN.IS");
        assert!(provider.get_daily_bars("GARAN.IS", 5).await.is_err());

        provider.set_failing("GARAN.IS", false);
        assert!(provider.get_daily_bars("GARAN.IS", 5).await.is_ok());
        assert_eq!(provider.request_count(), 2);
    }
}
