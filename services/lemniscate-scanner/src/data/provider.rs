//! Data provider abstraction for daily market data.
//!
//! Defines the `BarProvider` trait that every data source implements, so the
//! scanner and the snapshot refresher never depend on a specific upstream.

use async_trait::async_trait;
use thiserror::Error;

use super::PriceBar;

/// Number of trailing bars requested when only the latest price matters.
pub const LATEST_LOOKBACK: usize = 5;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Data not available for the requested ticker
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// The upstream answered with something we could not parse
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request did not complete in time
    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying on a later scan)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }
}

// ============================================================================
// Bar Provider Trait
// ============================================================================

/// Trait for daily market data providers.
///
/// Implementations return bars ordered ascending by date. A failure for one
/// ticker is reported through `ProviderError` and never affects other tickers.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo", "static")
    fn name(&self) -> &'static str;

    /// Fetch the trailing `lookback` daily bars for a ticker.
    async fn get_daily_bars(
        &self,
        ticker: &str,
        lookback: usize,
    ) -> Result<Vec<PriceBar>, ProviderError>;

    /// Fetch the most recent bars for a live price refresh.
    ///
    /// Default implementation requests a short daily window.
    async fn get_latest_bars(&self, ticker: &str) -> Result<Vec<PriceBar>, ProviderError> {
        self.get_daily_bars(ticker, LATEST_LOOKBACK).await
    }

    /// Fetch the latest usable close for a ticker, if any.
    async fn get_latest_close(&self, ticker: &str) -> Result<Option<f64>, ProviderError> {
        let bars = self.get_latest_bars(ticker).await?;
        Ok(bars
            .iter()
            .rev()
            .map(|b| b.close)
            .find(|c| c.is_finite() && *c > 0.0))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct FixedProvider {
        closes: Vec<f64>,
    }

    #[async_trait]
    impl BarProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn get_daily_bars(
            &self,
            _ticker: &str,
            lookback: usize,
        ) -> Result<Vec<PriceBar>, ProviderError> {
            let start = self.closes.len().saturating_sub(lookback);
            Ok(self.closes[start..]
                .iter()
                .enumerate()
                .map(|(i, &close)| PriceBar {
                    date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + chrono::Days::new(i as u64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 100.0,
                })
                .collect())
        }
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ProviderError::Network("reset".into()).is_recoverable());
        assert!(ProviderError::Timeout(15).is_recoverable());
        assert!(ProviderError::RateLimited { retry_after_secs: None }.is_recoverable());
        assert!(!ProviderError::DataNotAvailable("delisted".into()).is_recoverable());
    }

    #[tokio::test]
    async fn test_latest_close_skips_unusable_tail() {
        let provider = FixedProvider {
            closes: vec![10.0, 11.0, 12.5, f64::NAN],
        };
        assert_eq!(provider.get_latest_close("X").await.unwrap(), Some(12.5));
    }

    #[tokio::test]
    async fn test_latest_close_empty_series() {
        let provider = FixedProvider { closes: vec![] };
        assert_eq!(provider.get_latest_close("X").await.unwrap(), None);
    }
}
