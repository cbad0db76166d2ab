//! Market data module.
//!
//! Provides the daily bar type every indicator is derived from, ticker
//! canonicalization, and the providers the scanner pulls bars from.
//!
//! # Data Sources
//! - **Yahoo chart API** (default): public daily OHLCV history
//! - **Static** (tests/offline): in-memory series with injectable failures

mod memory;
mod provider;
mod rate_limiter;
mod yahoo;

pub use memory::StaticBarProvider;
pub use provider::{BarProvider, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use yahoo::YahooChartAdapter;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A single daily OHLCV bar.
///
/// Series are ordered ascending by `date` and never modified after fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading day
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl PriceBar {
    /// Check that every field is finite and the bar is internally consistent.
    pub fn is_well_formed(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        fields.iter().all(|v| v.is_finite() && *v >= 0.0) && self.low <= self.high
    }

    /// Get the full range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

// ============================================================================
// Ticker Canonicalization
// ============================================================================

/// Normalize a raw ticker into its storage key.
///
/// Uppercases and appends `suffix` when the symbol does not already carry it,
/// so `"thyao"` and `"THYAO.IS"` both become `"THYAO.IS"`. The same rule is
/// used on every write and every read. A blank input stays blank, so callers
/// can drop it.
pub fn canonical_ticker(raw: &str, suffix: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let suffix = suffix.to_uppercase();
    if upper.is_empty() || suffix.is_empty() || upper.ends_with(&suffix) {
        upper
    } else {
        format!("{}{}", upper, suffix)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64, volume: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_canonical_ticker_appends_suffix() {
        assert_eq!(canonical_ticker("thyao", ".IS"), "THYAO.IS");
        assert_eq!(canonical_ticker("THYAO.IS", ".IS"), "THYAO.IS");
        assert_eq!(canonical_ticker("  garan.is ", ".IS"), "GARAN.IS");
    }

    #[test]
    fn test_canonical_ticker_blank_stays_blank() {
        assert_eq!(canonical_ticker("", ".IS"), "");
        assert_eq!(canonical_ticker("   ", ".IS"), "");
    }

    #[test]
    fn test_canonical_ticker_is_idempotent() {
        let once = canonical_ticker("asels", ".IS");
        assert_eq!(canonical_ticker(&once, ".IS"), once);
    }

    #[test]
    fn test_canonical_ticker_lowercase_suffix_config() {
        assert_eq!(canonical_ticker("sise", ".is"), "SISE.IS");
    }

    #[test]
    fn test_bar_well_formed() {
        assert!(bar(10.0, 11.0, 9.5, 10.5, 1000.0).is_well_formed());
        assert!(!bar(10.0, 9.0, 9.5, 10.5, 1000.0).is_well_formed());
        assert!(!bar(10.0, 11.0, 9.5, f64::NAN, 1000.0).is_well_formed());
        assert!(!bar(10.0, 11.0, 9.5, 10.5, -1.0).is_well_formed());
        assert!((bar(10.0, 11.0, 9.5, 10.5, 1000.0).range() - 1.5).abs() < 1e-12);
    }
}
