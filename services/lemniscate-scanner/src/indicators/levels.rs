//! Price levels.

use crate::data::PriceBar;

/// Retracement ratio applied to the window's range.
pub const FIBONACCI_RATIO: f64 = 0.382;

/// Fibonacci retracement level over the trailing `window` bars.
///
/// `high - 0.382 * (high - low)` with the window's highest high and lowest
/// low. `None` when fewer than `window` bars exist.
pub fn fibonacci_level(bars: &[PriceBar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window {
        return None;
    }
    let tail = &bars[bars.len() - window..];
    let high = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some(high - FIBONACCI_RATIO * (high - low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(high: f64, low: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            open: low,
            high,
            low,
            close: low,
            volume: 1.0,
        }
    }

    #[test]
    fn test_fibonacci_level() {
        let bars = vec![bar(15.0, 12.0), bar(20.0, 14.0), bar(18.0, 10.0)];
        let level = fibonacci_level(&bars, 3).unwrap();
        assert!((level - 16.18).abs() < 1e-9);
    }

    #[test]
    fn test_fibonacci_uses_trailing_window() {
        let bars = vec![bar(100.0, 1.0), bar(20.0, 10.0), bar(20.0, 10.0)];
        let level = fibonacci_level(&bars, 2).unwrap();
        assert!((level - 16.18).abs() < 1e-9);
        assert_eq!(fibonacci_level(&bars, 4), None);
    }
}
