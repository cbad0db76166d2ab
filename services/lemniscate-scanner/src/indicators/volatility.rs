//! True range family.

use super::moving_average::{ema, sma};
use crate::data::PriceBar;

/// True range per bar.
///
/// The first bar has no previous close and uses `high - low`; later bars use
/// `max(high - low, |high - prev_close|, |low - prev_close|)`.
pub fn true_range_series(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            if i == 0 {
                return hl;
            }
            let prev_close = bars[i - 1].close;
            hl.max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

/// Average true range: trailing simple mean of the last `period` true ranges.
pub fn atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    sma(&true_range_series(bars), period)
}

/// EMA-smoothed true range, used as a trend-strength presence test.
pub fn smoothed_true_range(bars: &[PriceBar], span: usize) -> Option<f64> {
    ema(&true_range_series(bars), span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn test_true_range_uses_gaps() {
        let bars = vec![bar(11.0, 9.0, 10.0), bar(15.0, 14.0, 14.5), bar(14.0, 7.0, 8.0)];
        assert_eq!(true_range_series(&bars), vec![2.0, 5.0, 7.5]);
    }

    #[test]
    fn test_atr_requires_full_window() {
        let bars = vec![bar(12.0, 10.0, 11.0); 13];
        assert_eq!(atr(&bars, 14), None);

        let bars = vec![bar(12.0, 10.0, 11.0); 14];
        assert_eq!(atr(&bars, 14), Some(2.0));
    }

    #[test]
    fn test_smoothed_true_range_zero_for_flat_bars() {
        let bars = vec![bar(10.0, 10.0, 10.0); 20];
        assert_eq!(smoothed_true_range(&bars, 14), Some(0.0));
        assert_eq!(smoothed_true_range(&[], 14), None);
    }
}
