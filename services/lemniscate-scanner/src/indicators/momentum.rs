//! Momentum oscillators: RSI, MACD and stochastic %K.

use serde::{Deserialize, Serialize};

use super::moving_average::ema_series;
use crate::data::PriceBar;

/// Relative strength index over the trailing `period` close differences.
///
/// Gains and losses are simple means over the window. The ratio is undefined
/// when the average loss is exactly zero, which yields `None` rather than
/// saturating at 100. Also `None` with fewer than `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gain, loss) = window.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let diff = w[1] - w[0];
        if diff > 0.0 {
            (g + diff, l)
        } else if diff < 0.0 {
            (g, l - diff)
        } else {
            (g, l)
        }
    });

    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return None;
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Latest MACD line and signal line values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
}

impl MacdPoint {
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }

    pub fn is_bullish(&self) -> bool {
        self.macd > self.signal
    }
}

/// MACD(fast, slow) with an EMA(`signal`) signal line.
///
/// The signal EMA runs over the full MACD series, seeded at its first value.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdPoint> {
    let fast_line = ema_series(closes, fast);
    let slow_line = ema_series(closes, slow);
    if fast_line.is_empty() || slow_line.is_empty() {
        return None;
    }

    let line: Vec<f64> = fast_line
        .iter()
        .zip(slow_line.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&line, signal);

    Some(MacdPoint {
        macd: *line.last()?,
        signal: *signal_line.last()?,
    })
}

/// Stochastic %K over the trailing `period` bars.
///
/// `(close - lowest low) / (highest high - lowest low) * 100`, defined as 50
/// when the window has no range.
pub fn stochastic_k(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }

    let window = &bars[bars.len() - period..];
    let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let close = window.last()?.close;

    let range = high - low;
    if range == 0.0 {
        return Some(50.0);
    }
    Some((close - low) / range * 100.0)
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
    fn test_rsi_balanced_moves() {
        let closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        assert_eq!(rsi(&closes, 14), Some(50.0));
    }

    #[test]
    fn test_rsi_undefined_without_losses() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), None);
        assert_eq!(rsi(&[10.0; 20], 14), None);
    }

    #[test]
    fn test_rsi_only_losses() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 - i as f64).collect();
        assert_eq!(rsi(&closes, 14), Some(0.0));
    }

    #[test]
    fn test_rsi_needs_period_plus_one() {
        let closes: Vec<f64> = (0..14).map(|i| if i % 2 == 0 { 10.0 } else { 9.0 }).collect();
        assert_eq!(rsi(&closes, 14), None);
    }

    #[test]
    fn test_macd_flat_series() {
        let point = macd(&[42.0; 40], 12, 26, 9).unwrap();
        assert!(point.macd.abs() < 1e-9);
        assert!(point.signal.abs() < 1e-9);
    }

    #[test]
    fn test_macd_rising_series_is_bullish() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let point = macd(&closes, 12, 26, 9).unwrap();
        assert!(point.macd > 0.0);
        assert!(point.histogram() > 0.0);
    }

    #[test]
    fn test_macd_empty() {
        assert_eq!(macd(&[], 12, 26, 9), None);
    }

    #[test]
    fn test_stochastic_flat_window() {
        let bars = vec![bar(10.0, 10.0, 10.0); 14];
        assert_eq!(stochastic_k(&bars, 14), Some(50.0));
    }

    #[test]
    fn test_stochastic_extremes() {
        let mut bars = vec![bar(12.0, 8.0, 10.0); 14];
        bars[13] = bar(12.0, 8.0, 12.0);
        assert_eq!(stochastic_k(&bars, 14), Some(100.0));
        bars[13] = bar(12.0, 8.0, 8.0);
        assert_eq!(stochastic_k(&bars, 14), Some(0.0));
        assert_eq!(stochastic_k(&bars[..10], 14), None);
    }
}
