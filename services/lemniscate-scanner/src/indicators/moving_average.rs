//! Moving averages.

/// Exponential moving average over the whole series.
///
/// Seeded with the first value and smoothed with `alpha = 2 / (span + 1)`,
/// so every output depends only on inputs at or before its index. Returns an
/// empty vector for an empty input or a zero span.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);

    for &value in &values[1..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        out.push(prev);
    }

    out
}

/// Latest EMA value, or `None` for an empty series.
pub fn ema(values: &[f64], span: usize) -> Option<f64> {
    ema_series(values, span).last().copied()
}

/// Trailing simple mean of the last `window` values.
///
/// `None` when fewer than `window` values exist.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_by_first_value() {
        let out = ema_series(&[1.0, 2.0, 3.0], 3);
        assert_eq!(out, vec![1.0, 1.5, 2.25]);
    }

    #[test]
    fn test_ema_constant_series() {
        let value = ema(&[7.0; 30], 20).unwrap();
        assert!((value - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_empty() {
        assert!(ema_series(&[], 20).is_empty());
        assert_eq!(ema(&[1.0], 0), None);
    }

    #[test]
    fn test_ema_no_lookahead() {
        let short = ema_series(&[1.0, 5.0, 2.0], 9);
        let long = ema_series(&[1.0, 5.0, 2.0, 100.0, -50.0], 9);
        assert_eq!(short[..], long[..3]);
    }

    #[test]
    fn test_sma_window() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(sma(&[1.0, 2.0], 5), None);
        assert_eq!(sma(&[1.0, 2.0], 0), None);
    }
}
