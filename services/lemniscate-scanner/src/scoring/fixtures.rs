//! Bar series shared by indicator and scoring tests.

use chrono::{Days, NaiveDate};

use crate::data::PriceBar;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Days::new(i as u64)
}

fn to_bars(rows: &[(f64, f64, f64, f64, f64)]) -> Vec<PriceBar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| PriceBar {
            date: day(i),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Straight line of closes moving `step` per bar, one point of wick each side.
pub(crate) fn linear(n: usize, start: f64, step: f64) -> Vec<PriceBar> {
    let mut prev_close = start - step;
    let rows: Vec<_> = (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            let open = prev_close;
            prev_close = close;
            (open, open.max(close) + 0.5, open.min(close) - 0.5, close, 1000.0)
        })
        .collect();
    to_bars(&rows)
}

/// Sixty bars on which every rule of the composite score fires.
///
/// Forty rising bars (one with a deep wick at index 10 so the 50-bar low sits
/// far below), a pullback, a choppy recovery with a spike high at index 50
/// and a volume surge over the final five bars.
pub(crate) fn pinned_sixty_bars() -> Vec<PriceBar> {
    let mut rows = Vec::with_capacity(60);
    let mut prev_close: f64 = 59.5;
    for i in 0..40 {
        let close = 60.0 + i as f64;
        let open = prev_close;
        let low = if i == 10 { 1.0 } else { open.min(close) - 0.5 };
        rows.push((open, open.max(close) + 0.5, low, close, 1000.0));
        prev_close = close;
    }

    let tail = [
        (99.0, 99.5, 96.5, 97.0),
        (97.0, 97.5, 94.5, 95.0),
        (95.0, 95.5, 93.5, 94.0),
        (94.0, 94.5, 92.5, 93.0),
        (93.0, 93.5, 92.0, 92.5),
        (92.5, 93.0, 91.5, 92.0),
        (92.0, 95.5, 91.5, 95.0),
        (95.0, 95.5, 92.0, 92.5),
        (92.5, 97.0, 92.0, 96.5),
        (96.5, 97.0, 93.0, 93.5),
        (93.5, 166.0, 93.0, 97.5),
        (97.5, 98.0, 94.0, 94.5),
        (94.5, 99.0, 94.0, 98.5),
        (98.5, 99.0, 95.0, 95.5),
        (95.5, 100.0, 95.0, 99.5),
        (99.5, 100.0, 96.0, 96.5),
        (96.5, 101.0, 96.0, 100.5),
        (100.5, 101.0, 97.0, 97.5),
        (97.5, 103.5, 97.0, 103.0),
        (103.0, 105.0, 102.5, 104.5),
    ];
    for (j, &(open, high, low, close)) in tail.iter().enumerate() {
        let volume = if 40 + j >= 55 { 3000.0 } else { 1000.0 };
        rows.push((open, high, low, close, volume));
    }

    to_bars(&rows)
}
