//! Volume indicators.

use serde::{Deserialize, Serialize};

use super::moving_average::sma;
use crate::data::PriceBar;

/// On-balance volume series starting at zero.
///
/// Each bar adds its volume when the close rose, subtracts it when the close
/// fell and adds nothing when the close is unchanged.
pub fn obv_series(bars: &[PriceBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut total = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            if bar.close > prev_close {
                total += bar.volume;
            } else if bar.close < prev_close {
                total -= bar.volume;
            }
        }
        out.push(total);
    }

    out
}

/// Short and long trailing volume means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeAverages {
    pub short: f64,
    pub long: f64,
}

impl VolumeAverages {
    /// `short / long`, undefined when the long mean is zero.
    pub fn ratio(&self) -> Option<f64> {
        if self.long == 0.0 {
            None
        } else {
            Some(self.short / self.long)
        }
    }

    /// Whether recent volume exceeds `multiple` times the long mean.
    pub fn is_surging(&self, multiple: f64) -> bool {
        self.short > multiple * self.long
    }
}

/// Volume means over the trailing `short` and `long` bars.
pub fn volume_averages(bars: &[PriceBar], short: usize, long: usize) -> Option<VolumeAverages> {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    Some(VolumeAverages {
        short: sma(&volumes, short)?,
        long: sma(&volumes, long)?,
    })
}
