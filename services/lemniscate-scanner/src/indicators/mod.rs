//! Technical indicators derived from daily bar sequences.
//!
//! Every function here is pure and tolerates short input by returning `None`
//! (the "undefined" marker) instead of failing. [`IndicatorSnapshot`] bundles
//! the latest value of each indicator the composite score reads.
//!
//! # Indicators
//! - **EMA** (20, 50, 12, 26, 9) seeded by the first value
//! - **RSI(14)** over simple mean gains and losses
//! - **MACD(12, 26)** with an EMA(9) signal line
//! - **Stochastic %K(14)**
//! - **SMA(20)** of close
//! - **True range**, **ATR(14)** and an EMA(14)-smoothed true range
//! - **OBV** and 5/20-bar volume means
//! - **Fibonacci level** over the trailing 50 bars

mod levels;
mod momentum;
mod moving_average;
mod volatility;
mod volume;

pub use levels::{fibonacci_level, FIBONACCI_RATIO};
pub use momentum::{macd, rsi, stochastic_k, MacdPoint};
pub use moving_average::{ema, ema_series, sma};
pub use volatility::{atr, smoothed_true_range, true_range_series};
pub use volume::{obv_series, volume_averages, VolumeAverages};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::PriceBar;

// ============================================================================
// Windows
// ============================================================================

pub const EMA_SHORT: usize = 20;
pub const EMA_LONG: usize = 50;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const RSI_PERIOD: usize = 14;
pub const STOCHASTIC_PERIOD: usize = 14;
pub const SMA_PERIOD: usize = 20;
pub const ATR_PERIOD: usize = 14;
pub const TRUE_RANGE_SPAN: usize = 14;
pub const VOLUME_SHORT: usize = 5;
pub const VOLUME_LONG: usize = 20;
pub const FIBONACCI_WINDOW: usize = 50;

// ============================================================================
// Errors
// ============================================================================

/// Reasons a snapshot cannot be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    /// Not enough bars for the longest window
    #[error("insufficient data: need {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A bar carries a non-finite, negative or inverted field
    #[error("malformed bar at index {index}")]
    MalformedBar { index: usize },

    /// An indicator that must be defined came out undefined or non-finite
    #[error("indicator {name} is undefined")]
    Undefined { name: &'static str },
}

// ============================================================================
// Indicator Snapshot
// ============================================================================

/// Latest value of every indicator the composite score uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub rsi14: Option<f64>,
    pub macd: MacdPoint,
    pub stochastic_k: f64,
    pub sma20: f64,
    pub atr14: Option<f64>,
    pub smoothed_tr: f64,
    pub obv: f64,
    pub obv_prev: f64,
    pub volume: VolumeAverages,
    pub fibonacci: f64,
}

impl IndicatorSnapshot {
    /// Compute the snapshot for an ascending bar sequence.
    ///
    /// Requires at least [`FIBONACCI_WINDOW`] well-formed bars. RSI and ATR
    /// may legitimately stay undefined; every other value must be finite.
    pub fn from_bars(bars: &[PriceBar]) -> Result<Self, IndicatorError> {
        if bars.len() < FIBONACCI_WINDOW {
            return Err(IndicatorError::InsufficientData {
                required: FIBONACCI_WINDOW,
                actual: bars.len(),
            });
        }
        if let Some(index) = bars.iter().position(|b| !b.is_well_formed()) {
            return Err(IndicatorError::MalformedBar { index });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let obv = obv_series(bars);

        let snapshot = Self {
            close: required("close", closes.last().copied())?,
            ema20: required("ema20", ema(&closes, EMA_SHORT))?,
            ema50: required("ema50", ema(&closes, EMA_LONG))?,
            rsi14: rsi(&closes, RSI_PERIOD).filter(|v| v.is_finite()),
            macd: macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
                .filter(|p| p.macd.is_finite() && p.signal.is_finite())
                .ok_or(IndicatorError::Undefined { name: "macd" })?,
            stochastic_k: required("stochastic_k", stochastic_k(bars, STOCHASTIC_PERIOD))?,
            sma20: required("sma20", sma(&closes, SMA_PERIOD))?,
            atr14: atr(bars, ATR_PERIOD).filter(|v| v.is_finite()),
            smoothed_tr: required("smoothed_tr", smoothed_true_range(bars, TRUE_RANGE_SPAN))?,
            obv: required("obv", obv.last().copied())?,
            obv_prev: required("obv", obv.len().checked_sub(2).map(|i| obv[i]))?,
            volume: volume_averages(bars, VOLUME_SHORT, VOLUME_LONG)
                .filter(|v| v.short.is_finite() && v.long.is_finite())
                .ok_or(IndicatorError::Undefined { name: "volume" })?,
            fibonacci: required("fibonacci", fibonacci_level(bars, FIBONACCI_WINDOW))?,
        };

        Ok(snapshot)
    }
}

fn required(name: &'static str, value: Option<f64>) -> Result<f64, IndicatorError> {
    value
        .filter(|v| v.is_finite())
        .ok_or(IndicatorError::Undefined { name })
}
