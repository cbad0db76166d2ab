//! Composite technical score.
//!
//! Combines the [`IndicatorSnapshot`] of a ticker into one additive score and
//! a volatility stop-loss. Scoring never fails: short histories resolve to a
//! neutral zero and any indicator fault resolves to a flagged zero, so one
//! broken series cannot take down a scan.
//!
//! # Weight table
//!
//! | Rule | Weight |
//! |---|---|
//! | close > EMA20 > EMA50 | 1.5 |
//! | else close > EMA20 | 1.0 |
//! | 45 < RSI14 < 65 | 1.0 |
//! | else RSI14 <= 45 | 0.5 |
//! | MACD > signal | 1.0 |
//! | %K14 < 20 | 0.5 |
//! | close > SMA20 | 0.5 |
//! | smoothed TR > 0 | 0.5 |
//! | OBV rising | 0.5 |
//! | 5-bar volume > 1.5 x 20-bar volume | 0.5 |
//! | close > 50-bar Fibonacci level | 1.0 |

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::data::PriceBar;
use crate::indicators::{IndicatorError, IndicatorSnapshot};

/// Minimum bars before any indicator is evaluated.
pub const MIN_BARS: usize = 50;

/// Largest total the weight table can produce.
pub const MAX_SCORE: f64 = 7.0;

/// ATR multiple below the last close for the stop-loss.
pub const STOP_LOSS_ATR_MULTIPLE: f64 = 2.0;

/// Volume surge threshold against the 20-bar mean.
pub const VOLUME_SURGE_MULTIPLE: f64 = 1.5;

/// Rule weights.
pub mod weights {
    pub const TREND_STRONG: f64 = 1.5;
    pub const TREND: f64 = 1.0;
    pub const RSI_BALANCED: f64 = 1.0;
    pub const RSI_LOW: f64 = 0.5;
    pub const MACD: f64 = 1.0;
    pub const STOCHASTIC: f64 = 0.5;
    pub const SMA: f64 = 0.5;
    pub const TREND_STRENGTH: f64 = 0.5;
    pub const OBV: f64 = 0.5;
    pub const VOLUME: f64 = 0.5;
    pub const FIBONACCI: f64 = 1.0;
}

// ============================================================================
// Status and Tier
// ============================================================================

/// How a score was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    /// Fewer than [`MIN_BARS`] bars; indicators were not evaluated
    Neutral,
    /// Indicators evaluated and rules applied
    Computed,
    /// An indicator fault was downgraded to a zero score
    Fault,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Computed => "computed",
            Self::Fault => "fault",
        }
    }
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neutral" => Ok(Self::Neutral),
            "computed" => Ok(Self::Computed),
            "fault" => Ok(Self::Fault),
            other => Err(format!("unknown score status: {}", other)),
        }
    }
}

/// Signal tier derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalTier {
    High,
    Medium,
}

impl SignalTier {
    /// `High` when `score >= threshold`, otherwise `Medium`.
    pub fn classify(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Self::High
        } else {
            Self::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
        }
    }
}

impl fmt::Display for SignalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Self::High),
            "Medium" => Ok(Self::Medium),
            other => Err(format!("unknown signal tier: {}", other)),
        }
    }
}

// ============================================================================
// Breakdown
// ============================================================================

/// Points awarded by each rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub trend: f64,
    pub rsi: f64,
    pub macd: f64,
    pub stochastic: f64,
    pub sma: f64,
    pub trend_strength: f64,
    pub obv: f64,
    pub volume: f64,
    pub fibonacci: f64,
}

impl ScoreBreakdown {
    /// Apply the weight table to a snapshot.
    pub fn evaluate(snap: &IndicatorSnapshot) -> Self {
        let close = snap.close;

        let trend = if close > snap.ema20 && snap.ema20 > snap.ema50 {
            weights::TREND_STRONG
        } else if close > snap.ema20 {
            weights::TREND
        } else {
            0.0
        };

        // An undefined RSI earns nothing
        let rsi = match snap.rsi14 {
            Some(r) if r > 45.0 && r < 65.0 => weights::RSI_BALANCED,
            Some(r) if r <= 45.0 => weights::RSI_LOW,
            _ => 0.0,
        };

        let award = |hit: bool, weight: f64| if hit { weight } else { 0.0 };

        Self {
            trend,
            rsi,
            macd: award(snap.macd.is_bullish(), weights::MACD),
            stochastic: award(snap.stochastic_k < 20.0, weights::STOCHASTIC),
            sma: award(close > snap.sma20, weights::SMA),
            trend_strength: award(snap.smoothed_tr > 0.0, weights::TREND_STRENGTH),
            obv: award(snap.obv > snap.obv_prev, weights::OBV),
            volume: award(snap.volume.is_surging(VOLUME_SURGE_MULTIPLE), weights::VOLUME),
            fibonacci: award(close > snap.fibonacci, weights::FIBONACCI),
        }
    }

    /// Sum of all rules, in table order.
    pub fn total(&self) -> f64 {
        self.trend
            + self.rsi
            + self.macd
            + self.stochastic
            + self.sma
            + self.trend_strength
            + self.obv
            + self.volume
            + self.fibonacci
    }

    /// Number of rules that awarded points.
    pub fn hits(&self) -> usize {
        [
            self.trend,
            self.rsi,
            self.macd,
            self.stochastic,
            self.sma,
            self.trend_strength,
            self.obv,
            self.volume,
            self.fibonacci,
        ]
        .iter()
        .filter(|w| **w > 0.0)
        .count()
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Score, stop-loss and how they were reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub score: f64,
    pub stop_loss: f64,
    pub status: ScoreStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl ScoreOutcome {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            stop_loss: 0.0,
            status: ScoreStatus::Neutral,
            breakdown: None,
        }
    }

    pub fn fault() -> Self {
        Self {
            score: 0.0,
            stop_loss: 0.0,
            status: ScoreStatus::Fault,
            breakdown: None,
        }
    }

    pub fn is_fault(&self) -> bool {
        self.status == ScoreStatus::Fault
    }
}

/// `close - 2 * atr` when ATR is defined, otherwise 0.
pub fn stop_loss_for(close: f64, atr: Option<f64>) -> f64 {
    match atr {
        Some(atr) => close - STOP_LOSS_ATR_MULTIPLE * atr,
        None => 0.0,
    }
}

// ============================================================================
// Composite Scorer
// ============================================================================

/// Stateless composite scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeScorer;

impl CompositeScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score an ascending bar sequence.
    ///
    /// Deterministic in `bars`. Below [`MIN_BARS`] the result is a neutral
    /// zero without touching any indicator.
    pub fn score(&self, bars: &[PriceBar]) -> ScoreOutcome {
        if bars.len() < MIN_BARS {
            return ScoreOutcome::neutral();
        }

        match self.try_score(bars) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, bars = bars.len(), "Indicator fault, score downgraded");
                ScoreOutcome::fault()
            }
        }
    }

    /// Score a sequence, surfacing indicator faults.
    pub fn try_score(&self, bars: &[PriceBar]) -> Result<ScoreOutcome, IndicatorError> {
        let snap = IndicatorSnapshot::from_bars(bars)?;
        Ok(self.score_snapshot(&snap))
    }

    /// Apply the weight table to a precomputed snapshot.
    pub fn score_snapshot(&self, snap: &IndicatorSnapshot) -> ScoreOutcome {
        let breakdown = ScoreBreakdown::evaluate(snap);
        ScoreOutcome {
            score: breakdown.total(),
            stop_loss: stop_loss_for(snap.close, snap.atr14),
            status: ScoreStatus::Computed,
            breakdown: Some(breakdown),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
