//! Live price series with EMA overlays for a single ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data::PriceBar;
use crate::indicators::{ema_series, EMA_LONG, EMA_SHORT};

/// Chart window, named the way the chart API names ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "5d")]
    Week,
    #[default]
    #[serde(rename = "1mo")]
    Month,
    #[serde(rename = "6mo")]
    HalfYear,
    #[serde(rename = "1y")]
    Year,
}

impl ChartPeriod {
    /// Trading days covered by the window.
    pub fn bars(&self) -> usize {
        match self {
            Self::Week => 5,
            Self::Month => 22,
            Self::HalfYear => 126,
            Self::Year => 252,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "5d",
            Self::Month => "1mo",
            Self::HalfYear => "6mo",
            Self::Year => "1y",
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5d" => Ok(Self::Week),
            "1mo" => Ok(Self::Month),
            "6mo" => Ok(Self::HalfYear),
            "1y" => Ok(Self::Year),
            other => Err(format!("unknown chart period '{}', expected 5d, 1mo, 6mo or 1y", other)),
        }
    }
}

/// One day of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
}

/// Closes for a window with EMA20 and EMA50 overlays.
///
/// The averages are seeded at the first bar of the window, not from older
/// history, so a short window shows averages hugging the price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub period: ChartPeriod,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn from_bars(ticker: impl Into<String>, period: ChartPeriod, bars: &[PriceBar]) -> Self {
        let start = bars.len().saturating_sub(period.bars());
        let window = &bars[start..];

        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let ema20 = ema_series(&closes, EMA_SHORT);
        let ema50 = ema_series(&closes, EMA_LONG);

        let points = window
            .iter()
            .zip(ema20)
            .zip(ema50)
            .map(|((bar, ema20), ema50)| PricePoint {
                date: bar.date,
                close: bar.close,
                ema20,
                ema50,
            })
            .collect();

        Self {
            ticker: ticker.into(),
            period,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}
