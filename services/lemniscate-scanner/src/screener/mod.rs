//! Universe screening.
//!
//! Runs the composite scorer over a configured ticker universe.
//!
//! # Flow
//!
//! ```text
//! universe ──▶ canonicalize + dedup ──▶ bounded fetch pool ──▶ CompositeScorer
//!                                      (rate limit, timeout)        │
//!                                                                    ▼
//!                                              ScanBatch { records, failed }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use lemniscate_scanner::screener::{ScannerSettings, UniverseScanner};
//!
//! let scanner = UniverseScanner::new(ScannerSettings::from_config(&config), provider, limiter);
//! let batch = scanner.scan().await;
//! println!("{}", batch.summary());
//! ```

pub mod chart;
pub mod engine;

pub use chart::{ChartPeriod, PricePoint, PriceSeries};
pub use engine::{ScanBatch, ScannerSettings, ScoreRecord, TickerFailure, UniverseScanner};
