//! Shared fixtures for scanner integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use lemniscate_common::config::Config;
use lemniscate_scanner::data::{PriceBar, StaticBarProvider};
use lemniscate_scanner::service::ScanService;

// ============================================================================
// Test Data Generators
// ============================================================================

/// Closes moving `step` per bar with half a point of wick on each side.
pub fn linear_bars(count: usize, start: f64, step: f64) -> Vec<PriceBar> {
    let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let mut prev_close = start - step;

    (0..count)
        .map(|i| {
            let close = start + step * i as f64;
            let open = prev_close;
            prev_close = close;
            PriceBar {
                date: first + Days::new(i as u64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

// ============================================================================
// Service Harness
// ============================================================================

pub struct Harness {
    pub dir: TempDir,
    pub provider: Arc<StaticBarProvider>,
    pub service: ScanService,
}

/// A service over a temp database and an in-memory provider.
pub fn harness(universe: &[&str], provider: StaticBarProvider) -> Harness {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.storage.db_path = dir.path().join("scores.db");
    config.scanner.universe = universe.iter().map(|t| t.to_string()).collect();
    config.scanner.requests_per_minute = 60_000;

    let provider = Arc::new(provider);
    let service = ScanService::from_config(&config, provider.clone()).unwrap();

    Harness {
        dir,
        provider,
        service,
    }
}
