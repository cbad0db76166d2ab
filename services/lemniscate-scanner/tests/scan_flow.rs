//! End-to-end tests for the scan → append → seal flow.
//!
//! Runs the full service against an in-memory provider and a temp SQLite
//! database: per-ticker failures, short series, weekly sealing and
//! ticker canonicalization on both sides of the store.

mod common;

use lemniscate_scanner::scoring::ScoreStatus;
use lemniscate_scanner::storage::{IsoWeek, SealOutcome};
use lemniscate_scanner::data::StaticBarProvider;

use common::{harness, linear_bars, utc};

fn week(year: i32, week: u32) -> IsoWeek {
    IsoWeek::new(year, week).unwrap()
}

fn universe_provider() -> StaticBarProvider {
    StaticBarProvider::new()
        .with_series("THYAO.IS", linear_bars(60, 100.0, 1.0))
        .with_series("GARAN.IS", linear_bars(60, 100.0, -1.0))
        .with_series("KCHOL.IS", linear_bars(30, 100.0, 1.0))
        .with_failure("ASELS.IS")
}

#[tokio::test]
async fn test_failed_ticker_is_excluded_and_short_series_is_neutral() {
    let h = harness(&["THYAO", "GARAN", "ASELS", "KCHOL"], universe_provider());

    let report = h.service.trigger_scan_at(utc(2026, 10, 12, 12)).await.unwrap();
    let batch = &report.batch;

    assert_eq!(batch.requested, 4);
    assert_eq!(batch.succeeded(), 3);
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(batch.failed[0].ticker, "ASELS.IS");

    let tickers: Vec<_> = batch.records.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["THYAO.IS", "GARAN.IS", "KCHOL.IS"]);

    let short = h.service.get_latest("KCHOL").await.unwrap().unwrap();
    assert_eq!(short.status, ScoreStatus::Neutral);
    assert_eq!(short.score, 0.0);
    assert_eq!(short.stop_loss, 0.0);
    assert_eq!(short.last_close, 129.0);

    assert!(h.service.get_latest("ASELS").await.unwrap().is_none());
}

#[tokio::test]
async fn test_two_scans_in_one_week_seal_once() {
    let h = harness(&["THYAO", "GARAN", "ASELS", "KCHOL"], universe_provider());

    let first = h.service.trigger_scan_at(utc(2026, 10, 12, 12)).await.unwrap();
    assert_eq!(
        first.seal,
        SealOutcome::Sealed {
            iso_week: week(2026, 42),
            entries: 3
        }
    );

    // Prices move before the second scan of the same week
    h.provider.set_series("THYAO.IS", linear_bars(60, 120.0, 1.0));
    let second = h.service.trigger_scan_at(utc(2026, 10, 14, 12)).await.unwrap();
    assert_eq!(
        second.seal,
        SealOutcome::AlreadySealed {
            iso_week: week(2026, 42)
        }
    );

    let history = h.service.get_history("thyao", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].last_close, 179.0);
    assert_eq!(history[1].last_close, 159.0);

    let snapshot = h.service.get_week_snapshot(week(2026, 42)).await.unwrap();
    let leaders: Vec<_> = snapshot.iter().map(|e| e.ticker.as_str()).collect();
    assert_eq!(leaders, vec!["THYAO.IS", "GARAN.IS", "KCHOL.IS"]);
    assert_eq!(snapshot[0].entry_price, 159.0);
    assert_eq!(snapshot[0].current_price, 159.0);
    assert!(snapshot[0].price_updated_at.is_none());

    let top = h.service.get_top(10).await.unwrap();
    assert_eq!(top.len(), 3);
    assert!(top.iter().all(|r| r.scan_timestamp == utc(2026, 10, 14, 12)));
    assert_eq!(top[0].last_close, 179.0);
}

#[tokio::test]
async fn test_week_boundary_uses_market_offset() {
    let h = harness(&["THYAO"], StaticBarProvider::new().with_series("THYAO.IS", linear_bars(60, 100.0, 1.0)));

    // Sunday 20:00 UTC is 23:00 Sunday in market time
    let report = h.service.trigger_scan_at(utc(2026, 10, 18, 20)).await.unwrap();
    assert_eq!(
        report.seal,
        SealOutcome::Sealed {
            iso_week: week(2026, 42),
            entries: 1
        }
    );

    // Sunday 22:00 UTC is 01:00 Monday in market time
    let report = h.service.trigger_scan_at(utc(2026, 10, 18, 22)).await.unwrap();
    assert_eq!(
        report.seal,
        SealOutcome::Sealed {
            iso_week: week(2026, 43),
            entries: 1
        }
    );
    let report = h.service.trigger_scan_at(utc(2026, 10, 12, 12)).await.unwrap();
    assert_eq!(
        report.seal,
        SealOutcome::AlreadySealed {
            iso_week: week(2026, 42)
        }
    );

    let weeks = h.service.sealed_weeks().await.unwrap();
    let sealed: Vec<_> = weeks.iter().map(|w| w.iso_week.to_string()).collect();
    assert_eq!(sealed, vec!["2026-W43", "2026-W42"]);
}

#[tokio::test]
async fn test_all_failed_scan_appends_nothing() {
    let h = harness(&["ASELS"], StaticBarProvider::new().with_failure("ASELS.IS"));

    let report = h.service.trigger_scan_at(utc(2026, 10, 12, 12)).await.unwrap();
    assert!(report.batch.is_empty());
    assert_eq!(report.seal, SealOutcome::Skipped);

    let stats = h.service.stats().await.unwrap();
    assert_eq!(stats.record_count, 0);
    assert_eq!(stats.sealed_week_count, 0);
}

#[tokio::test]
async fn test_raw_and_canonical_tickers_share_one_key() {
    let h = harness(
        &["thyao", "THYAO.IS", " Thyao "],
        StaticBarProvider::new().with_series("THYAO.IS", linear_bars(60, 100.0, 1.0)),
    );

    let report = h.service.trigger_scan_at(utc(2026, 10, 12, 12)).await.unwrap();
    assert_eq!(report.batch.requested, 1);

    let by_raw = h.service.get_latest("thyao").await.unwrap().unwrap();
    let by_canonical = h.service.get_latest("THYAO.IS").await.unwrap().unwrap();
    assert_eq!(by_raw, by_canonical);
    assert_eq!(by_raw.score, 5.0);
    assert_eq!(by_raw.stop_loss, 155.0);
}
