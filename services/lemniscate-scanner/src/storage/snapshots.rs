//! Weekly leaderboard snapshots.
//!
//! The first non-empty scan of an ISO week freezes its top records as that
//! week's snapshot. Entry prices never change afterwards; only the current
//! price moves, through [`SnapshotSealer::refresh`].

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::{conversion_error, format_timestamp, timestamp_column, Database, StoreSettings};
use crate::screener::ScanBatch;

// ============================================================================
// ISO Week
// ============================================================================

/// An ISO-8601 week, rendered as `YYYY-Www`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    /// Validated constructor; rejects weeks the year does not have.
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|_| Self { year, week })
    }

    /// The week containing `ts` as observed at `offset`.
    pub fn from_timestamp(ts: DateTime<Utc>, offset: FixedOffset) -> Self {
        let iso = ts.with_timezone(&offset).iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday of this week.
    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}

impl FromStr for IsoWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid ISO week '{}', expected YYYY-Www", s);
        let (year, week) = s.trim().split_once("-W").ok_or_else(invalid)?;
        if year.len() != 4 || week.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        Self::new(year, week).ok_or_else(invalid)
    }
}

impl Serialize for IsoWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Snapshot Types
// ============================================================================

/// One frozen leaderboard position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshotEntry {
    pub iso_week: IsoWeek,
    pub seal_timestamp: DateTime<Utc>,
    pub ticker: String,
    /// Close at seal time; never changes
    pub entry_price: f64,
    /// Entry price until a refresh finds a live price
    pub current_price: f64,
    pub price_updated_at: Option<DateTime<Utc>>,
}

impl WeeklySnapshotEntry {
    /// `(current - entry) / entry * 100`, undefined for a zero entry price.
    pub fn change_pct(&self) -> Option<f64> {
        if self.entry_price == 0.0 {
            None
        } else {
            Some((self.current_price - self.entry_price) / self.entry_price * 100.0)
        }
    }
}

/// A sealed week in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSeal {
    pub iso_week: IsoWeek,
    pub seal_timestamp: DateTime<Utc>,
    /// Scan whose batch was frozen
    pub scan_timestamp: DateTime<Utc>,
    pub entry_count: usize,
}

/// What a seal attempt did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SealOutcome {
    /// This batch created the week's snapshot
    Sealed { iso_week: IsoWeek, entries: usize },
    /// The week already had a snapshot; nothing written
    AlreadySealed { iso_week: IsoWeek },
    /// Empty batch; nothing to seal
    Skipped,
}

impl SealOutcome {
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed { .. })
    }
}

// ============================================================================
// Snapshot Sealer
// ============================================================================

/// At-most-once weekly sealing plus live price refresh.
#[derive(Clone)]
pub struct SnapshotSealer {
    db: Database,
}

impl SnapshotSealer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// ISO week of `ts` in the configured market offset.
    pub fn week_of(&self, ts: DateTime<Utc>) -> IsoWeek {
        IsoWeek::from_timestamp(ts, self.db.settings().week_offset)
    }

    /// Seal the batch's week from the batch's own top records, unless sealed.
    pub async fn maybe_seal(&self, batch: &ScanBatch) -> Result<SealOutcome> {
        let week = self.week_of(batch.scan_timestamp);
        let mut conn = self.db.lock().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin seal")?;
        let outcome = seal_week(&tx, batch, week, self.db.settings())?;
        tx.commit().context("Failed to commit seal")?;
        Ok(outcome)
    }

    /// Entries of a sealed week in leaderboard order; empty if unsealed.
    pub async fn get_week_snapshot(&self, week: IsoWeek) -> Result<Vec<WeeklySnapshotEntry>> {
        let conn = self.db.lock().await;
        read_entries(&conn, week)
    }

    /// Move `current_price` to the live price where one is available.
    ///
    /// Entries without a usable live price keep their prior current price.
    /// Price keys may be raw tickers; they are canonicalized before lookup.
    pub async fn refresh(
        &self,
        week: IsoWeek,
        live_prices: &HashMap<String, f64>,
    ) -> Result<Vec<WeeklySnapshotEntry>> {
        let settings = self.db.settings();
        let prices: HashMap<String, f64> = live_prices
            .iter()
            .filter(|(_, p)| p.is_finite() && **p > 0.0)
            .map(|(t, p)| (settings.canonicalize(t), *p))
            .collect();

        let mut conn = self.db.lock().await;
        let tx = conn.transaction().context("Failed to begin refresh")?;

        let entries = read_entries(&tx, week)?;
        let now = format_timestamp(&Utc::now());
        let mut updated = 0usize;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE weekly_snapshots SET current_price = ?1, price_updated_at = ?2
                 WHERE iso_week = ?3 AND ticker = ?4",
            )?;
            for entry in &entries {
                if let Some(price) = prices.get(&entry.ticker) {
                    stmt.execute(params![price, now, week.to_string(), entry.ticker])?;
                    updated += 1;
                }
            }
        }

        let refreshed = read_entries(&tx, week)?;
        tx.commit().context("Failed to commit refresh")?;

        info!(
            iso_week = %week,
            entries = refreshed.len(),
            updated,
            unchanged = refreshed.len() - updated,
            "Refreshed weekly snapshot prices"
        );

        Ok(refreshed)
    }

    /// Sealed weeks, newest first.
    pub async fn sealed_weeks(&self) -> Result<Vec<WeekSeal>> {
        let conn = self.db.lock().await;
        let mut stmt = conn.prepare(
            "SELECT iso_week, seal_timestamp, scan_timestamp, entry_count
             FROM weekly_seals ORDER BY iso_week DESC",
        )?;
        let seals = stmt
            .query_map([], |row| {
                Ok(WeekSeal {
                    iso_week: week_column(row, 0)?,
                    seal_timestamp: timestamp_column(row, 1)?,
                    scan_timestamp: timestamp_column(row, 2)?,
                    entry_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read sealed weeks")?;
        Ok(seals)
    }

    /// Whether `week` has been sealed.
    pub async fn is_sealed(&self, week: IsoWeek) -> Result<bool> {
        let conn = self.db.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM weekly_seals WHERE iso_week = ?1",
                params![week.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Claim the week and write its entries inside the caller's transaction.
///
/// The claim is `INSERT OR IGNORE` on the `weekly_seals` primary key, so a
/// second claimant sees zero changed rows and writes nothing.
pub(super) fn seal_week(
    tx: &Transaction<'_>,
    batch: &ScanBatch,
    week: IsoWeek,
    settings: &StoreSettings,
) -> Result<SealOutcome> {
    if batch.is_empty() {
        return Ok(SealOutcome::Skipped);
    }

    let top = snapshot_leaders(batch, settings);
    let week_key = week.to_string();
    let seal_timestamp = format_timestamp(&Utc::now());

    let claimed = tx.execute(
        "INSERT OR IGNORE INTO weekly_seals (iso_week, seal_timestamp, scan_timestamp, entry_count)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            week_key,
            seal_timestamp,
            format_timestamp(&batch.scan_timestamp),
            top.len() as i64
        ],
    )?;

    if claimed == 0 {
        debug!(iso_week = %week, "Week already sealed");
        return Ok(SealOutcome::AlreadySealed { iso_week: week });
    }

    let mut stmt = tx.prepare_cached(
        "INSERT INTO weekly_snapshots
         (seal_timestamp, iso_week, ticker, entry_price, current_price)
         VALUES (?1, ?2, ?3, ?4, ?4)",
    )?;
    for (ticker, entry_price) in &top {
        stmt.execute(params![seal_timestamp, week_key, ticker, entry_price])
            .with_context(|| format!("Failed to seal {} for {}", ticker, week))?;
    }

    info!(iso_week = %week, entries = top.len(), "Sealed weekly snapshot");

    Ok(SealOutcome::Sealed {
        iso_week: week,
        entries: top.len(),
    })
}

/// Highest-scoring distinct canonical tickers of the batch with their closes.
///
/// A ticker appearing twice under different raw spellings keeps its best
/// ranked record.
fn snapshot_leaders(batch: &ScanBatch, settings: &StoreSettings) -> Vec<(String, f64)> {
    let mut seen = HashSet::new();
    batch
        .top(batch.records.len())
        .into_iter()
        .map(|record| (settings.canonicalize(&record.ticker), record.last_close))
        .filter(|(ticker, _)| seen.insert(ticker.clone()))
        .take(settings.snapshot_size)
        .collect()
}

fn read_entries(conn: &rusqlite::Connection, week: IsoWeek) -> Result<Vec<WeeklySnapshotEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT iso_week, seal_timestamp, ticker, entry_price, current_price, price_updated_at
         FROM weekly_snapshots WHERE iso_week = ?1 ORDER BY id ASC",
    )?;
    let entries = stmt
        .query_map(params![week.to_string()], |row| {
            let updated: Option<String> = row.get(5)?;
            Ok(WeeklySnapshotEntry {
                iso_week: week_column(row, 0)?,
                seal_timestamp: timestamp_column(row, 1)?,
                ticker: row.get(2)?,
                entry_price: row.get(3)?,
                current_price: row.get(4)?,
                price_updated_at: match updated {
                    Some(_) => Some(timestamp_column(row, 5)?),
                    None => None,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read snapshot for {}", week))?;
    Ok(entries)
}

fn week_column(row: &rusqlite::Row, col: usize) -> rusqlite::Result<IsoWeek> {
    let raw: String = row.get(col)?;
    raw.parse().map_err(|e: String| conversion_error(col, e))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::TimeZone;

    fn week(s: &str) -> IsoWeek {
        s.parse().unwrap()
    }

    #[test]
    fn test_iso_week_parse_and_display() {
        let w = week("2026-W42");
        assert_eq!(w, IsoWeek { year: 2026, week: 42 });
        assert_eq!(w.to_string(), "2026-W42");
        assert_eq!(IsoWeek::new(2026, 1).unwrap().to_string(), "2026-W01");
        assert_eq!(w.monday(), NaiveDate::from_ymd_opt(2026, 10, 12));

        assert!("2026-42".parse::<IsoWeek>().is_err());
        assert!("2026-W54".parse::<IsoWeek>().is_err());
        assert!("2025-W53".parse::<IsoWeek>().is_err());
        assert!("2026-W53".parse::<IsoWeek>().is_ok());
    }

    #[test]
    fn test_iso_week_year_boundary() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let ts = Utc.with_ymd_and_hms(2027, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(IsoWeek::from_timestamp(ts, utc), week("2026-W53"));

        let ts = Utc.with_ymd_and_hms(2025, 12, 29, 12, 0, 0).unwrap();
        assert_eq!(IsoWeek::from_timestamp(ts, utc), week("2026-W01"));
    }

    #[test]
    fn test_iso_week_uses_market_offset() {
        // Sunday 22:00 UTC is already Monday in UTC+3
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap();
        let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(IsoWeek::from_timestamp(ts, istanbul), week("2026-W43"));
        assert_eq!(IsoWeek::from_timestamp(ts, utc), week("2026-W42"));
    }

    #[test]
    fn test_iso_week_serde() {
        let json = serde_json::to_string(&week("2026-W07")).unwrap();
        assert_eq!(json, "\"2026-W07\"");
        let back: IsoWeek = serde_json::from_str(&json).unwrap();
        assert_eq!(back, week("2026-W07"));
    }

    #[test]
    fn test_change_pct() {
        let mut entry = WeeklySnapshotEntry {
            iso_week: week("2026-W42"),
            seal_timestamp: at(2026, 10, 12, 12),
            ticker: "THYAO.IS".to_string(),
            entry_price: 200.0,
            current_price: 210.0,
            price_updated_at: None,
        };
        assert_eq!(entry.change_pct(), Some(5.0));
        entry.entry_price = 0.0;
        assert_eq!(entry.change_pct(), None);
    }

    #[tokio::test]
    async fn test_seal_freezes_top_of_batch_once() {
        let (_dir, db) = temp_db();
        let sealer = db.snapshots();

        let rows: Vec<(String, f64, f64)> = (0..12)
            .map(|i| (format!("T{:02}", i), (i % 4) as f64, 10.0 + i as f64))
            .collect();
        let rows_ref: Vec<(&str, f64, f64)> =
            rows.iter().map(|(t, s, c)| (t.as_str(), *s, *c)).collect();

        let outcome = sealer.maybe_seal(&batch(at(2026, 10, 12, 12), &rows_ref)).await.unwrap();
        assert_eq!(
            outcome,
            SealOutcome::Sealed {
                iso_week: week("2026-W42"),
                entries: 10
            }
        );

        let again = sealer
            .maybe_seal(&batch(at(2026, 10, 16, 12), &[("NEW", 7.0, 1.0)]))
            .await
            .unwrap();
        assert_eq!(again, SealOutcome::AlreadySealed { iso_week: week("2026-W42") });

        let entries = sealer.get_week_snapshot(week("2026-W42")).await.unwrap();
        assert_eq!(entries.len(), 10);
        // Score 3 first (T03, T07, T11), then score 2 in batch order
        let first: Vec<_> = entries.iter().take(5).map(|e| e.ticker.as_str()).collect();
        assert_eq!(first, vec!["T03.IS", "T07.IS", "T11.IS", "T02.IS", "T06.IS"]);
        assert!(entries.iter().all(|e| e.entry_price == e.current_price));
        assert!(!entries.iter().any(|e| e.ticker == "NEW.IS"));
    }

    #[tokio::test]
    async fn test_next_week_seals_separately() {
        let (_dir, db) = temp_db();
        let sealer = db.snapshots();
        sealer.maybe_seal(&batch(at(2026, 10, 12, 12), &[("A", 1.0, 1.0)])).await.unwrap();
        let outcome = sealer
            .maybe_seal(&batch(at(2026, 10, 19, 12), &[("B", 1.0, 1.0)]))
            .await
            .unwrap();
        assert!(outcome.is_sealed());

        let weeks = sealer.sealed_weeks().await.unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].iso_week, week("2026-W43"));
        assert_eq!(weeks[1].entry_count, 1);
        assert!(sealer.is_sealed(week("2026-W42")).await.unwrap());
        assert!(!sealer.is_sealed(week("2026-W44")).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_partial_prices() {
        let (_dir, db) = temp_db();
        let sealer = db.snapshots();
        sealer
            .maybe_seal(&batch(
                at(2026, 10, 12, 12),
                &[("AAA", 5.0, 100.0), ("BBB", 4.0, 50.0), ("CCC", 3.0, 20.0)],
            ))
            .await
            .unwrap();

        let prices: HashMap<String, f64> = [
            ("aaa".to_string(), 110.0),
            ("CCC.IS".to_string(), f64::NAN),
        ]
        .into_iter()
        .collect();
        let entries = sealer.refresh(week("2026-W42"), &prices).await.unwrap();

        assert_eq!(entries[0].current_price, 110.0);
        assert_eq!(entries[0].entry_price, 100.0);
        assert!(entries[0].price_updated_at.is_some());
        assert!((entries[0].change_pct().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(entries[1].current_price, 50.0);
        assert!(entries[1].price_updated_at.is_none());
        assert_eq!(entries[2].current_price, 20.0);
    }

    #[tokio::test]
    async fn test_refresh_unsealed_week_is_empty() {
        let (_dir, db) = temp_db();
        let entries = db
            .snapshots()
            .refresh(week("2026-W01"), &HashMap::new())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}
