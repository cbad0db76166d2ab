//! Persistent score storage using SQLite.
//!
//! One database holds:
//! - append-only score records, one per ticker per scan ([`ResultStore`])
//! - the weekly seal registry and snapshot entries ([`SnapshotSealer`])
//!
//! The schema is versioned with `PRAGMA user_version` and migrated once when
//! the database is opened. [`Database::commit_scan`] writes a batch and
//! claims the week's seal inside one `IMMEDIATE` transaction; the claim is an
//! insert against the `weekly_seals` primary key, so a week can be sealed at
//! most once no matter how many scans or processes race for it.

mod results;
mod snapshots;

pub use results::ResultStore;
pub use snapshots::{IsoWeek, SealOutcome, SnapshotSealer, WeekSeal, WeeklySnapshotEntry};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use lemniscate_common::config::Config;

use crate::data::canonical_ticker;
use crate::screener::ScanBatch;

// ============================================================================
// Database Schema
// ============================================================================

/// Ordered schema migrations; entry `i` upgrades `user_version` from `i` to `i + 1`.
const MIGRATIONS: &[&str] = &[
    // v1: score records, seal registry, weekly snapshots
    r#"
    CREATE TABLE score_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_timestamp TEXT NOT NULL,
        ticker TEXT NOT NULL,
        score REAL NOT NULL,
        close REAL NOT NULL,
        stop_loss REAL NOT NULL,
        tier TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX idx_score_records_ticker
    ON score_records(ticker, id DESC);

    CREATE INDEX idx_score_records_scan
    ON score_records(scan_timestamp, score DESC);

    CREATE TABLE weekly_seals (
        iso_week TEXT PRIMARY KEY,
        seal_timestamp TEXT NOT NULL,
        scan_timestamp TEXT NOT NULL,
        entry_count INTEGER NOT NULL
    );

    CREATE TABLE weekly_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        seal_timestamp TEXT NOT NULL,
        iso_week TEXT NOT NULL REFERENCES weekly_seals(iso_week),
        ticker TEXT NOT NULL,
        entry_price REAL NOT NULL,
        current_price REAL NOT NULL,
        price_updated_at TEXT,
        UNIQUE(iso_week, ticker)
    );
    "#,
];

/// Schema version this build writes.
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

// ============================================================================
// Configuration
// ============================================================================

/// Store parameters resolved from configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Path to SQLite database
    pub db_path: PathBuf,
    /// Market suffix applied by canonicalization
    pub ticker_suffix: String,
    /// Offset in which ISO weeks are computed
    pub week_offset: FixedOffset,
    /// Entries frozen per weekly seal
    pub snapshot_size: usize,
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let hours = config.market.utc_offset_hours;
        let week_offset = FixedOffset::east_opt(hours * 3600)
            .with_context(|| format!("Invalid UTC offset: {} hours", hours))?;

        Ok(Self {
            db_path: config.storage.db_path.clone(),
            ticker_suffix: config.market.ticker_suffix.clone(),
            week_offset,
            snapshot_size: config.scanner.snapshot_size,
        })
    }

    /// Settings for a database at `db_path` with market defaults.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ticker_suffix: ".IS".to_string(),
            week_offset: FixedOffset::east_opt(3 * 3600).unwrap_or(Utc.fix()),
            snapshot_size: 10,
        }
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        canonical_ticker(raw, &self.ticker_suffix)
    }
}

// ============================================================================
// Commit Report
// ============================================================================

/// Result of committing one scan batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReport {
    /// Records appended
    pub appended: usize,
    pub seal: SealOutcome,
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub record_count: u64,
    pub scan_count: u64,
    pub sealed_week_count: u64,
    pub snapshot_entry_count: u64,
    pub latest_scan: Option<DateTime<Utc>>,
    pub schema_version: u32,
    pub db_size_bytes: u64,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ScoreStore: {} records over {} scans, {} sealed weeks ({} entries, {:.2} MB)",
            self.record_count,
            self.scan_count,
            self.sealed_week_count,
            self.snapshot_entry_count,
            self.db_size_bytes as f64 / 1_048_576.0
        )
    }
}

// ============================================================================
// Database
// ============================================================================

/// Shared handle to the score database.
///
/// Cloning is cheap; clones share one connection.
#[derive(Clone)]
pub struct Database {
    /// SQLite connection wrapped in Mutex for thread safety
    conn: Arc<Mutex<Connection>>,
    settings: Arc<StoreSettings>,
}

impl Database {
    /// Open (creating if needed) and migrate the database.
    pub fn open(settings: StoreSettings) -> Result<Self> {
        if let Some(parent) = settings.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let mut conn = Connection::open(&settings.db_path)
            .context("Failed to open score database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        let version = migrate(&mut conn)?;

        info!(
            db_path = %settings.db_path.display(),
            schema_version = version,
            "Initialized score database"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn db_path(&self) -> &Path {
        &self.settings.db_path
    }

    /// Result store view over this database.
    pub fn results(&self) -> ResultStore {
        ResultStore::new(self.clone())
    }

    /// Snapshot sealer view over this database.
    pub fn snapshots(&self) -> SnapshotSealer {
        SnapshotSealer::new(self.clone())
    }

    /// Append a batch and attempt the weekly seal as one transaction.
    ///
    /// Either both writes land or neither does, so a failed commit can be
    /// retried without producing a second seal.
    pub async fn commit_scan(&self, batch: &ScanBatch) -> Result<CommitReport> {
        let week = IsoWeek::from_timestamp(batch.scan_timestamp, self.settings.week_offset);

        let mut db = self.conn.lock().await;
        let tx = db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin scan commit")?;

        let appended = results::insert_batch(&tx, batch, &self.settings)
            .context("Failed to append scan batch")?;
        let seal = snapshots::seal_week(&tx, batch, week, &self.settings)
            .context("Failed to seal weekly snapshot")?;

        tx.commit().context("Failed to commit scan batch")?;

        debug!(
            scan_timestamp = %format_timestamp(&batch.scan_timestamp),
            appended,
            iso_week = %week,
            sealed = seal.is_sealed(),
            "Committed scan batch"
        );

        Ok(CommitReport { appended, seal })
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let db = self.conn.lock().await;

        let record_count: i64 =
            db.query_row("SELECT COUNT(*) FROM score_records", [], |row| row.get(0))?;
        let scan_count: i64 = db.query_row(
            "SELECT COUNT(DISTINCT scan_timestamp) FROM score_records",
            [],
            |row| row.get(0),
        )?;
        let sealed_week_count: i64 =
            db.query_row("SELECT COUNT(*) FROM weekly_seals", [], |row| row.get(0))?;
        let snapshot_entry_count: i64 =
            db.query_row("SELECT COUNT(*) FROM weekly_snapshots", [], |row| row.get(0))?;
        let latest_scan: Option<String> = db.query_row(
            "SELECT MAX(scan_timestamp) FROM score_records",
            [],
            |row| row.get(0),
        )?;
        let schema_version: u32 = db.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        let db_size_bytes = std::fs::metadata(&self.settings.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            record_count: record_count as u64,
            scan_count: scan_count as u64,
            sealed_week_count: sealed_week_count as u64,
            snapshot_entry_count: snapshot_entry_count as u64,
            latest_scan: latest_scan
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            schema_version,
            db_size_bytes,
        })
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// Apply pending migrations and return the resulting schema version.
fn migrate(conn: &mut Connection) -> Result<u32> {
    let current: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read schema version")?;

    if current > SCHEMA_VERSION {
        bail!(
            "Database schema version {} is newer than supported version {}",
            current,
            SCHEMA_VERSION
        );
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = idx as u32 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("Failed to apply schema migration v{}", version))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        info!(version, "Applied schema migration");
    }

    Ok(SCHEMA_VERSION)
}

// ============================================================================
// Timestamp Encoding
// ============================================================================

/// Fixed-width RFC 3339 with microseconds, so text order matches time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {}", raw))
}

/// Column conversion failure for a text column.
pub(crate) fn conversion_error(
    col: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, err.into())
}

pub(crate) fn timestamp_column(row: &rusqlite::Row, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, e))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::scoring::{ScoreStatus, SignalTier};
    use crate::screener::ScoreRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// Database in a temporary directory; keep the `TempDir` alive.
    pub(crate) fn temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(StoreSettings::at(dir.path().join("scores.db"))).unwrap();
        (dir, db)
    }

    pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    pub(crate) fn record(ts: DateTime<Utc>, ticker: &str, score: f64, close: f64) -> ScoreRecord {
        ScoreRecord {
            scan_timestamp: ts,
            ticker: ticker.to_string(),
            score,
            last_close: close,
            stop_loss: close * 0.9,
            signal_tier: SignalTier::classify(score, 5.5),
            status: ScoreStatus::Computed,
        }
    }

    pub(crate) fn batch(ts: DateTime<Utc>, rows: &[(&str, f64, f64)]) -> ScanBatch {
        ScanBatch {
            scan_timestamp: ts,
            records: rows
                .iter()
                .map(|&(ticker, score, close)| record(ts, ticker, score, close))
                .collect(),
            requested: rows.len(),
            failed: Vec::new(),
        }
    }
}
