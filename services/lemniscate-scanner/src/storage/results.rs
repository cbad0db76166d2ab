//! Append-only score records.

use anyhow::{Context, Result};
use rusqlite::{params, Transaction};

use super::{conversion_error, format_timestamp, timestamp_column, Database, StoreSettings};
use crate::screener::{ScanBatch, ScoreRecord};

const RECORD_COLUMNS: &str =
    "scan_timestamp, ticker, score, close, stop_loss, tier, status";

/// Append-only store of per-scan score records.
///
/// Records are never updated; a correction is a new record. Every ticker
/// argument goes through the same canonicalization used on write.
#[derive(Clone)]
pub struct ResultStore {
    db: Database,
}

impl ResultStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write all records of a batch, all or nothing.
    pub async fn append(&self, batch: &ScanBatch) -> Result<usize> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction().context("Failed to begin append")?;
        let count = insert_batch(&tx, batch, self.db.settings())?;
        tx.commit().context("Failed to commit append")?;
        Ok(count)
    }

    /// Most recently inserted record for a ticker.
    pub async fn get_latest(&self, ticker: &str) -> Result<Option<ScoreRecord>> {
        Ok(self.history(ticker, 1).await?.into_iter().next())
    }

    /// Newest-first records for a ticker.
    pub async fn history(&self, ticker: &str, limit: usize) -> Result<Vec<ScoreRecord>> {
        let key = self.db.settings().canonicalize(ticker);
        let conn = self.db.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM score_records WHERE ticker = ?1 ORDER BY id DESC LIMIT ?2",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![key, limit as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read records for {}", key))?;
        Ok(records)
    }

    /// Top `n` records of the most recent scan.
    ///
    /// Ordered by score descending; equal scores keep insertion order.
    pub async fn get_top(&self, n: usize) -> Result<Vec<ScoreRecord>> {
        let conn = self.db.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM score_records
             WHERE scan_timestamp = (SELECT MAX(scan_timestamp) FROM score_records)
             ORDER BY score DESC, id ASC
             LIMIT ?1",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![n as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read top records")?;
        Ok(records)
    }
}

/// Insert every record of `batch` inside the caller's transaction.
pub(super) fn insert_batch(
    tx: &Transaction<'_>,
    batch: &ScanBatch,
    settings: &StoreSettings,
) -> Result<usize> {
    let mut stmt = tx.prepare_cached(&format!(
        "INSERT INTO score_records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        RECORD_COLUMNS
    ))?;

    let scan_timestamp = format_timestamp(&batch.scan_timestamp);
    for record in &batch.records {
        stmt.execute(params![
            scan_timestamp,
            settings.canonicalize(&record.ticker),
            record.score,
            record.last_close,
            record.stop_loss,
            record.signal_tier.as_str(),
            record.status.as_str(),
        ])
        .with_context(|| format!("Failed to insert record for {}", record.ticker))?;
    }

    Ok(batch.records.len())
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ScoreRecord> {
    let tier: String = row.get(5)?;
    let status: String = row.get(6)?;

    Ok(ScoreRecord {
        scan_timestamp: timestamp_column(row, 0)?,
        ticker: row.get(1)?,
        score: row.get(2)?,
        last_close: row.get(3)?,
        stop_loss: row.get(4)?,
        signal_tier: tier.parse().map_err(|e: String| conversion_error(5, e))?,
        status: status.parse().map_err(|e: String| conversion_error(6, e))?,
    })
}
