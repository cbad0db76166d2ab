//! HTTP routes for the scanner service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lemniscate_common::Error;

use crate::screener::{ChartPeriod, PriceSeries, ScoreRecord, TickerFailure};
use crate::storage::{IsoWeek, SealOutcome, StoreStats, WeekSeal, WeeklySnapshotEntry};
use crate::ScannerState;

const DEFAULT_TOP_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 20;

// ============================================================================
// Error Mapping
// ============================================================================

/// Service error rendered as `{ "error": ..., "retryable": ... }`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    /// `5d`, `1mo`, `6mo` or `1y`; defaults to `1mo`
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan_timestamp: String,
    pub requested: usize,
    pub succeeded: usize,
    pub faulted: usize,
    pub failed: Vec<TickerFailure>,
    pub seal: SealOutcome,
}

#[derive(Debug, Serialize)]
pub struct ScoresResponse {
    pub records: Vec<ScoreRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct WeeksResponse {
    pub current_week: IsoWeek,
    pub weeks: Vec<WeekSeal>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotEntryView {
    #[serde(flatten)]
    pub entry: WeeklySnapshotEntry,
    pub change_pct: Option<f64>,
}

impl From<WeeklySnapshotEntry> for SnapshotEntryView {
    fn from(entry: WeeklySnapshotEntry) -> Self {
        Self {
            change_pct: entry.change_pct(),
            entry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub iso_week: IsoWeek,
    pub sealed: bool,
    pub entries: Vec<SnapshotEntryView>,
}

impl SnapshotResponse {
    fn new(iso_week: IsoWeek, entries: Vec<WeeklySnapshotEntry>) -> Self {
        Self {
            iso_week,
            sealed: !entries.is_empty(),
            entries: entries.into_iter().map(SnapshotEntryView::from).collect(),
        }
    }
}

/// `current` or `YYYY-Www`.
fn resolve_week(state: &ScannerState, raw: &str) -> Result<IsoWeek, ApiError> {
    if raw.eq_ignore_ascii_case("current") {
        return Ok(state.service.current_week());
    }
    raw.parse::<IsoWeek>()
        .map_err(|e| ApiError(Error::InvalidInput(e)))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "lemniscate-scanner".to_string(),
    })
}

/// Run a full universe scan and commit it.
pub async fn trigger_scan(State(state): State<Arc<ScannerState>>) -> ApiResult<ScanResponse> {
    let report = state.service.trigger_scan().await?;
    let batch = report.batch;

    Ok(Json(ScanResponse {
        scan_timestamp: batch.scan_timestamp.to_rfc3339(),
        requested: batch.requested,
        succeeded: batch.succeeded(),
        faulted: batch.faulted(),
        failed: batch.failed,
        seal: report.seal,
    }))
}

/// Leaders of the most recent scan.
pub async fn get_top(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<ScoresResponse> {
    let records = state
        .service
        .get_top(query.limit.unwrap_or(DEFAULT_TOP_LIMIT))
        .await?;
    let count = records.len();
    Ok(Json(ScoresResponse { records, count }))
}

pub async fn get_latest(
    State(state): State<Arc<ScannerState>>,
    Path(ticker): Path<String>,
) -> ApiResult<ScoreRecord> {
    state
        .service
        .get_latest(&ticker)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(Error::NotFound(format!("no score recorded for {}", ticker))))
}

pub async fn get_history(
    State(state): State<Arc<ScannerState>>,
    Path(ticker): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<ScoresResponse> {
    let records = state
        .service
        .get_history(&ticker, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?;
    let count = records.len();
    Ok(Json(ScoresResponse { records, count }))
}

/// Live closes with EMA20/EMA50 overlays for one ticker.
pub async fn get_chart(
    State(state): State<Arc<ScannerState>>,
    Path(ticker): Path<String>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<PriceSeries> {
    let period = match query.period.as_deref() {
        Some(raw) => raw
            .parse::<ChartPeriod>()
            .map_err(|e| ApiError(Error::InvalidInput(e)))?,
        None => ChartPeriod::default(),
    };
    Ok(Json(state.service.price_series(&ticker, period).await?))
}

/// Sealed weeks, newest first, plus the week "now" falls in.
pub async fn list_weeks(State(state): State<Arc<ScannerState>>) -> ApiResult<WeeksResponse> {
    let weeks = state.service.sealed_weeks().await?;
    Ok(Json(WeeksResponse {
        current_week: state.service.current_week(),
        weeks,
    }))
}

pub async fn get_week_snapshot(
    State(state): State<Arc<ScannerState>>,
    Path(week): Path<String>,
) -> ApiResult<SnapshotResponse> {
    let week = resolve_week(&state, &week)?;
    let entries = state.service.get_week_snapshot(week).await?;
    Ok(Json(SnapshotResponse::new(week, entries)))
}

/// Pull live prices for a sealed week's entries.
pub async fn refresh_week(
    State(state): State<Arc<ScannerState>>,
    Path(week): Path<String>,
) -> ApiResult<SnapshotResponse> {
    let week = resolve_week(&state, &week)?;
    let entries = state.service.refresh_week_prices(week).await?;
    Ok(Json(SnapshotResponse::new(week, entries)))
}

pub async fn get_stats(State(state): State<Arc<ScannerState>>) -> ApiResult<StoreStats> {
    Ok(Json(state.service.stats().await?))
}
