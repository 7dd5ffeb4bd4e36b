//! Health log handlers (nutrition, activity, sleep, vitals)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{get_actor, AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use careu_core::models::{DailyTotals, LogEntry, LogKind, NewLogEntry};

/// Query parameters for listing log entries
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub kind: String,
    #[serde(default = "default_log_limit")]
    pub limit: i64,
}

fn default_log_limit() -> i64 {
    50
}

/// Query parameters for daily totals
#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    /// YYYY-MM-DD, defaults to today (UTC)
    pub date: Option<String>,
}

fn parse_kind(kind: &str) -> Result<LogKind, AppError> {
    kind.parse::<LogKind>()
        .map_err(|e| AppError::bad_request(&e))
}

/// GET /api/users/:user_id/logs?kind=nutrition - Most recent entries of one kind
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<LogQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let actor = get_actor(&headers);
    let kind = parse_kind(&params.kind)?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    state.db.require_user(user_id)?;
    let entries = state.db.list_entries(user_id, kind, limit)?;

    state.db.log_audit(
        &actor,
        "list",
        Some(kind.as_str()),
        Some(user_id),
        Some(&format!("limit={}, count={}", limit, entries.len())),
    )?;

    Ok(Json(entries))
}

/// POST /api/users/:user_id/logs - Add an entry
///
/// The body is tagged by `kind`, e.g. `{"kind": "sleep", "date": "2026-03-14",
/// "duration_minutes": 420}`.
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Json(entry): Json<NewLogEntry>,
) -> Result<Json<LogEntry>, AppError> {
    let actor = get_actor(&headers);
    let stored = state.db.add_entry(user_id, &entry)?;

    state.db.log_audit(
        &actor,
        "create",
        Some(stored.kind().as_str()),
        Some(stored.id()),
        Some(&format!("user_id={}", user_id)),
    )?;

    Ok(Json(stored))
}

/// DELETE /api/users/:user_id/logs/:kind/:id
pub async fn delete_log(
    State(state): State<Arc<AppState>>,
    Path((user_id, kind, id)): Path<(i64, String, i64)>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let actor = get_actor(&headers);
    let kind = parse_kind(&kind)?;

    state.db.delete_entry(user_id, kind, id)?;

    state.db.log_audit(
        &actor,
        "delete",
        Some(kind.as_str()),
        Some(id),
        Some(&format!("user_id={}", user_id)),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/users/:user_id/nutrition/daily?date=YYYY-MM-DD
pub async fn get_daily_totals(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<DailyQuery>,
    headers: HeaderMap,
) -> Result<Json<DailyTotals>, AppError> {
    let actor = get_actor(&headers);
    let date = match params.date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request("Invalid date format, expected YYYY-MM-DD"))?,
        None => Utc::now().date_naive(),
    };

    state.db.require_user(user_id)?;
    let totals = state.db.daily_totals(user_id, date)?;

    state.db.log_audit(
        &actor,
        "view",
        Some("daily_totals"),
        Some(user_id),
        Some(&format!("date={}", date)),
    )?;

    Ok(Json(totals))
}
