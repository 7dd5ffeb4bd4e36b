//! Reminder, alert and notification handlers
//!
//! Loading the reminder or alert list runs the matching engine pass first,
//! the same way a dashboard or provider view load does. Suppression windows
//! keep repeated loads from creating duplicates.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{get_actor, AppError, AppState};
use careu_core::insights::{Audience, Notification};
use careu_core::NotificationStore;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// patient or provider; both when omitted
    pub audience: Option<String>,
    /// List dismissed notifications instead of active ones
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Request body for sharing data with a provider
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub provider_id: i64,
}

/// Response for an explicit engine run
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub count: usize,
    pub created: Vec<Notification>,
}

fn run_pass(
    state: &AppState,
    actor: &str,
    user_id: i64,
    audience: Audience,
) -> Result<Vec<Notification>, AppError> {
    state.db.require_user(user_id)?;
    let created = state
        .engine
        .evaluate_at(&state.db, user_id, audience, Utc::now())?;

    state.db.log_audit(
        actor,
        "run",
        Some(audience.as_str()),
        Some(user_id),
        Some(&format!("created={}", created.len())),
    )?;

    Ok(created)
}

/// GET /api/users/:user_id/reminders - Run the patient pass, list active reminders
pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    let actor = get_actor(&headers);
    run_pass(&state, &actor, user_id, Audience::Patient)?;
    let active = state.db.list_active(user_id, Some(Audience::Patient))?;
    Ok(Json(active))
}

/// POST /api/users/:user_id/reminders/run - "Check now"
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, AppError> {
    let actor = get_actor(&headers);
    let created = run_pass(&state, &actor, user_id, Audience::Patient)?;
    Ok(Json(RunResponse {
        count: created.len(),
        created,
    }))
}

/// GET /api/users/:user_id/alerts - Run the provider pass, list active alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    let actor = get_actor(&headers);
    run_pass(&state, &actor, user_id, Audience::Provider)?;
    let active = state.db.list_active(user_id, Some(Audience::Provider))?;
    Ok(Json(active))
}

/// POST /api/users/:user_id/alerts/run - Generate provider alerts now
pub async fn run_alerts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, AppError> {
    let actor = get_actor(&headers);
    let created = run_pass(&state, &actor, user_id, Audience::Provider)?;
    Ok(Json(RunResponse {
        count: created.len(),
        created,
    }))
}

/// GET /api/users/:user_id/notifications - List without running the engine
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<NotificationQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, AppError> {
    let actor = get_actor(&headers);
    let audience = params
        .audience
        .as_deref()
        .map(|a| a.parse::<Audience>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    state.db.require_user(user_id)?;
    let notifications = if params.dismissed {
        state
            .db
            .list_dismissed(user_id, audience, params.limit.clamp(1, 200))?
    } else {
        state.db.list_active(user_id, audience)?
    };

    state.db.log_audit(
        &actor,
        "list",
        Some("notification"),
        Some(user_id),
        Some(&format!(
            "audience={:?}, dismissed={}, count={}",
            params.audience,
            params.dismissed,
            notifications.len()
        )),
    )?;

    Ok(Json(notifications))
}

/// POST /api/users/:user_id/notifications/:id/dismiss
///
/// Only the owning user may dismiss; anything else is a 404.
pub async fn dismiss_notification(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<Notification>, AppError> {
    let actor = get_actor(&headers);
    let notification = state.engine.dismiss(&state.db, id, user_id)?;

    state.db.log_audit(
        &actor,
        "dismiss",
        Some("notification"),
        Some(id),
        Some(&format!("user_id={}", user_id)),
    )?;

    Ok(Json(notification))
}

/// POST /api/users/:user_id/notifications/:id/act - Acted upon (also dismisses)
pub async fn act_on_notification(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Json<Notification>, AppError> {
    let actor = get_actor(&headers);
    let notification = state.engine.act_upon(&state.db, id, user_id)?;

    state.db.log_audit(
        &actor,
        "act",
        Some("notification"),
        Some(id),
        Some(&format!("user_id={}", user_id)),
    )?;

    Ok(Json(notification))
}

/// POST /api/users/:user_id/share - Send a nutrition summary to a provider
///
/// 403 unless the patient has consented to data sharing.
pub async fn share_with_provider(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<ShareRequest>,
) -> Result<Json<Notification>, AppError> {
    let actor = get_actor(&headers);
    let notification =
        state
            .engine
            .share_with_provider(&state.db, user_id, req.provider_id, Utc::now())?;

    state.db.log_audit(
        &actor,
        "share",
        Some("profile"),
        Some(user_id),
        Some(&format!("provider_id={}", req.provider_id)),
    )?;

    Ok(Json(notification))
}
