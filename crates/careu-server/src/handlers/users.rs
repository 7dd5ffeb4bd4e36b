//! User, profile, consent and metrics handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{get_actor, AppError, AppState};
use careu_core::models::{Profile, ProfileUpdate, User};
use careu_core::{ProfileStore, Targets};

/// Request body for creating a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// Request body for granting or revoking data-sharing consent
#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub consent: bool,
}

/// A user together with their profile
#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub user: User,
    pub profile: Option<Profile>,
}

/// Derived targets plus what is still missing to personalize them
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub user_id: i64,
    pub profile_complete: bool,
    pub missing_fields: Vec<&'static str>,
    pub targets: Targets,
}

/// GET /api/users - List users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    let actor = get_actor(&headers);
    let users = state.db.list_users()?;

    state.db.log_audit(
        &actor,
        "list",
        Some("user"),
        None,
        Some(&format!("count={}", users.len())),
    )?;

    Ok(Json(users))
}

/// POST /api/users - Create a user (and their empty profile)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    let actor = get_actor(&headers);
    let user = state.db.create_user(&req.username)?;

    state
        .db
        .log_audit(&actor, "create", Some("user"), Some(user.id), None)?;

    Ok(Json(user))
}

/// GET /api/users/:user_id - Get a user with their profile
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<UserDetail>, AppError> {
    let actor = get_actor(&headers);
    let user = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let profile = state.db.get_profile(user_id)?;

    state
        .db
        .log_audit(&actor, "view", Some("user"), Some(user_id), None)?;

    Ok(Json(UserDetail { user, profile }))
}

/// GET /api/users/:user_id/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Profile>, AppError> {
    let actor = get_actor(&headers);
    let profile = state
        .db
        .get_profile(user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    state
        .db
        .log_audit(&actor, "view", Some("profile"), Some(user_id), None)?;

    Ok(Json(profile))
}

/// PUT /api/users/:user_id/profile - Partial profile update
///
/// Only the fields present in the body are changed.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let actor = get_actor(&headers);
    let profile = state.db.update_profile(user_id, &update)?;

    state.db.log_audit(
        &actor,
        "update",
        Some("profile"),
        Some(user_id),
        Some(&format!("missing={:?}", profile.missing_fields())),
    )?;

    Ok(Json(profile))
}

/// PUT /api/users/:user_id/consent - Grant or revoke data sharing
pub async fn set_consent(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<ConsentRequest>,
) -> Result<Json<Profile>, AppError> {
    let actor = get_actor(&headers);
    let profile = state.db.set_consent(user_id, req.consent, Utc::now())?;

    let action = if req.consent {
        "consent_grant"
    } else {
        "consent_revoke"
    };
    state
        .db
        .log_audit(&actor, action, Some("profile"), Some(user_id), None)?;

    Ok(Json(profile))
}

/// GET /api/users/:user_id/metrics - BMR, TDEE, protein target and BMI
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, AppError> {
    let actor = get_actor(&headers);
    let profile = state
        .db
        .get_profile(user_id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    let response = MetricsResponse {
        user_id,
        profile_complete: profile.is_complete(),
        missing_fields: profile.missing_fields(),
        targets: Targets::for_profile(&profile),
    };

    state
        .db
        .log_audit(&actor, "view", Some("metrics"), Some(user_id), None)?;

    Ok(Json(response))
}
