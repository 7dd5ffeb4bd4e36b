//! CareU Web Server
//!
//! Axum-based REST API over the CareU insight engine.
//!
//! Security features:
//! - Bearer API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Owner-scoped notification actions (dismiss / act)
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use careu_core::{Database, InsightEngine};

mod handlers;
mod scheduler;

pub use scheduler::{
    run_scheduled_pass, start_reminder_scheduler, PassSummary, ReminderScheduleConfig,
};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Environment variable holding comma-separated API keys
pub const API_KEYS_ENV: &str = "CAREU_API_KEYS";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Parse a comma-separated list of API keys, skipping blanks
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub engine: InsightEngine,
}

/// Authentication middleware - validates bearer API keys
///
/// Keys are compared in constant time.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Identify the caller for audit logging
///
/// Returns "api-key" for bearer auth, or "local-dev" when unauthenticated.
pub fn get_actor(headers: &axum::http::HeaderMap) -> String {
    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with the built-in rule registry
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_engine(db, config, InsightEngine::new())
}

/// Create the application router with a configured engine
pub fn create_router_with_engine(
    db: Database,
    config: ServerConfig,
    engine: InsightEngine,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        engine,
    });

    let api_routes = Router::new()
        // Users and profiles
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/users/:user_id", get(handlers::get_user))
        .route(
            "/users/:user_id/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route("/users/:user_id/consent", put(handlers::set_consent))
        .route("/users/:user_id/metrics", get(handlers::get_metrics))
        // Health logs
        .route(
            "/users/:user_id/logs",
            get(handlers::list_logs).post(handlers::create_log),
        )
        .route(
            "/users/:user_id/logs/:kind/:id",
            delete(handlers::delete_log),
        )
        .route(
            "/users/:user_id/nutrition/daily",
            get(handlers::get_daily_totals),
        )
        // Patient reminders
        .route("/users/:user_id/reminders", get(handlers::list_reminders))
        .route("/users/:user_id/reminders/run", post(handlers::run_reminders))
        // Provider alerts
        .route("/users/:user_id/alerts", get(handlers::list_alerts))
        .route("/users/:user_id/alerts/run", post(handlers::run_alerts))
        // Notifications
        .route(
            "/users/:user_id/notifications",
            get(handlers::list_notifications),
        )
        .route(
            "/users/:user_id/notifications/:id/dismiss",
            post(handlers::dismiss_notification),
        )
        .route(
            "/users/:user_id/notifications/:id/act",
            post(handlers::act_on_notification),
        )
        // Sharing
        .route("/users/:user_id/share", post(handlers::share_with_provider))
        // Audit log
        .route("/audit", get(handlers::list_audit_log));

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::default(), InsightEngine::new()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
    engine: InsightEngine,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!(
            "No API keys configured ({} is empty); every request will be rejected",
            API_KEYS_ENV
        );
    }

    if let Some(schedule) = ReminderScheduleConfig::from_env() {
        start_reminder_scheduler(db.clone(), engine.clone(), schedule);
    }

    let app = create_router_with_engine(db, config, engine);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn forbidden(msg: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Caller mistakes keep their message; everything else is opaque
        match err.downcast_ref::<careu_core::Error>() {
            Some(careu_core::Error::NotFound(what)) => {
                return Self::not_found(&format!("Not found: {}", what))
            }
            Some(careu_core::Error::InvalidData(msg)) => return Self::bad_request(msg),
            Some(careu_core::Error::ConsentRequired(msg)) => return Self::forbidden(msg),
            _ => {}
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred".to_string(),
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
