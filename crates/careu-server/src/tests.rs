//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use careu_core::models::{MealType, NewLogEntry, NewNutritionEntry};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn open_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        ..Default::default()
    }
}

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = create_router(db.clone(), open_config());
    (app, db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn put_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn log_meals(db: &Database, user_id: i64, calories: u32, days: i64) {
    let today = Utc::now().date_naive();
    for d in 0..days {
        db.add_entry(
            user_id,
            &NewLogEntry::Nutrition(NewNutritionEntry {
                logged_on: today - chrono::Duration::days(d),
                meal_type: MealType::Dinner,
                calories,
                protein_g: None,
                carbs_g: None,
                fat_g: None,
                notes: None,
            }),
        )
        .unwrap();
    }
}

// ========== Auth Tests ==========

#[tokio::test]
async fn test_auth_required_by_default() {
    let db = Database::in_memory().unwrap();
    let app = create_router(
        db,
        ServerConfig {
            api_keys: vec!["secret-key".to_string()],
            ..Default::default()
        },
    );

    let response = app.clone().oneshot(get("/api/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/users")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_parse_api_keys() {
    assert_eq!(parse_api_keys("a, b,,c "), vec!["a", "b", "c"]);
    assert!(parse_api_keys("").is_empty());
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc123".to_string(), "longer-key".to_string()];
    assert!(validate_api_key("abc123", &keys));
    assert!(validate_api_key("longer-key", &keys));
    assert!(!validate_api_key("abc124", &keys));
    assert!(!validate_api_key("abc", &keys));
    assert!(!validate_api_key("abc123", &[]));
}

#[tokio::test]
async fn test_security_headers() {
    let (app, _db) = setup_test_app();
    let response = app.oneshot(get("/api/users")).await.unwrap();

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["cache-control"], "no-store");
}

// ========== User / Profile Tests ==========

#[tokio::test]
async fn test_create_and_get_user() {
    let (app, _db) = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/users", serde_json::json!({"username": "alice"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["username"], "alice");
    let id = json["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user"]["username"], "alice");
    assert_eq!(json["profile"]["data_sharing_consent"], false);

    // Duplicate username is a client error
    let response = app
        .oneshot(post_json("/api/users", serde_json::json!({"username": "alice"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_missing_user_is_404() {
    let (app, _db) = setup_test_app();
    let response = app.oneshot(get("/api/users/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_profile_and_metrics() {
    let (app, db) = setup_test_app();
    let user = db.create_user("bob").unwrap();

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/profile", user.id),
            serde_json::json!({
                "age": 30,
                "height_cm": 175,
                "weight_kg": 70.0,
                "sex": "male",
                "activity_level": "sedentary"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["age"], 30);

    let response = app
        .oneshot(get(&format!("/api/users/{}/metrics", user.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["profile_complete"], true);
    assert_eq!(json["targets"]["bmr"], 1648.75);
    let tdee = json["targets"]["tdee"].as_f64().unwrap();
    assert!((tdee - 1978.5).abs() < 1e-9);
    let protein = json["targets"]["protein_g"].as_f64().unwrap();
    assert!((protein - 56.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_update_profile_rejects_invalid_age() {
    let (app, db) = setup_test_app();
    let user = db.create_user("carol").unwrap();

    let response = app
        .oneshot(put_json(
            &format!("/api/users/{}/profile", user.id),
            serde_json::json!({"age": 500}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Log Tests ==========

#[tokio::test]
async fn test_create_list_delete_log() {
    let (app, db) = setup_test_app();
    let user = db.create_user("dave").unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/logs", user.id),
            serde_json::json!({
                "kind": "sleep",
                "date": "2026-03-14",
                "duration_minutes": 420,
                "quality": 4
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["kind"], "sleep");
    let id = json["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}/logs?kind=sleep", user.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/{}/logs/sleep/{}", user.id, id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second delete finds nothing
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/users/{}/logs/sleep/{}", user.id, id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_log_rejected() {
    let (app, db) = setup_test_app();
    let user = db.create_user("erin").unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/logs", user.id),
            serde_json::json!({
                "kind": "sleep",
                "date": "2026-03-14",
                "duration_minutes": 420,
                "quality": 9
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get(&format!("/api/users/{}/logs?kind=mood", user.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_daily_totals() {
    let (app, db) = setup_test_app();
    let user = db.create_user("frank").unwrap();
    log_meals(&db, user.id, 600, 1);
    log_meals(&db, user.id, 400, 1);

    let today = Utc::now().date_naive();
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/users/{}/nutrition/daily?date={}",
            user.id, today
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["calories"], 1000);
    assert_eq!(json["entries"], 2);

    let response = app
        .oneshot(get(&format!(
            "/api/users/{}/nutrition/daily?date=yesterday",
            user.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Reminder / Alert Tests ==========

#[tokio::test]
async fn test_reminders_load_runs_engine_once() {
    let (app, db) = setup_test_app();
    let user = db.create_user("gina").unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/users/{}/reminders", user.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let reminders = json.as_array().unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0]["category"], "Profile:Incomplete");
    assert_eq!(reminders[0]["priority"], "medium");

    // Explicit run inside the suppression window creates nothing
    let response = app
        .oneshot(post_json(
            &format!("/api/users/{}/reminders/run", user.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_reminders_for_missing_user_is_404() {
    let (app, _db) = setup_test_app();
    let response = app
        .oneshot(post_json("/api/users/42/reminders/run", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alerts_require_consent() {
    let (app, db) = setup_test_app();
    let user = db.create_user("hank").unwrap();
    log_meals(&db, user.id, 500, 7);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/alerts/run", user.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["count"], 0);

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/users/{}/consent", user.id),
            serde_json::json!({"consent": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/users/{}/alerts", user.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let alerts = json.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["category"], "Nutrition:LowCalorieIntake");
    assert_eq!(alerts[0]["severity"], "moderate");
    assert!(alerts[0]["priority"].is_null());
    assert!(alerts[0]["provider_hint"].is_string());
}

#[tokio::test]
async fn test_dismiss_and_act_are_owner_scoped() {
    let (app, db) = setup_test_app();
    let owner = db.create_user("ivy").unwrap();
    let other = db.create_user("jack").unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/reminders/run", owner.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let id = json["created"][0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/notifications/{}/dismiss", other.id, id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/users/{}/notifications/{}/act", owner.id, id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["acted_upon"], true);
    assert!(json["dismissed_at"].is_string());

    let response = app
        .oneshot(get(&format!(
            "/api/users/{}/notifications?dismissed=true",
            owner.id
        )))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_notifications_rejects_unknown_audience() {
    let (app, db) = setup_test_app();
    let user = db.create_user("kim").unwrap();
    let response = app
        .oneshot(get(&format!(
            "/api/users/{}/notifications?audience=everyone",
            user.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Sharing Tests ==========

#[tokio::test]
async fn test_share_requires_consent() {
    let (app, db) = setup_test_app();
    let patient = db.create_user("lee").unwrap();
    let provider = db.create_user("dr_moss").unwrap();
    log_meals(&db, patient.id, 1500, 3);

    let share = || {
        post_json(
            &format!("/api/users/{}/share", patient.id),
            serde_json::json!({"provider_id": provider.id}),
        )
    };

    let response = app.clone().oneshot(share()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    db.set_consent(patient.id, true, Utc::now()).unwrap();
    let response = app.oneshot(share()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["user_id"], provider.id);
    assert_eq!(json["category"], "Sharing:PatientDataShared");
    assert!(json["message"].as_str().unwrap().contains("1500 kcal/day"));
}

// ========== Audit Tests ==========

#[tokio::test]
async fn test_requests_are_audited() {
    let (app, db) = setup_test_app();
    let user = db.create_user("nora").unwrap();

    app.clone()
        .oneshot(get(&format!("/api/users/{}/profile", user.id)))
        .await
        .unwrap();

    let response = app.oneshot(get("/api/audit?limit=10")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let entries = json.as_array().unwrap();
    assert!(entries
        .iter()
        .any(|e| e["action"] == "view" && e["entity_type"] == "profile"));
    assert!(entries.iter().all(|e| e["actor"] == "local-dev"));
}
