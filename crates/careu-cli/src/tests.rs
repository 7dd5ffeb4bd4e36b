//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::{Duration, Utc};
use careu_core::insights::{Audience, Category};
use careu_core::models::{LogKind, MealType, NewLogEntry, NewNutritionEntry};
use careu_core::{Database, InsightEngine, NotificationStore, ProfileStore};

use crate::commands::{self, truncate, ProfileArgs};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn meal(calories: u32, protein: Option<f64>) -> NewLogEntry {
    NewLogEntry::Nutrition(NewNutritionEntry {
        logged_on: Utc::now().date_naive(),
        meal_type: MealType::Lunch,
        calories,
        protein_g: protein,
        carbs_g: None,
        fat_g: None,
        notes: Some("soup".to_string()),
    })
}

fn full_profile() -> ProfileArgs<'static> {
    ProfileArgs {
        age: Some(30),
        height: Some(175),
        weight: Some(70.0),
        sex: Some("male"),
        activity: Some("sedentary"),
    }
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer message", 10), "a longe...");
    assert_eq!(truncate("crème brûlée au four", 8), "crème...");
}

#[test]
fn test_parse_date() {
    let today = Utc::now().date_naive();
    assert_eq!(commands::parse_date(None).unwrap(), today);
    assert_eq!(
        commands::parse_date(Some("2026-03-01")).unwrap().to_string(),
        "2026-03-01"
    );
    assert!(commands::parse_date(Some("03/01/2026")).is_err());
}

#[test]
fn test_resolve_user_by_id_or_name() {
    let db = setup_test_db();
    let alice = db.create_user("alice").unwrap();

    assert_eq!(commands::resolve_user(&db, "alice").unwrap().id, alice.id);
    assert_eq!(
        commands::resolve_user(&db, &alice.id.to_string()).unwrap().username,
        "alice"
    );
    assert!(commands::resolve_user(&db, "nobody").is_err());
}

#[test]
fn test_load_engine_from_rules_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[patient]]
rule = "incomplete_profile"
suppress_hours = 24
"#
    )
    .unwrap();

    let engine = commands::load_engine(Some(file.path())).unwrap();
    assert_eq!(engine.config().patient.len(), 1);
    assert_eq!(engine.config().patient[0].suppress_for, Duration::hours(24));

    let missing = file.path().with_extension("missing.toml");
    assert!(commands::load_engine(Some(&missing)).is_err());
}

// ========== User / Profile Command Tests ==========

#[test]
fn test_cmd_users_add_provisions_profile() {
    let db = setup_test_db();
    let user = commands::cmd_users_add(&db, "alice").unwrap();

    let profile = db.get_profile(user.id).unwrap().unwrap();
    assert!(!profile.is_complete());
    assert!(!profile.data_sharing_consent);

    // Duplicate usernames are rejected
    assert!(commands::cmd_users_add(&db, "alice").is_err());
    commands::cmd_users_list(&db).unwrap();
}

#[test]
fn test_cmd_profile_set_partial_updates() {
    let db = setup_test_db();
    let user = db.create_user("bob").unwrap();

    let profile = commands::cmd_profile_set(
        &db,
        "bob",
        ProfileArgs {
            age: Some(40),
            height: None,
            weight: None,
            sex: None,
            activity: None,
        },
    )
    .unwrap();
    assert_eq!(profile.age, Some(40));
    assert_eq!(profile.missing_fields(), vec!["weight", "height", "sex"]);

    let profile = commands::cmd_profile_set(&db, "bob", full_profile()).unwrap();
    assert!(profile.is_complete());
    assert_eq!(profile.age, Some(30));

    commands::cmd_profile_show(&db, &user.id.to_string()).unwrap();
}

#[test]
fn test_cmd_profile_set_rejects_bad_values() {
    let db = setup_test_db();
    db.create_user("carol").unwrap();

    let bad_sex = ProfileArgs {
        sex: Some("unknown"),
        ..full_profile()
    };
    assert!(commands::cmd_profile_set(&db, "carol", bad_sex).is_err());

    let bad_age = ProfileArgs {
        age: Some(0),
        ..full_profile()
    };
    assert!(commands::cmd_profile_set(&db, "carol", bad_age).is_err());

    // Nothing was applied
    let user = commands::resolve_user(&db, "carol").unwrap();
    let profile = db.get_profile(user.id).unwrap().unwrap();
    assert_eq!(profile.age, None);
    assert_eq!(profile.sex, None);
}

#[test]
fn test_cmd_consent_grant_and_revoke() {
    let db = setup_test_db();
    db.create_user("dana").unwrap();

    let profile = commands::cmd_consent(&db, "dana", true).unwrap();
    assert!(profile.data_sharing_consent);
    assert!(profile.consent_timestamp.is_some());

    let profile = commands::cmd_consent(&db, "dana", false).unwrap();
    assert!(!profile.data_sharing_consent);

    let audit = db.list_audit_log(10).unwrap();
    assert!(audit.iter().any(|e| e.action == "consent_grant" && e.actor == "cli"));
    assert!(audit.iter().any(|e| e.action == "consent_revoke"));
}

// ========== Log Command Tests ==========

#[test]
fn test_cmd_log_list_daily_delete() {
    let db = setup_test_db();
    let user = db.create_user("erin").unwrap();

    let first = commands::cmd_log(&db, "erin", meal(450, Some(30.0))).unwrap();
    commands::cmd_log(&db, "erin", meal(600, None)).unwrap();
    assert_eq!(first.kind(), LogKind::Nutrition);

    commands::cmd_logs_list(&db, "erin", "nutrition", 20).unwrap();
    commands::cmd_logs_daily(&db, "erin", None).unwrap();

    let totals = db.daily_totals(user.id, Utc::now().date_naive()).unwrap();
    assert_eq!(totals.entries, 2);
    assert_eq!(totals.calories, 1050);

    commands::cmd_logs_delete(&db, "erin", "meals", first.id()).unwrap();
    let remaining = db.list_entries(user.id, LogKind::Nutrition, 10).unwrap();
    assert_eq!(remaining.len(), 1);

    // Already gone
    assert!(commands::cmd_logs_delete(&db, "erin", "nutrition", first.id()).is_err());
}

#[test]
fn test_cmd_logs_rejects_unknown_kind() {
    let db = setup_test_db();
    db.create_user("finn").unwrap();

    assert!(commands::cmd_logs_list(&db, "finn", "meds", 10).is_err());
    assert!(commands::cmd_logs_delete(&db, "finn", "meds", 1).is_err());
}

// ========== Insight Command Tests ==========

#[test]
fn test_cmd_metrics_reference_profile() {
    let db = setup_test_db();
    db.create_user("gail").unwrap();

    let targets = commands::cmd_metrics(&db, "gail").unwrap();
    assert!(targets.bmr.is_none());

    commands::cmd_profile_set(&db, "gail", full_profile()).unwrap();
    let targets = commands::cmd_metrics(&db, "gail").unwrap();
    assert!((targets.bmr.unwrap() - 1648.75).abs() < 1e-9);
    assert!(targets.tdee.unwrap() > targets.bmr.unwrap());
}

#[test]
fn test_cmd_reminders_incomplete_profile_then_suppressed() {
    let db = setup_test_db();
    let user = db.create_user("hal").unwrap();
    let engine = InsightEngine::new();

    let created = commands::cmd_reminders(&db, &engine, "hal").unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].category, Category::IncompleteProfile);
    assert_eq!(created[0].audience, Audience::Patient);

    let again = commands::cmd_reminders(&db, &engine, "hal").unwrap();
    assert!(again.is_empty());

    let active = db.list_active(user.id, Some(Audience::Patient)).unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn test_cmd_alerts_require_consent() {
    let db = setup_test_db();
    let user = db.create_user("iris").unwrap();
    commands::cmd_log(&db, "iris", meal(400, None)).unwrap();
    let engine = InsightEngine::new();

    assert!(commands::cmd_alerts(&db, &engine, "iris").unwrap().is_empty());
    assert!(db.list_active(user.id, None).unwrap().is_empty());

    commands::cmd_consent(&db, "iris", true).unwrap();
    let created = commands::cmd_alerts(&db, &engine, "iris").unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].category, Category::LowCalorieIntake);
    assert_eq!(created[0].audience, Audience::Provider);
    assert!(created[0].priority.is_none());
}

#[test]
fn test_cmd_dismiss_and_act_are_owner_scoped() {
    let db = setup_test_db();
    db.create_user("jo").unwrap();
    db.create_user("kim").unwrap();
    let engine = InsightEngine::new();

    let created = commands::cmd_reminders(&db, &engine, "jo").unwrap();
    let id = created[0].id;

    assert!(commands::cmd_dismiss(&db, &engine, "kim", id).is_err());
    assert!(commands::cmd_act(&db, &engine, "kim", id).is_err());

    let acted = commands::cmd_act(&db, &engine, "jo", id).unwrap();
    assert!(acted.acted_upon);
    assert!(acted.dismissed_at.is_some());

    let active = commands::cmd_notifications(&db, "jo", None, false, 20, false).unwrap();
    assert!(active.is_empty());
    let dismissed = commands::cmd_notifications(&db, "jo", Some("patient"), true, 20, true).unwrap();
    assert_eq!(dismissed.len(), 1);

    assert!(commands::cmd_notifications(&db, "jo", Some("nurse"), false, 20, false).is_err());
}

#[test]
fn test_cmd_share_requires_consent() {
    let db = setup_test_db();
    db.create_user("lee").unwrap();
    let provider = db.create_user("dr_moss").unwrap();
    commands::cmd_profile_set(&db, "lee", full_profile()).unwrap();
    commands::cmd_log(&db, "lee", meal(500, Some(25.0))).unwrap();
    let engine = InsightEngine::new();

    assert!(commands::cmd_share(&db, &engine, "lee", "dr_moss").is_err());
    assert!(db.list_active(provider.id, None).unwrap().is_empty());

    commands::cmd_consent(&db, "lee", true).unwrap();
    let shared = commands::cmd_share(&db, &engine, "lee", "dr_moss").unwrap();
    assert_eq!(shared.user_id, provider.id);
    assert_eq!(shared.category, Category::DataShared);

    let audit = db.list_audit_log(20).unwrap();
    assert!(audit.iter().any(|e| e.action == "share"));
}
