//! Background scheduler for periodic insight passes
//!
//! Enabled via environment variable:
//!
//! - `CAREU_REMINDER_SCHEDULE`: Interval in hours between passes (e.g., "6")
//!
//! Each pass runs patient reminders and provider alerts for every user.
//! Suppression windows make a pass a no-op for anything already notified,
//! so a pass racing a manual "run now" cannot double-notify.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use careu_core::insights::Audience;
use careu_core::{Database, InsightEngine};

/// Environment variable holding the pass interval in hours
pub const SCHEDULE_ENV: &str = "CAREU_REMINDER_SCHEDULE";

/// Configuration for scheduled passes
#[derive(Debug, Clone)]
pub struct ReminderScheduleConfig {
    /// Interval between passes in hours
    pub interval_hours: u64,
}

impl ReminderScheduleConfig {
    /// Parse configuration from the environment
    ///
    /// Returns None if scheduling is not configured or set to 0
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(SCHEDULE_ENV).ok()?;
        Self::parse(&value)
    }

    fn parse(value: &str) -> Option<Self> {
        let interval_hours: u64 = match value.trim().parse() {
            Ok(hours) => hours,
            Err(_) => {
                warn!(value, "{} is not a number of hours, scheduler disabled", SCHEDULE_ENV);
                return None;
            }
        };

        if interval_hours == 0 {
            warn!("{} is 0, scheduled reminders disabled", SCHEDULE_ENV);
            return None;
        }

        Some(Self { interval_hours })
    }
}

/// Outcome of one scheduled pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub users: usize,
    pub created: usize,
    pub failures: usize,
}

/// Start the reminder scheduler as a background task
pub fn start_reminder_scheduler(db: Database, engine: InsightEngine, config: ReminderScheduleConfig) {
    info!(
        "Starting reminder scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_hours * 3600));

        // Skip the immediate first tick; page loads cover startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            info!("Running scheduled insight pass...");
            match run_scheduled_pass(&db, &engine) {
                Ok(summary) => info!(
                    users = summary.users,
                    created = summary.created,
                    failures = summary.failures,
                    "Scheduled insight pass completed"
                ),
                Err(e) => error!("Scheduled insight pass failed: {}", e),
            }
        }
    });
}

/// Run the patient and provider passes for every user
///
/// A failure for one user is logged and skipped; only failing to list users
/// aborts the pass.
pub fn run_scheduled_pass(
    db: &Database,
    engine: &InsightEngine,
) -> careu_core::Result<PassSummary> {
    let users = db.list_users()?;
    let mut summary = PassSummary {
        users: users.len(),
        ..Default::default()
    };
    let now = Utc::now();

    for user in &users {
        for audience in [Audience::Patient, Audience::Provider] {
            match engine.evaluate_at(db, user.id, audience, now) {
                Ok(created) => summary.created += created.len(),
                Err(e) => {
                    summary.failures += 1;
                    warn!(
                        user_id = user.id,
                        audience = audience.as_str(),
                        error = %e,
                        "Scheduled pass failed for user"
                    );
                }
            }
        }
    }

    if let Err(e) = db.log_audit(
        "scheduler",
        "insight_pass",
        Some("notification"),
        None,
        Some(&format!(
            "users={}, created={}, failures={}",
            summary.users, summary.created, summary.failures
        )),
    ) {
        warn!("Failed to log scheduled pass to audit: {}", e);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use careu_core::models::{MealType, NewLogEntry, NewNutritionEntry};

    #[test]
    fn test_parse_interval() {
        assert_eq!(ReminderScheduleConfig::parse("6").unwrap().interval_hours, 6);
        assert_eq!(ReminderScheduleConfig::parse(" 24 ").unwrap().interval_hours, 24);
        assert!(ReminderScheduleConfig::parse("0").is_none());
        assert!(ReminderScheduleConfig::parse("daily").is_none());
    }

    #[test]
    fn test_scheduled_pass_covers_all_users() {
        let db = Database::in_memory().unwrap();
        db.create_user("alice").unwrap();
        let bob = db.create_user("bob").unwrap();
        db.set_consent(bob.id, true, Utc::now()).unwrap();
        db.add_entry(
            bob.id,
            &NewLogEntry::Nutrition(NewNutritionEntry {
                logged_on: Utc::now().date_naive(),
                meal_type: MealType::Lunch,
                calories: 400,
                protein_g: None,
                carbs_g: None,
                fat_g: None,
                notes: None,
            }),
        )
        .unwrap();

        let engine = InsightEngine::new();
        let summary = run_scheduled_pass(&db, &engine).unwrap();
        assert_eq!(summary.users, 2);
        assert_eq!(summary.failures, 0);
        // alice: profile reminder; bob: profile reminder + low calorie alert
        assert_eq!(summary.created, 3);

        // Second pass is suppressed
        let again = run_scheduled_pass(&db, &engine).unwrap();
        assert_eq!(again.created, 0);

        let audit = db.list_audit_log(10).unwrap();
        assert!(audit.iter().any(|e| e.actor == "scheduler"));
    }
}
