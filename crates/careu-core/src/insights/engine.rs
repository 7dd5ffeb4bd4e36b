//! Insight Engine - evaluate rules for one user and emit notifications

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::config::{EngineConfig, RuleSpec};
use super::rules::{HistoryWindow, Rule, RuleContext};
use super::store::{HealthStore, LogStore, NotificationStore, ProfileStore};
use super::types::{Audience, Category, NewNotification, Notification, Severity};
use crate::error::{Error, Result};
use crate::metrics::Targets;
use crate::models::{LogEntry, LogKind, Profile};

/// Days of nutrition history summarized when sharing with a provider
const SHARE_SUMMARY_DAYS: i64 = 14;

/// Runs the rule registry for a user and persists what it finds
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    config: EngineConfig,
}

impl InsightEngine {
    /// Engine with the built-in registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Patient-facing reminders (dashboard load, "check now")
    pub fn run_patient_reminders<S: HealthStore + ?Sized>(
        &self,
        store: &S,
        user_id: i64,
    ) -> Result<Vec<Notification>> {
        self.evaluate_at(store, user_id, Audience::Patient, Utc::now())
    }

    /// Provider-facing alerts (provider view load, "run now")
    pub fn run_provider_alerts<S: HealthStore + ?Sized>(
        &self,
        store: &S,
        user_id: i64,
    ) -> Result<Vec<Notification>> {
        self.evaluate_at(store, user_id, Audience::Provider, Utc::now())
    }

    fn registry(&self, audience: Audience) -> &[RuleSpec] {
        match audience {
            Audience::Patient => &self.config.patient,
            Audience::Provider => &self.config.provider,
        }
    }

    /// Evaluate every enabled rule for `audience` as of `now`
    ///
    /// Returns only the notifications created by this call, in registry
    /// order. Categories still inside their suppression window produce
    /// nothing, so repeated calls are idempotent for the window's duration.
    pub fn evaluate_at<S: HealthStore + ?Sized>(
        &self,
        store: &S,
        user_id: i64,
        audience: Audience,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let Some(profile) = self.resolve_profile(store, user_id, audience)? else {
            return Ok(Vec::new());
        };

        let thresholds = &self.config.thresholds;
        let today = now.date_naive();
        let history = load_history(store, user_id, today, HistoryWindow::span_days(thresholds))?;
        let targets = Targets::for_profile(&profile);
        let ctx = RuleContext {
            profile: &profile,
            targets: &targets,
            history: &history,
            today,
            thresholds,
        };

        let mut created = Vec::new();
        let mut suppressed = 0usize;

        for spec in self.registry(audience).iter().filter(|s| s.enabled) {
            let verdict = spec.rule.evaluate(&ctx);
            debug!(
                user_id,
                audience = audience.as_str(),
                rule = spec.rule.as_str(),
                triggered = verdict.triggered,
                "Rule evaluated"
            );
            if !verdict.triggered {
                continue;
            }

            // Profile completeness gates the rest of a reminder run, whether
            // or not its own notification was suppressed
            let exclusive = audience == Audience::Patient && spec.rule == Rule::IncompleteProfile;

            let new = NewNotification::from_verdict(user_id, audience, verdict, now);
            match store.create_unless_recent(&new, now - spec.suppress_for)? {
                Some(notification) => {
                    info!(
                        user_id,
                        audience = audience.as_str(),
                        category = notification.category.as_str(),
                        severity = notification.severity.as_str(),
                        id = notification.id,
                        "Notification created"
                    );
                    created.push(notification);
                }
                None => {
                    suppressed += 1;
                    debug!(
                        user_id,
                        audience = audience.as_str(),
                        category = new.category.as_str(),
                        "Suppressed: recent duplicate"
                    );
                }
            }

            if exclusive {
                break;
            }
        }

        info!(
            user_id,
            audience = audience.as_str(),
            count = created.len(),
            suppressed,
            "Insight run complete"
        );
        Ok(created)
    }

    /// Apply the per-audience profile policy; `None` means "do not run"
    fn resolve_profile<S: ProfileStore + ?Sized>(
        &self,
        store: &S,
        user_id: i64,
        audience: Audience,
    ) -> Result<Option<Profile>> {
        let profile = store.get_profile(user_id)?;

        match (audience, profile) {
            (Audience::Patient, Some(profile)) => Ok(Some(profile)),
            (Audience::Provider, Some(profile)) => {
                if profile.data_sharing_consent {
                    Ok(Some(profile))
                } else {
                    info!(user_id, "Provider alerts skipped: no data sharing consent");
                    Ok(None)
                }
            }
            (Audience::Patient, None) => {
                // Treated as an empty profile so the completeness reminder fires
                debug!(user_id, "No profile row; evaluating as empty profile");
                Ok(Some(Profile::empty(user_id)))
            }
            (Audience::Provider, None) => {
                if self.config.consent.fail_open_on_missing_profile {
                    warn!(
                        user_id,
                        "No profile row; consent gate failing open (consent.fail_open_on_missing_profile)"
                    );
                    Ok(Some(Profile::empty(user_id)))
                } else {
                    info!(user_id, "Provider alerts skipped: no profile row");
                    Ok(None)
                }
            }
        }
    }

    /// Dismiss a notification owned by `user_id`
    pub fn dismiss<S: NotificationStore + ?Sized>(
        &self,
        store: &S,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification> {
        let notification = store.mark_dismissed(notification_id, user_id, Utc::now())?;
        debug!(user_id, id = notification_id, "Notification dismissed");
        Ok(notification)
    }

    /// Mark a notification as acted upon (which also dismisses it)
    pub fn act_upon<S: NotificationStore + ?Sized>(
        &self,
        store: &S,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Notification> {
        let notification = store.mark_acted_upon(notification_id, user_id, Utc::now())?;
        debug!(user_id, id = notification_id, "Notification acted upon");
        Ok(notification)
    }

    /// Send a provider a summary of the patient's recent nutrition
    ///
    /// Requires the patient's data-sharing consent. Always creates a new
    /// notification: this is an explicit user action, not a rule.
    pub fn share_with_provider<S: HealthStore + ?Sized>(
        &self,
        store: &S,
        patient_id: i64,
        provider_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let patient = store
            .get_profile(patient_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", patient_id)))?;
        if store.get_profile(provider_id)?.is_none() {
            return Err(Error::NotFound(format!("provider user {}", provider_id)));
        }
        if !patient.data_sharing_consent {
            return Err(Error::ConsentRequired(format!(
                "user {} has not consented to data sharing",
                patient_id
            )));
        }

        let today = now.date_naive();
        let entries = store.query_entries(
            patient_id,
            LogKind::Nutrition,
            today - Duration::days(SHARE_SUMMARY_DAYS - 1),
            today,
        )?;
        let summary = summarize_nutrition(&entries);

        let message = match summary {
            Some((calories, protein)) => {
                let protein = protein
                    .map(|p| format!("{:.1} g protein/day", p))
                    .unwrap_or_else(|| "protein not recorded".to_string());
                format!(
                    "Patient {} shared their {}-day summary: {:.0} kcal/day average, {}.",
                    patient_id, SHARE_SUMMARY_DAYS, calories, protein
                )
            }
            None => format!(
                "Patient {} shared their data. No recent nutrition data available.",
                patient_id
            ),
        };

        let new = NewNotification {
            user_id: provider_id,
            audience: Audience::Provider,
            category: Category::DataShared,
            severity: Severity::Low,
            priority: None,
            title: "Patient Data Shared".to_string(),
            message,
            explanation: Some(format!(
                "{} nutrition entries from the last {} days were included.",
                entries.len(),
                SHARE_SUMMARY_DAYS
            )),
            actionable_steps: vec!["Review the patient's recent logs".to_string()],
            provider_hint: None,
            created_at: now,
        };

        let notification = store.create_notification(&new)?;
        info!(patient_id, provider_id, id = notification.id, "Patient data shared with provider");
        Ok(notification)
    }
}

fn load_history<S: LogStore + ?Sized>(
    store: &S,
    user_id: i64,
    today: NaiveDate,
    span_days: i64,
) -> Result<HistoryWindow> {
    let since = today - Duration::days(span_days - 1);
    let mut entries = Vec::new();
    for kind in [LogKind::Nutrition, LogKind::Activity, LogKind::Sleep] {
        entries.extend(store.query_entries(user_id, kind, since, today)?);
    }
    Ok(HistoryWindow::from_entries(entries))
}

/// Mean calories per entry and mean protein over entries that recorded it
fn summarize_nutrition(entries: &[LogEntry]) -> Option<(f64, Option<f64>)> {
    let meals: Vec<_> = entries
        .iter()
        .filter_map(|e| match e {
            LogEntry::Nutrition(n) => Some(n),
            _ => None,
        })
        .collect();
    if meals.is_empty() {
        return None;
    }

    let calories = meals.iter().map(|m| m.calories as f64).sum::<f64>() / meals.len() as f64;
    let protein: Vec<f64> = meals.iter().filter_map(|m| m.protein_g).collect();
    let protein = if protein.is_empty() {
        None
    } else {
        Some(protein.iter().sum::<f64>() / protein.len() as f64)
    };
    Some((calories, protein))
}
