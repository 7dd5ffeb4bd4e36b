//! Core types for the insight engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a verdict or notification
///
/// Ordered from least to most urgent so `max()` / sorting work directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational - no action needed
    Info,
    /// Worth a nudge
    Low,
    /// Should be addressed soon
    Moderate,
    /// Needs attention now
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Accepts both the canonical names and the older reminder/alert
    /// vocabularies (`medium`, `critical`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "high" | "critical" => Ok(Severity::High),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Display priority for patient-facing reminders
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Info | Severity::Low => Priority::Low,
            Severity::Moderate => Priority::Medium,
            Severity::High => Priority::High,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Who a notification is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// The patient's own reminders
    Patient,
    /// Alerts shown to a care provider
    Provider,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Patient => "patient",
            Audience::Provider => "provider",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" | "reminder" | "reminders" => Ok(Audience::Patient),
            "provider" | "alert" | "alerts" => Ok(Audience::Provider),
            _ => Err(format!("Unknown audience: {}", s)),
        }
    }
}

/// Notification category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Profile:Incomplete")]
    IncompleteProfile,
    #[serde(rename = "Nutrition:LowCalorieIntake")]
    LowCalorieIntake,
    #[serde(rename = "Nutrition:LowProteinIntake")]
    LowProteinIntake,
    #[serde(rename = "Nutrition:InconsistentLogging")]
    InconsistentLogging,
    #[serde(rename = "Activity:SharpDrop")]
    ActivityDrop,
    #[serde(rename = "Sleep:Insufficient")]
    InsufficientSleep,
    #[serde(rename = "Sharing:PatientDataShared")]
    DataShared,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::IncompleteProfile => "Profile:Incomplete",
            Category::LowCalorieIntake => "Nutrition:LowCalorieIntake",
            Category::LowProteinIntake => "Nutrition:LowProteinIntake",
            Category::InconsistentLogging => "Nutrition:InconsistentLogging",
            Category::ActivityDrop => "Activity:SharpDrop",
            Category::InsufficientSleep => "Sleep:Insufficient",
            Category::DataShared => "Sharing:PatientDataShared",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Profile:Incomplete" | "Incomplete Profile" | "IncompleteProfile" => {
                Ok(Category::IncompleteProfile)
            }
            "Nutrition:LowCalorieIntake"
            | "Nutrition:LowIntake"
            | "LowCalorieIntake"
            | "Low Calorie Intake" => Ok(Category::LowCalorieIntake),
            "Nutrition:LowProteinIntake" | "LowProteinIntake" | "Low Protein Intake" => {
                Ok(Category::LowProteinIntake)
            }
            "Nutrition:InconsistentLogging" | "InconsistentLogging" | "Inconsistent Logging" => {
                Ok(Category::InconsistentLogging)
            }
            "Activity:SharpDrop" | "ActivityDrop" => Ok(Category::ActivityDrop),
            "Sleep:Insufficient" | "InsufficientSleep" => Ok(Category::InsufficientSleep),
            "Sharing:PatientDataShared" | "Patient Data Shared" => Ok(Category::DataShared),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Result of evaluating one pattern rule against a history window
///
/// Ephemeral: verdicts are never stored, only the notifications built from
/// triggered ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleVerdict {
    pub triggered: bool,
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub explanation: Option<String>,
    pub actionable_steps: Vec<String>,
    /// Only carried through to provider-audience notifications
    pub provider_hint: Option<String>,
}

impl RuleVerdict {
    /// A verdict that did not fire (including "not enough data")
    pub fn quiet(category: Category) -> Self {
        Self {
            triggered: false,
            category,
            severity: Severity::Info,
            title: String::new(),
            message: String::new(),
            explanation: None,
            actionable_steps: Vec::new(),
            provider_hint: None,
        }
    }

    pub fn fired(
        category: Category,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            triggered: true,
            category,
            severity,
            title: title.into(),
            message: message.into(),
            explanation: None,
            actionable_steps: Vec::new(),
            provider_hint: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.actionable_steps = steps;
        self
    }

    pub fn with_provider_hint(mut self, hint: impl Into<String>) -> Self {
        self.provider_hint = Some(hint.into());
        self
    }
}

/// A persisted reminder (patient) or alert (provider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub audience: Audience,
    pub category: Category,
    pub severity: Severity,
    /// Set for the patient audience only
    pub priority: Option<Priority>,
    pub title: String,
    pub message: String,
    pub explanation: Option<String>,
    pub actionable_steps: Vec<String>,
    pub provider_hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub acted_upon: bool,
    pub acted_upon_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_active(&self) -> bool {
        self.dismissed_at.is_none()
    }
}

/// A notification about to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub audience: Audience,
    pub category: Category,
    pub severity: Severity,
    pub priority: Option<Priority>,
    pub title: String,
    pub message: String,
    pub explanation: Option<String>,
    pub actionable_steps: Vec<String>,
    pub provider_hint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Shape a triggered verdict for an audience
    ///
    /// Patient reminders get a priority and never a provider hint; provider
    /// alerts keep the hint and carry severity only.
    pub fn from_verdict(
        user_id: i64,
        audience: Audience,
        verdict: RuleVerdict,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (priority, provider_hint) = match audience {
            Audience::Patient => (Some(Priority::from_severity(verdict.severity)), None),
            Audience::Provider => (None, verdict.provider_hint),
        };
        Self {
            user_id,
            audience,
            category: verdict.category,
            severity: verdict.severity,
            priority,
            title: verdict.title,
            message: verdict.message,
            explanation: verdict.explanation,
            actionable_steps: verdict.actionable_steps,
            provider_hint,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Moderate);
        assert!(Severity::Moderate < Severity::High);
    }

    #[test]
    fn test_legacy_severity_vocabulary() {
        assert_eq!("medium".parse::<Severity>().unwrap(), Severity::Moderate);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!("INFO".parse::<Severity>().unwrap(), Severity::Info);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_priority_from_severity() {
        assert_eq!(Priority::from_severity(Severity::Info), Priority::Low);
        assert_eq!(Priority::from_severity(Severity::Low), Priority::Low);
        assert_eq!(Priority::from_severity(Severity::Moderate), Priority::Medium);
        assert_eq!(Priority::from_severity(Severity::High), Priority::High);
    }

    #[test]
    fn test_category_aliases() {
        for alias in ["LowCalorieIntake", "Nutrition:LowIntake", "Low Calorie Intake"] {
            assert_eq!(alias.parse::<Category>().unwrap(), Category::LowCalorieIntake);
        }
        assert_eq!(
            Category::InsufficientSleep.as_str().parse::<Category>().unwrap(),
            Category::InsufficientSleep
        );
    }

    #[test]
    fn test_category_serializes_as_tag() {
        let json = serde_json::to_string(&Category::ActivityDrop).unwrap();
        assert_eq!(json, "\"Activity:SharpDrop\"");
    }

    #[test]
    fn test_from_verdict_by_audience() {
        let verdict = RuleVerdict::fired(
            Category::LowCalorieIntake,
            Severity::High,
            "Low Calorie Intake Detected",
            "Average 900 kcal/day",
        )
        .with_provider_hint("Discuss nutrition sufficiency.");
        let now = Utc::now();

        let reminder = NewNotification::from_verdict(1, Audience::Patient, verdict.clone(), now);
        assert_eq!(reminder.priority, Some(Priority::High));
        assert_eq!(reminder.provider_hint, None);

        let alert = NewNotification::from_verdict(1, Audience::Provider, verdict, now);
        assert_eq!(alert.priority, None);
        assert_eq!(
            alert.provider_hint.as_deref(),
            Some("Discuss nutrition sufficiency.")
        );
    }
}
