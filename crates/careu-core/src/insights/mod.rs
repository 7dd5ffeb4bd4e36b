//! Health Insight Engine
//!
//! Reads a user's recent logs, derives personalized targets, runs a fixed,
//! ordered registry of pattern rules, and persists deduplicated
//! notifications: "reminders" for the patient and "alerts" for their
//! provider. Both are the same [`Notification`] type tagged with an
//! [`Audience`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use careu_core::{Database, insights::InsightEngine};
//!
//! let db = Database::in_memory()?;
//! let engine = InsightEngine::new();
//! let reminders = engine.run_patient_reminders(&db, user_id)?;
//! ```

pub mod config;
pub mod engine;
pub mod explain;
pub mod rules;
pub mod store;
pub mod types;

pub use config::{ConsentPolicy, EngineConfig, RuleSpec, Thresholds};
pub use engine::InsightEngine;
pub use rules::{HistoryWindow, Rule, RuleContext};
pub use store::{HealthStore, LogStore, NotificationStore, ProfileStore};
pub use types::{
    Audience, Category, NewNotification, Notification, Priority, RuleVerdict, Severity,
};
