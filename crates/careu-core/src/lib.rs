//! CareU Core Library
//!
//! Shared functionality for the CareU health tracker:
//! - Database access and migrations (SQLCipher-encrypted SQLite)
//! - Health log and profile models
//! - Metric calculator (BMR, TDEE, protein target, BMI)
//! - Insight engine: pattern rules, suppression, patient reminders and
//!   provider alerts

pub mod db;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod models;

pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use insights::{
    Audience, Category, EngineConfig, HealthStore, InsightEngine, LogStore, Notification,
    NotificationStore, Priority, ProfileStore, Severity,
};
pub use metrics::Targets;
