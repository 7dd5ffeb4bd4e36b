//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_engine, resolve_user)
//! - `insights` - Metrics, reminders, alerts, notifications and sharing
//! - `logs` - Health log commands (log, list, delete, daily totals)
//! - `serve` - Web server command
//! - `status` - Database and rule registry status
//! - `users` - User, profile and consent commands

pub mod core;
pub mod insights;
pub mod logs;
pub mod serve;
pub mod status;
pub mod users;

// Re-export command functions for main.rs
pub use core::*;
pub use insights::*;
pub use logs::*;
pub use serve::*;
pub use status::*;
pub use users::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
