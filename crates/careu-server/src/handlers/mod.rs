//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod logs;
pub mod notifications;
pub mod users;

// Re-export all handlers for use in router
pub use audit::*;
pub use logs::*;
pub use notifications::*;
pub use users::*;
