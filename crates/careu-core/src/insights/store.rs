//! Insight Store Gateway - the persistence boundary the engine talks to
//!
//! `Database` implements all of these; tests can substitute their own.

use chrono::{DateTime, NaiveDate, Utc};

use super::types::{Audience, Category, NewNotification, Notification};
use crate::error::Result;
use crate::models::{LogEntry, LogKind, Profile};

/// Read access to user profiles
pub trait ProfileStore {
    /// `None` when the user has no profile row
    fn get_profile(&self, user_id: i64) -> Result<Option<Profile>>;
}

/// Read access to logged health entries
pub trait LogStore {
    /// Entries of one kind whose day falls in `[since, until]`, newest first
    fn query_entries(
        &self,
        user_id: i64,
        kind: LogKind,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<LogEntry>>;
}

/// Notification persistence
pub trait NotificationStore {
    fn create_notification(&self, new: &NewNotification) -> Result<Notification>;

    /// Whether a notification with this (user, audience, category) was
    /// created at or after `since`
    fn find_recent_notification(
        &self,
        user_id: i64,
        audience: Audience,
        category: Category,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    /// Recent-duplicate check and insert as one atomic unit
    ///
    /// Returns `None` when a duplicate inside the window already exists.
    fn create_unless_recent(
        &self,
        new: &NewNotification,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>>;

    /// Owner-scoped; `Error::NotFound` for unknown or foreign ids
    fn mark_dismissed(&self, id: i64, user_id: i64, when: DateTime<Utc>) -> Result<Notification>;

    /// Owner-scoped; also dismisses
    fn mark_acted_upon(&self, id: i64, user_id: i64, when: DateTime<Utc>)
        -> Result<Notification>;

    fn list_active(&self, user_id: i64, audience: Option<Audience>) -> Result<Vec<Notification>>;

    fn list_dismissed(
        &self,
        user_id: i64,
        audience: Option<Audience>,
        limit: usize,
    ) -> Result<Vec<Notification>>;
}

/// Everything the engine needs from storage
pub trait HealthStore: ProfileStore + LogStore + NotificationStore {}

impl<T: ProfileStore + LogStore + NotificationStore> HealthStore for T {}
