//! Notification persistence (patient reminders and provider alerts)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{format_datetime, parse_datetime, parse_enum, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::insights::{Audience, Category, NewNotification, Notification, NotificationStore};

const COLUMNS: &str = "id, user_id, audience, category, severity, priority, title, message, \
                       explanation, actionable_steps, provider_hint, created_at, dismissed_at, \
                       acted_upon, acted_upon_at";

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    let audience: String = row.get(2)?;
    let category: String = row.get(3)?;
    let severity: String = row.get(4)?;
    let priority: Option<String> = row.get(5)?;
    let steps_json: String = row.get(9)?;
    let created_at: String = row.get(11)?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        audience: parse_enum(2, &audience)?,
        category: parse_enum::<Category>(3, &category)?,
        severity: parse_enum(4, &severity)?,
        priority: priority.as_deref().map(|p| parse_enum(5, p)).transpose()?,
        title: row.get(6)?,
        message: row.get(7)?,
        explanation: row.get(8)?,
        actionable_steps: serde_json::from_str(&steps_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?,
        provider_hint: row.get(10)?,
        created_at: parse_datetime(&created_at),
        dismissed_at: parse_optional_datetime(row.get(12)?),
        acted_upon: row.get(13)?,
        acted_upon_at: parse_optional_datetime(row.get(14)?),
    })
}

fn recent_exists(
    conn: &Connection,
    user_id: i64,
    audience: Audience,
    category: Category,
    since: DateTime<Utc>,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            r#"
            SELECT id FROM notifications
            WHERE user_id = ? AND audience = ? AND category = ? AND created_at >= ?
            LIMIT 1
            "#,
            params![
                user_id,
                audience.as_str(),
                category.as_str(),
                format_datetime(since)
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert(conn: &Connection, new: &NewNotification) -> Result<Notification> {
    let steps_json = serde_json::to_string(&new.actionable_steps)?;
    conn.execute(
        r#"
        INSERT INTO notifications
            (user_id, audience, category, severity, priority, title, message,
             explanation, actionable_steps, provider_hint, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            new.user_id,
            new.audience.as_str(),
            new.category.as_str(),
            new.severity.as_str(),
            new.priority.map(|p| p.as_str()),
            new.title,
            new.message,
            new.explanation,
            steps_json,
            new.provider_hint,
            format_datetime(new.created_at),
        ],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("SELECT {} FROM notifications WHERE id = ?", COLUMNS),
        params![id],
        notification_from_row,
    )?)
}

impl Database {
    pub fn get_notification(&self, id: i64) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let notification = conn
            .query_row(
                &format!("SELECT {} FROM notifications WHERE id = ?", COLUMNS),
                params![id],
                notification_from_row,
            )
            .optional()?;
        Ok(notification)
    }

    /// Fetch a notification only if `user_id` owns it
    fn owned_notification(&self, id: i64, user_id: i64) -> Result<Notification> {
        self.get_notification(id)?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| Error::NotFound(format!("notification {}", id)))
    }

    fn list_notifications(
        &self,
        user_id: i64,
        audience: Option<Audience>,
        dismissed: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let (state, order) = if dismissed {
            ("dismissed_at IS NOT NULL", "dismissed_at DESC, id DESC")
        } else {
            ("dismissed_at IS NULL", "created_at DESC, id DESC")
        };
        let mut sql = format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 AND (?2 IS NULL OR audience = ?2) AND {} ORDER BY {}",
            COLUMNS, state, order
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(
                params![user_id, audience.map(|a| a.as_str())],
                notification_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }
}

impl NotificationStore for Database {
    fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
        let conn = self.conn()?;
        insert(&conn, new)
    }

    fn find_recent_notification(
        &self,
        user_id: i64,
        audience: Audience,
        category: Category,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        recent_exists(&conn, user_id, audience, category, since)
    }

    fn create_unless_recent(
        &self,
        new: &NewNotification,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front, so a concurrent run waits
        // here instead of passing the same duplicate check
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if recent_exists(&tx, new.user_id, new.audience, new.category, since)? {
            return Ok(None);
        }
        let notification = insert(&tx, new)?;
        tx.commit()?;

        Ok(Some(notification))
    }

    fn mark_dismissed(&self, id: i64, user_id: i64, when: DateTime<Utc>) -> Result<Notification> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE notifications
            SET dismissed_at = COALESCE(dismissed_at, ?)
            WHERE id = ? AND user_id = ?
            "#,
            params![format_datetime(when), id, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("notification {}", id)));
        }
        self.owned_notification(id, user_id)
    }

    fn mark_acted_upon(&self, id: i64, user_id: i64, when: DateTime<Utc>) -> Result<Notification> {
        let conn = self.conn()?;
        let when = format_datetime(when);
        let updated = conn.execute(
            r#"
            UPDATE notifications
            SET acted_upon = 1,
                acted_upon_at = COALESCE(acted_upon_at, ?1),
                dismissed_at = COALESCE(dismissed_at, ?1)
            WHERE id = ?2 AND user_id = ?3
            "#,
            params![when, id, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("notification {}", id)));
        }
        self.owned_notification(id, user_id)
    }

    fn list_active(&self, user_id: i64, audience: Option<Audience>) -> Result<Vec<Notification>> {
        self.list_notifications(user_id, audience, false, None)
    }

    fn list_dismissed(
        &self,
        user_id: i64,
        audience: Option<Audience>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        self.list_notifications(user_id, audience, true, Some(limit))
    }
}
