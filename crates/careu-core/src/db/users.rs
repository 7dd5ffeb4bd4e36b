//! User, profile and consent operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::insights::ProfileStore;
use crate::models::{Profile, ProfileUpdate, User};

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: parse_datetime(&created_at),
    })
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    let sex: Option<String> = row.get(4)?;
    let activity_level: Option<String> = row.get(5)?;
    Ok(Profile {
        user_id: row.get(0)?,
        age: row.get(1)?,
        height_cm: row.get(2)?,
        weight_kg: row.get(3)?,
        // Unrecognized values read back as unset
        sex: sex.and_then(|s| s.parse().ok()),
        activity_level: activity_level.and_then(|s| s.parse().ok()),
        data_sharing_consent: row.get(6)?,
        consent_timestamp: parse_optional_datetime(row.get(7)?),
    })
}

const PROFILE_COLUMNS: &str = "user_id, age, height_cm, weight_kg, sex, activity_level, \
                               data_sharing_consent, consent_timestamp";

impl Database {
    /// Create a user and provision their (empty) profile in one transaction
    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidData("Username cannot be empty".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::InvalidData(format!(
                "Username already exists: {}",
                username
            )));
        }

        tx.execute("INSERT INTO users (username) VALUES (?)", params![username])?;
        let user_id = tx.last_insert_rowid();
        tx.execute("INSERT INTO profiles (user_id) VALUES (?)", params![user_id])?;

        let user = tx.query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?",
            params![user_id],
            user_from_row,
        )?;
        tx.commit()?;

        tracing::info!(user_id, username, "User created");
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Like `get_user` but a missing user is `Error::NotFound`
    pub fn require_user(&self, id: i64) -> Result<User> {
        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?",
                params![username.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, username, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Apply a partial update to a user's profile and return the result
    pub fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile> {
        update.validate()?;

        let mut profile = self
            .get_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))?;
        update.apply(&mut profile);

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE profiles
            SET age = ?, height_cm = ?, weight_kg = ?, sex = ?, activity_level = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ?
            "#,
            params![
                profile.age,
                profile.height_cm,
                profile.weight_kg,
                profile.sex.map(|s| s.as_str()),
                profile.activity_level.map(|a| a.as_str()),
                user_id,
            ],
        )?;

        Ok(profile)
    }

    /// Grant or revoke data-sharing consent, recording when it changed
    pub fn set_consent(&self, user_id: i64, consent: bool, when: DateTime<Utc>) -> Result<Profile> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE profiles
            SET data_sharing_consent = ?, consent_timestamp = ?, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ?
            "#,
            params![consent, format_datetime(when), user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("profile for user {}", user_id)));
        }

        tracing::info!(user_id, consent, "Data sharing consent updated");
        self.get_profile(user_id)?
            .ok_or_else(|| Error::NotFound(format!("profile for user {}", user_id)))
    }
}

impl ProfileStore for Database {
    fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS),
                params![user_id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }
}
