//! Health log operations (nutrition, activity, sleep, vitals)

use chrono::NaiveDate;
use rusqlite::{params, Row, ToSql};

use super::{format_datetime, parse_date, parse_datetime, parse_enum, Database};
use crate::error::{Error, Result};
use crate::insights::LogStore;
use crate::models::{
    ActivityEntry, DailyTotals, LogEntry, LogKind, NewLogEntry, NutritionEntry, SleepEntry,
    VitalsEntry,
};

/// Column list for each kind, in the order `entry_from_row` expects
fn columns(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Nutrition => {
            "id, user_id, logged_on, meal_type, calories, protein_g, carbs_g, fat_g, notes, created_at"
        }
        LogKind::Activity => "id, user_id, date, steps, active_minutes, distance_km, created_at",
        LogKind::Sleep => "id, user_id, date, duration_minutes, quality, created_at",
        LogKind::Vitals => {
            "id, user_id, recorded_at, resting_hr, systolic, diastolic, temperature_c, created_at"
        }
    }
}

/// SQL expression for the calendar day an entry belongs to
fn day_expr(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Nutrition => "logged_on",
        LogKind::Activity | LogKind::Sleep => "date",
        LogKind::Vitals => "date(recorded_at)",
    }
}

fn entry_from_row(kind: LogKind, row: &Row) -> rusqlite::Result<LogEntry> {
    Ok(match kind {
        LogKind::Nutrition => {
            let logged_on: String = row.get(2)?;
            let meal_type: String = row.get(3)?;
            let created_at: String = row.get(9)?;
            LogEntry::Nutrition(NutritionEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                logged_on: parse_date(2, &logged_on)?,
                meal_type: parse_enum(3, &meal_type)?,
                calories: row.get(4)?,
                protein_g: row.get(5)?,
                carbs_g: row.get(6)?,
                fat_g: row.get(7)?,
                notes: row.get(8)?,
                created_at: parse_datetime(&created_at),
            })
        }
        LogKind::Activity => {
            let date: String = row.get(2)?;
            let created_at: String = row.get(6)?;
            LogEntry::Activity(ActivityEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                date: parse_date(2, &date)?,
                steps: row.get(3)?,
                active_minutes: row.get(4)?,
                distance_km: row.get(5)?,
                created_at: parse_datetime(&created_at),
            })
        }
        LogKind::Sleep => {
            let date: String = row.get(2)?;
            let created_at: String = row.get(5)?;
            LogEntry::Sleep(SleepEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                date: parse_date(2, &date)?,
                duration_minutes: row.get(3)?,
                quality: row.get(4)?,
                created_at: parse_datetime(&created_at),
            })
        }
        LogKind::Vitals => {
            let recorded_at: String = row.get(2)?;
            let created_at: String = row.get(7)?;
            LogEntry::Vitals(VitalsEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                recorded_at: parse_datetime(&recorded_at),
                resting_hr: row.get(3)?,
                systolic: row.get(4)?,
                diastolic: row.get(5)?,
                temperature_c: row.get(6)?,
                created_at: parse_datetime(&created_at),
            })
        }
    })
}

impl Database {
    /// Validate and store a new log entry for `user_id`
    pub fn add_entry(&self, user_id: i64, entry: &NewLogEntry) -> Result<LogEntry> {
        entry.validate()?;
        self.require_user(user_id)?;

        let conn = self.conn()?;
        match entry {
            NewLogEntry::Nutrition(e) => conn.execute(
                r#"
                INSERT INTO nutrition_entries
                    (user_id, logged_on, meal_type, calories, protein_g, carbs_g, fat_g, notes)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    e.logged_on.to_string(),
                    e.meal_type.as_str(),
                    e.calories,
                    e.protein_g,
                    e.carbs_g,
                    e.fat_g,
                    e.notes,
                ],
            )?,
            NewLogEntry::Activity(e) => conn.execute(
                r#"
                INSERT INTO activity_entries (user_id, date, steps, active_minutes, distance_km)
                VALUES (?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    e.date.to_string(),
                    e.steps,
                    e.active_minutes,
                    e.distance_km
                ],
            )?,
            NewLogEntry::Sleep(e) => conn.execute(
                "INSERT INTO sleep_entries (user_id, date, duration_minutes, quality) VALUES (?, ?, ?, ?)",
                params![user_id, e.date.to_string(), e.duration_minutes, e.quality],
            )?,
            NewLogEntry::Vitals(e) => conn.execute(
                r#"
                INSERT INTO vitals_entries
                    (user_id, recorded_at, resting_hr, systolic, diastolic, temperature_c)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![
                    user_id,
                    format_datetime(e.recorded_at),
                    e.resting_hr,
                    e.systolic,
                    e.diastolic,
                    e.temperature_c,
                ],
            )?,
        };

        let id = conn.last_insert_rowid();
        let kind = entry.kind();
        let stored = conn.query_row(
            &format!("SELECT {} FROM {} WHERE id = ?", columns(kind), kind.table()),
            params![id],
            |row| entry_from_row(kind, row),
        )?;

        tracing::debug!(user_id, kind = kind.as_str(), id, "Log entry added");
        Ok(stored)
    }

    /// Most recent entries of one kind, newest first
    pub fn list_entries(&self, user_id: i64, kind: LogKind, limit: i64) -> Result<Vec<LogEntry>> {
        self.select_entries(kind, "user_id = ?", &[&user_id], Some(limit))
    }

    /// Delete an entry owned by `user_id`
    pub fn delete_entry(&self, user_id: i64, kind: LogKind, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ? AND user_id = ?", kind.table()),
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("{} entry {}", kind, id)));
        }
        Ok(())
    }

    /// Nutrition totals for one day
    pub fn daily_totals(&self, user_id: i64, date: NaiveDate) -> Result<DailyTotals> {
        let conn = self.conn()?;
        let totals = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(calories), 0),
                   COALESCE(SUM(protein_g), 0.0),
                   COALESCE(SUM(carbs_g), 0.0),
                   COALESCE(SUM(fat_g), 0.0)
            FROM nutrition_entries
            WHERE user_id = ? AND logged_on = ?
            "#,
            params![user_id, date.to_string()],
            |row| {
                Ok(DailyTotals {
                    date,
                    entries: row.get(0)?,
                    calories: row.get(1)?,
                    protein_g: row.get(2)?,
                    carbs_g: row.get(3)?,
                    fat_g: row.get(4)?,
                })
            },
        )?;
        Ok(totals)
    }

    fn select_entries(
        &self,
        kind: LogKind,
        filter: &str,
        args: &[&dyn ToSql],
        limit: Option<i64>,
    ) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} DESC, id DESC",
            columns(kind),
            kind.table(),
            filter,
            day_expr(kind)
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(args, |row| entry_from_row(kind, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl LogStore for Database {
    fn query_entries(
        &self,
        user_id: i64,
        kind: LogKind,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<LogEntry>> {
        let since = since.to_string();
        let until = until.to_string();
        let filter = format!("user_id = ? AND {} BETWEEN ? AND ?", day_expr(kind));
        self.select_entries(kind, &filter, &[&user_id, &since, &until], None)
    }
}
