//! Health log commands (log, list, delete, daily totals)

use anyhow::{anyhow, Result};
use careu_core::models::{LogEntry, LogKind, NewLogEntry};
use careu_core::Database;

use super::{parse_date, resolve_user, truncate};

pub fn cmd_log(db: &Database, user: &str, entry: NewLogEntry) -> Result<LogEntry> {
    let user = resolve_user(db, user)?;
    let saved = db.add_entry(user.id, &entry)?;

    db.log_audit(
        "cli",
        "create",
        Some(saved.kind().as_str()),
        Some(saved.id()),
        Some(&format!("user_id={}", user.id)),
    )?;

    println!(
        "✅ Logged {} entry #{} for {} on {}",
        saved.kind().as_str(),
        saved.id(),
        user.username,
        saved.day()
    );

    Ok(saved)
}

fn parse_kind(kind: &str) -> Result<LogKind> {
    kind.parse::<LogKind>().map_err(|e| anyhow!(e))
}

pub fn cmd_logs_list(db: &Database, user: &str, kind: &str, limit: i64) -> Result<()> {
    let user = resolve_user(db, user)?;
    let kind = parse_kind(kind)?;
    let entries = db.list_entries(user.id, kind, limit.clamp(1, 1000))?;

    if entries.is_empty() {
        println!("No {} entries for {}.", kind.as_str(), user.username);
        return Ok(());
    }

    println!();
    println!("📋 {} entries for {}", kind.as_str(), user.username);
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in &entries {
        println!("   {:>5}  {}  {}", entry.id(), entry.day(), describe(entry));
    }

    Ok(())
}

fn describe(entry: &LogEntry) -> String {
    match entry {
        LogEntry::Nutrition(e) => {
            let mut line = format!("{:<9} {:>5} kcal", e.meal_type.as_str(), e.calories);
            if let Some(p) = e.protein_g {
                line.push_str(&format!("  {:.1} g protein", p));
            }
            if let Some(notes) = &e.notes {
                line.push_str(&format!("  {}", truncate(notes, 30)));
            }
            line
        }
        LogEntry::Activity(e) => {
            let mut line = format!("{:>6} steps", e.steps);
            if let Some(m) = e.active_minutes {
                line.push_str(&format!("  {} min", m));
            }
            if let Some(d) = e.distance_km {
                line.push_str(&format!("  {:.1} km", d));
            }
            line
        }
        LogEntry::Sleep(e) => {
            let mut line = format!("{:.1} h", e.duration_hours());
            if let Some(q) = e.quality {
                line.push_str(&format!("  quality {}/5", q));
            }
            line
        }
        LogEntry::Vitals(e) => {
            let mut parts = vec![e.recorded_at.format("%H:%M").to_string()];
            if let Some(hr) = e.resting_hr {
                parts.push(format!("{} bpm", hr));
            }
            if let (Some(sys), Some(dia)) = (e.systolic, e.diastolic) {
                parts.push(format!("{}/{} mmHg", sys, dia));
            }
            if let Some(t) = e.temperature_c {
                parts.push(format!("{:.1} °C", t));
            }
            parts.join("  ")
        }
    }
}

pub fn cmd_logs_delete(db: &Database, user: &str, kind: &str, id: i64) -> Result<()> {
    let user = resolve_user(db, user)?;
    let kind = parse_kind(kind)?;
    db.delete_entry(user.id, kind, id)?;

    db.log_audit(
        "cli",
        "delete",
        Some(kind.as_str()),
        Some(id),
        Some(&format!("user_id={}", user.id)),
    )?;

    println!("🗑️  Deleted {} entry #{}", kind.as_str(), id);
    Ok(())
}

pub fn cmd_logs_daily(db: &Database, user: &str, date: Option<&str>) -> Result<()> {
    let user = resolve_user(db, user)?;
    let date = parse_date(date)?;
    let totals = db.daily_totals(user.id, date)?;

    println!();
    println!("🍽️  {} on {}", user.username, totals.date);
    println!("   ─────────────────────────────");
    println!("   Meals:    {}", totals.entries);
    println!("   Calories: {} kcal", totals.calories);
    println!("   Protein:  {:.1} g", totals.protein_g);
    println!("   Carbs:    {:.1} g", totals.carbs_g);
    println!("   Fat:      {:.1} g", totals.fat_g);

    Ok(())
}
