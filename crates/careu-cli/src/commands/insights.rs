//! Metrics, reminder, alert and notification commands

use anyhow::{anyhow, Result};
use chrono::Utc;
use careu_core::insights::{Audience, Notification, Severity};
use careu_core::{Database, InsightEngine, NotificationStore, ProfileStore, Targets};

use super::{resolve_user, truncate};

pub fn cmd_metrics(db: &Database, user: &str) -> Result<Targets> {
    let user = resolve_user(db, user)?;
    let profile = db
        .get_profile(user.id)?
        .ok_or_else(|| anyhow!("No profile for user {}", user.username))?;
    let targets = Targets::for_profile(&profile);

    let fmt = |v: Option<f64>, unit: &str, prec: usize| match v {
        Some(v) => format!("{:.*} {}", prec, v, unit),
        None => "-".to_string(),
    };

    println!();
    println!("📐 Metrics: {}", user.username);
    println!("   ─────────────────────────────");
    println!("   BMR:            {}", fmt(targets.bmr, "kcal/day", 0));
    println!(
        "   TDEE:           {} ({})",
        fmt(targets.tdee, "kcal/day", 0),
        targets.activity_level
    );
    println!("   Protein target: {}", fmt(targets.protein_g, "g/day", 1));
    println!("   BMI:            {}", fmt(targets.bmi, "", 1).trim_end());

    let missing = profile.missing_fields();
    if !missing.is_empty() {
        println!();
        println!("   ⚠️  Missing {} - targets unavailable", missing.join(", "));
    }

    Ok(targets)
}

fn run_pass(
    db: &Database,
    engine: &InsightEngine,
    user: &str,
    audience: Audience,
) -> Result<Vec<Notification>> {
    let user = resolve_user(db, user)?;
    let created = engine.evaluate_at(db, user.id, audience, Utc::now())?;

    db.log_audit(
        "cli",
        "run",
        Some(audience.as_str()),
        Some(user.id),
        Some(&format!("created={}", created.len())),
    )?;

    let label = match audience {
        Audience::Patient => "reminder",
        Audience::Provider => "alert",
    };

    if created.is_empty() {
        println!("✅ No new {}s for {}", label, user.username);
    } else {
        println!();
        println!("🔔 {} new {}(s) for {}", created.len(), label, user.username);
        println!("   ─────────────────────────────────────────────────────────────");
        for notification in &created {
            print_notification(notification);
        }
    }

    Ok(created)
}

/// "Check now" for patient reminders
pub fn cmd_reminders(db: &Database, engine: &InsightEngine, user: &str) -> Result<Vec<Notification>> {
    run_pass(db, engine, user, Audience::Patient)
}

/// "Run now" for provider alerts
pub fn cmd_alerts(db: &Database, engine: &InsightEngine, user: &str) -> Result<Vec<Notification>> {
    run_pass(db, engine, user, Audience::Provider)
}

pub fn cmd_notifications(
    db: &Database,
    user: &str,
    audience: Option<&str>,
    dismissed: bool,
    limit: usize,
    json: bool,
) -> Result<Vec<Notification>> {
    let user = resolve_user(db, user)?;
    let audience = audience
        .map(|a| a.parse::<Audience>())
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let notifications = if dismissed {
        db.list_dismissed(user.id, audience, limit.clamp(1, 200))?
    } else {
        db.list_active(user.id, audience)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&notifications)?);
        return Ok(notifications);
    }

    if notifications.is_empty() {
        let state = if dismissed { "dismissed" } else { "active" };
        println!("No {} notifications for {}.", state, user.username);
        return Ok(notifications);
    }

    println!();
    println!("🔔 Notifications for {}", user.username);
    println!("   ─────────────────────────────────────────────────────────────");
    for notification in &notifications {
        print_notification(notification);
    }

    Ok(notifications)
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Moderate => "🟠",
        Severity::Low => "🟡",
        Severity::Info => "🔵",
    }
}

fn print_notification(n: &Notification) {
    let state = if n.acted_upon {
        " (acted upon)"
    } else if n.dismissed_at.is_some() {
        " (dismissed)"
    } else {
        ""
    };
    let priority = n
        .priority
        .map(|p| format!(", {} priority", p))
        .unwrap_or_default();

    println!(
        "   {} #{} [{}] {}{}",
        severity_icon(n.severity),
        n.id,
        n.category,
        n.title,
        state
    );
    println!(
        "      {} {}{} · {}",
        n.audience,
        n.severity,
        priority,
        n.created_at.format("%Y-%m-%d %H:%M")
    );
    println!("      {}", truncate(&n.message, 100));
    for step in &n.actionable_steps {
        println!("      • {}", step);
    }
    if let Some(hint) = &n.provider_hint {
        println!("      ↳ {}", hint);
    }
    println!();
}

pub fn cmd_dismiss(db: &Database, engine: &InsightEngine, user: &str, id: i64) -> Result<Notification> {
    let user = resolve_user(db, user)?;
    let notification = engine.dismiss(db, id, user.id)?;

    db.log_audit(
        "cli",
        "dismiss",
        Some("notification"),
        Some(id),
        Some(&format!("user_id={}", user.id)),
    )?;

    println!("✅ Dismissed notification #{}", id);
    Ok(notification)
}

pub fn cmd_act(db: &Database, engine: &InsightEngine, user: &str, id: i64) -> Result<Notification> {
    let user = resolve_user(db, user)?;
    let notification = engine.act_upon(db, id, user.id)?;

    db.log_audit(
        "cli",
        "act",
        Some("notification"),
        Some(id),
        Some(&format!("user_id={}", user.id)),
    )?;

    println!("✅ Marked notification #{} as acted upon", id);
    Ok(notification)
}

pub fn cmd_share(
    db: &Database,
    engine: &InsightEngine,
    user: &str,
    provider: &str,
) -> Result<Notification> {
    let patient = resolve_user(db, user)?;
    let provider = resolve_user(db, provider)?;
    let notification = engine.share_with_provider(db, patient.id, provider.id, Utc::now())?;

    db.log_audit(
        "cli",
        "share",
        Some("profile"),
        Some(patient.id),
        Some(&format!("provider_id={}", provider.id)),
    )?;

    println!(
        "📤 Shared a nutrition summary from {} with {}",
        patient.username, provider.username
    );
    println!("      {}", notification.message);
    Ok(notification)
}
