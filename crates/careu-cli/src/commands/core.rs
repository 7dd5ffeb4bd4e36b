//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_engine` - Build the insight engine from the rules config
//! - `resolve_user` - Look a user up by id or username
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use careu_core::insights::EngineConfig;
use careu_core::models::User;
use careu_core::{Database, InsightEngine};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow!("Database path must be valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Build the insight engine from --rules, CAREU_RULES_CONFIG, or the defaults
pub fn load_engine(rules: Option<&Path>) -> Result<InsightEngine> {
    let config = EngineConfig::load(rules).context("Failed to load rules config")?;
    tracing::debug!(
        patient_rules = config.patient.len(),
        provider_rules = config.provider.len(),
        "Rule registry loaded"
    );
    Ok(InsightEngine::with_config(config))
}

/// Accept either a numeric id or a username
pub fn resolve_user(db: &Database, user: &str) -> Result<User> {
    if let Ok(id) = user.parse::<i64>() {
        if let Some(found) = db.get_user(id)? {
            return Ok(found);
        }
    }
    db.get_user_by_username(user)?
        .ok_or_else(|| anyhow!("User not found: {}", user))
}

/// Parse an optional YYYY-MM-DD argument, defaulting to today (UTC)
pub fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        None => Ok(Utc::now().date_naive()),
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Ok(d),
            Err(_) => bail!("Invalid date '{}', expected YYYY-MM-DD", s),
        },
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs migrations
    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add a user: careu users add alice");
    println!("  2. Fill in the profile: careu profile set alice --age 30 --height 175 --weight 70 --sex male");
    println!("  3. Start web API: careu serve");

    Ok(())
}
