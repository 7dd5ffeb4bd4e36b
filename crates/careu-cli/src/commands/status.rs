//! Status command implementation

use std::path::Path;

use anyhow::Result;
use careu_core::insights::config::{default_config_path, RULES_CONFIG_ENV};
use careu_core::insights::RuleSpec;

use super::{load_engine, open_db};

pub fn cmd_status(db_path: &Path, no_encrypt: bool, rules: Option<&Path>) -> Result<()> {
    use careu_core::db::DB_KEY_ENV;
    use std::fs;

    println!();
    println!("📊 CareU Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(users) = db.list_users() {
                    println!();
                    println!("   Users: {}", users.len());
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    let source = match rules {
        Some(path) => path.display().to_string(),
        None => match std::env::var(RULES_CONFIG_ENV) {
            Ok(path) => format!("{} ({})", path, RULES_CONFIG_ENV),
            Err(_) => match default_config_path().filter(|p| p.exists()) {
                Some(path) => path.display().to_string(),
                None => "built-in defaults".to_string(),
            },
        },
    };
    println!("   Rules: {}", source);

    match load_engine(rules) {
        Ok(engine) => {
            let config = engine.config();
            print_registry("Patient reminders", &config.patient);
            print_registry("Provider alerts", &config.provider);
        }
        Err(e) => println!("   ❌ {:#}", e),
    }

    println!();
    Ok(())
}

fn print_registry(label: &str, registry: &[RuleSpec]) {
    println!("   {}:", label);
    for spec in registry {
        let mark = if spec.enabled { "✓" } else { "·" };
        println!(
            "     {} {:<22} suppress {}h",
            mark,
            spec.rule.as_str(),
            spec.suppress_for.num_hours()
        );
    }
}
