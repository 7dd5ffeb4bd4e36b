//! Server command implementation

use std::path::Path;

use anyhow::Result;
use careu_server::{parse_api_keys, ReminderScheduleConfig, API_KEYS_ENV};

use super::{load_engine, open_db};

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    rules: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting CareU web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let api_keys = parse_api_keys(&std::env::var(API_KEYS_ENV).unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if api_keys.is_empty() {
        println!("   ❌ Authentication: no keys in {}, all requests will be rejected", API_KEYS_ENV);
    } else {
        println!(
            "   🔑 API keys: {} configured ({})",
            api_keys.len(),
            API_KEYS_ENV
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    match ReminderScheduleConfig::from_env() {
        Some(schedule) => println!("   ⏰ Scheduled passes: every {}h", schedule.interval_hours),
        None => println!("   ⏰ Scheduled passes: off"),
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    let engine = load_engine(rules)?;

    let config = careu_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
    };

    careu_server::serve_with_config(db, host, port, config, engine).await?;

    Ok(())
}
