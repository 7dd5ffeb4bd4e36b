//! CareU CLI - Health tracker with patient reminders and provider alerts
//!
//! Usage:
//!   careu init                        Initialize database
//!   careu users add alice             Add a user
//!   careu log nutrition alice -c 450  Log a meal
//!   careu reminders alice             Run patient reminders now
//!   careu serve --port 3000           Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use careu_core::models::{
    MealType, NewActivityEntry, NewLogEntry, NewNutritionEntry, NewSleepEntry, NewVitalsEntry,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let rules = cli.rules.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt, rules).await,
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt, rules),
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(UsersAction::List) => commands::cmd_users_list(&db),
                Some(UsersAction::Add { username }) => {
                    commands::cmd_users_add(&db, &username).map(|_| ())
                }
            }
        }
        Commands::Profile { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                ProfileAction::Show { user } => commands::cmd_profile_show(&db, &user),
                ProfileAction::Set {
                    user,
                    age,
                    height,
                    weight,
                    sex,
                    activity,
                } => commands::cmd_profile_set(
                    &db,
                    &user,
                    commands::ProfileArgs {
                        age,
                        height,
                        weight,
                        sex: sex.as_deref(),
                        activity: activity.as_deref(),
                    },
                )
                .map(|_| ()),
            }
        }
        Commands::Consent { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let (user, grant) = match action {
                ConsentAction::Grant { user } => (user, true),
                ConsentAction::Revoke { user } => (user, false),
            };
            commands::cmd_consent(&db, &user, grant).map(|_| ())
        }
        Commands::Log { entry } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let (user, entry) = build_entry(entry)?;
            commands::cmd_log(&db, &user, entry).map(|_| ())
        }
        Commands::Logs { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                LogsAction::List { user, kind, limit } => {
                    commands::cmd_logs_list(&db, &user, &kind, limit)
                }
                LogsAction::Delete { user, kind, id } => {
                    commands::cmd_logs_delete(&db, &user, &kind, id)
                }
                LogsAction::Daily { user, date } => {
                    commands::cmd_logs_daily(&db, &user, date.as_deref())
                }
            }
        }
        Commands::Metrics { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_metrics(&db, &user).map(|_| ())
        }
        Commands::Reminders { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::load_engine(rules)?;
            commands::cmd_reminders(&db, &engine, &user).map(|_| ())
        }
        Commands::Alerts { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::load_engine(rules)?;
            commands::cmd_alerts(&db, &engine, &user).map(|_| ())
        }
        Commands::Notifications {
            user,
            audience,
            dismissed,
            limit,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let notifications =
                commands::cmd_notifications(&db, &user, audience.as_deref(), dismissed, limit, json)?;
            tracing::debug!(count = notifications.len(), "Listed notifications");
            Ok(())
        }
        Commands::Dismiss { user, id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::load_engine(rules)?;
            commands::cmd_dismiss(&db, &engine, &user, id).map(|_| ())
        }
        Commands::Act { user, id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::load_engine(rules)?;
            commands::cmd_act(&db, &engine, &user, id).map(|_| ())
        }
        Commands::Share { user, provider } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::load_engine(rules)?;
            commands::cmd_share(&db, &engine, &user, &provider).map(|_| ())
        }
    }
}

/// Turn `careu log <kind> ...` arguments into the user and a new entry
fn build_entry(args: LogEntryArgs) -> Result<(String, NewLogEntry)> {
    let built = match args {
        LogEntryArgs::Nutrition {
            user,
            calories,
            protein,
            carbs,
            fat,
            meal,
            date,
            notes,
        } => {
            let meal_type = meal.parse::<MealType>().map_err(|e| anyhow::anyhow!(e))?;
            (
                user,
                NewLogEntry::Nutrition(NewNutritionEntry {
                    logged_on: commands::parse_date(date.as_deref())?,
                    meal_type,
                    calories,
                    protein_g: protein,
                    carbs_g: carbs,
                    fat_g: fat,
                    notes,
                }),
            )
        }
        LogEntryArgs::Activity {
            user,
            steps,
            minutes,
            distance,
            date,
        } => (
            user,
            NewLogEntry::Activity(NewActivityEntry {
                date: commands::parse_date(date.as_deref())?,
                steps,
                active_minutes: minutes,
                distance_km: distance,
            }),
        ),
        LogEntryArgs::Sleep {
            user,
            hours,
            quality,
            date,
        } => {
            if !(hours >= 0.0) {
                anyhow::bail!("Sleep hours must be non-negative, got {}", hours);
            }
            (
                user,
                NewLogEntry::Sleep(NewSleepEntry {
                    date: commands::parse_date(date.as_deref())?,
                    duration_minutes: (hours * 60.0).round() as u32,
                    quality,
                }),
            )
        }
        LogEntryArgs::Vitals {
            user,
            hr,
            systolic,
            diastolic,
            temp,
        } => (
            user,
            NewLogEntry::Vitals(NewVitalsEntry {
                recorded_at: Utc::now(),
                resting_hr: hr,
                systolic,
                diastolic,
                temperature_c: temp,
            }),
        ),
    };
    Ok(built)
}
