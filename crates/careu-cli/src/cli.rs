//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CareU - Health tracking with patient reminders and provider alerts
#[derive(Parser)]
#[command(name = "careu")]
#[command(about = "Self-hosted health tracker with rule-based insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "careu.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CAREU_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Rule registry / thresholds file (TOML)
    ///
    /// Overrides CAREU_RULES_CONFIG and ~/.local/share/careu/config/rules.toml.
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer key from CAREU_API_KEYS.
        #[arg(long)]
        no_auth: bool,
    },

    /// Show database status (encryption, users, rule registry)
    Status,

    /// Manage users (list, add)
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },

    /// Show or update a user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Grant or revoke data sharing with providers
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },

    /// Log a health entry
    Log {
        #[command(subcommand)]
        entry: LogEntryArgs,
    },

    /// List, delete or total logged entries
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },

    /// Show BMR, TDEE, protein target and BMI for a user
    Metrics {
        /// User id or username
        user: String,
    },

    /// Run patient reminders for a user ("check now")
    Reminders {
        /// User id or username
        user: String,
    },

    /// Run provider alerts for a user ("run now")
    Alerts {
        /// User id or username
        user: String,
    },

    /// List a user's notifications without running any rules
    Notifications {
        /// User id or username
        user: String,

        /// Only this audience: patient or provider
        #[arg(short, long)]
        audience: Option<String>,

        /// Show dismissed notifications instead of active ones
        #[arg(long)]
        dismissed: bool,

        /// Maximum dismissed notifications to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Dismiss a notification
    Dismiss {
        /// User id or username (must own the notification)
        user: String,

        /// Notification ID
        id: i64,
    },

    /// Mark a notification as acted upon (also dismisses it)
    Act {
        /// User id or username (must own the notification)
        user: String,

        /// Notification ID
        id: i64,
    },

    /// Share a nutrition summary with a provider (requires consent)
    Share {
        /// Patient user id or username
        user: String,

        /// Provider user id or username
        #[arg(long)]
        provider: String,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users
    List,

    /// Add a user (an empty profile is created with it)
    Add {
        /// Unique username
        username: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show profile and what is still missing
    Show {
        /// User id or username
        user: String,
    },

    /// Update profile fields (only the flags given are changed)
    Set {
        /// User id or username
        user: String,

        /// Age in years
        #[arg(long)]
        age: Option<u32>,

        /// Height in centimetres
        #[arg(long)]
        height: Option<u32>,

        /// Weight in kilograms
        #[arg(long)]
        weight: Option<f64>,

        /// Sex: male, female, other
        #[arg(long)]
        sex: Option<String>,

        /// Activity level: sedentary, light, moderate, active, very_active
        #[arg(long)]
        activity: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConsentAction {
    /// Allow provider alerts and sharing
    Grant {
        /// User id or username
        user: String,
    },

    /// Stop provider alerts and sharing
    Revoke {
        /// User id or username
        user: String,
    },
}

#[derive(Subcommand)]
pub enum LogEntryArgs {
    /// Log a meal
    Nutrition {
        /// User id or username
        user: String,

        /// Calories (kcal)
        #[arg(short, long)]
        calories: u32,

        /// Protein (g)
        #[arg(long)]
        protein: Option<f64>,

        /// Carbohydrates (g)
        #[arg(long)]
        carbs: Option<f64>,

        /// Fat (g)
        #[arg(long)]
        fat: Option<f64>,

        /// Meal: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,

        /// Date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Log a day of activity
    Activity {
        /// User id or username
        user: String,

        /// Step count
        #[arg(short, long)]
        steps: u32,

        /// Active minutes
        #[arg(long)]
        minutes: Option<u32>,

        /// Distance (km)
        #[arg(long)]
        distance: Option<f64>,

        /// Date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Log a night of sleep
    Sleep {
        /// User id or username
        user: String,

        /// Hours slept (e.g. 7.5)
        #[arg(long)]
        hours: f64,

        /// Quality 1-5
        #[arg(short, long)]
        quality: Option<u8>,

        /// Date woken up (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Log a vitals reading (recorded now)
    Vitals {
        /// User id or username
        user: String,

        /// Resting heart rate (bpm)
        #[arg(long)]
        hr: Option<u32>,

        /// Systolic blood pressure (mmHg)
        #[arg(long)]
        systolic: Option<u32>,

        /// Diastolic blood pressure (mmHg)
        #[arg(long)]
        diastolic: Option<u32>,

        /// Body temperature (°C)
        #[arg(long)]
        temp: Option<f64>,
    },
}

#[derive(Subcommand)]
pub enum LogsAction {
    /// List recent entries of one kind
    List {
        /// User id or username
        user: String,

        /// Kind: nutrition, activity, sleep, vitals
        #[arg(short, long, default_value = "nutrition")]
        kind: String,

        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Delete an entry
    Delete {
        /// User id or username
        user: String,

        /// Kind: nutrition, activity, sleep, vitals
        kind: String,

        /// Entry ID
        id: i64,
    },

    /// Nutrition totals for one day
    Daily {
        /// User id or username
        user: String,

        /// Date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
    },
}
