//! Rule registry and threshold configuration
//!
//! The registry is data: an ordered list of `{ rule, enabled, suppress_hours }`
//! entries per audience, read from TOML.
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path (`--rules`), else `CAREU_RULES_CONFIG`
//! 2. Override in the data dir (~/.local/share/careu/config/rules.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use super::rules::Rule;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../../config/rules.toml");

/// Environment variable naming an explicit rules config file
pub const RULES_CONFIG_ENV: &str = "CAREU_RULES_CONFIG";

/// Longest nutrition window; history reaches back twice this (14 days)
pub const MAX_WINDOW_DAYS: u32 = 7;

/// Longest suppression window (one year)
pub const MAX_SUPPRESS_HOURS: i64 = 24 * 365;

/// Numeric thresholds shared by the pattern rules
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Length of the rolling nutrition window, and of each activity week
    pub window_days: u32,
    /// Fire when mean calories < ratio × TDEE
    pub calorie_target_ratio: f64,
    /// Absolute floor used when no personalized target exists
    pub calorie_floor_kcal: f64,
    /// Fire when mean protein < ratio × protein target
    pub protein_target_ratio: f64,
    /// Fire when fewer distinct days were logged in the window
    pub min_logged_days: u32,
    /// Fire when this week's steps < ratio × last week's
    pub activity_drop_ratio: f64,
    /// How many recent sleep records to look at
    pub sleep_records: u32,
    pub short_sleep_hours: f64,
    /// Fire when at least this many of the records are short
    pub short_sleep_nights: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            window_days: 7,
            calorie_target_ratio: 0.75,
            calorie_floor_kcal: 1000.0,
            protein_target_ratio: 0.70,
            min_logged_days: 5,
            activity_drop_ratio: 0.60,
            sleep_records: 5,
            short_sleep_hours: 5.0,
            short_sleep_nights: 3,
        }
    }
}

/// Consent gate policy for the provider path
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentPolicy {
    /// When the patient has no profile at all, run provider alerts anyway.
    /// Kept on by default so fresh dev/test databases don't wedge; every use
    /// is logged at warn level.
    pub fail_open_on_missing_profile: bool,
}

impl Default for ConsentPolicy {
    fn default() -> Self {
        Self {
            fail_open_on_missing_profile: true,
        }
    }
}

/// One registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub rule: Rule,
    pub enabled: bool,
    /// Suppression window for the rule's category
    pub suppress_for: Duration,
}

impl RuleSpec {
    /// `suppress_hours` is clamped to `1..=MAX_SUPPRESS_HOURS`
    pub fn new(rule: Rule, enabled: bool, suppress_hours: i64) -> Self {
        Self {
            rule,
            enabled,
            suppress_for: Duration::hours(suppress_hours.clamp(1, MAX_SUPPRESS_HOURS)),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub consent: ConsentPolicy,
    /// Patient reminder registry, in evaluation order
    pub patient: Vec<RuleSpec>,
    /// Provider alert registry, in evaluation order
    pub provider: Vec<RuleSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            consent: ConsentPolicy::default(),
            patient: vec![
                RuleSpec::new(Rule::IncompleteProfile, true, 72),
                RuleSpec::new(Rule::LowCalorieIntake, true, 120),
                RuleSpec::new(Rule::LowProteinIntake, true, 120),
                RuleSpec::new(Rule::InconsistentLogging, true, 120),
                RuleSpec::new(Rule::ActivityDrop, false, 120),
                RuleSpec::new(Rule::InsufficientSleep, false, 120),
            ],
            provider: vec![
                RuleSpec::new(Rule::LowCalorieIntake, true, 24),
                RuleSpec::new(Rule::ActivityDrop, true, 24),
                RuleSpec::new(Rule::InsufficientSleep, true, 24),
            ],
        }
    }
}

impl EngineConfig {
    /// Load using the standard resolution order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(RULES_CONFIG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let content = match explicit.map(Path::to_path_buf).or(env_path) {
            // An explicitly named file must exist
            Some(path) => read_config(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => read_config(&path)?,
                None => DEFAULT_CONFIG.to_string(),
            },
        };

        parse_config(&content)
    }

    /// Parse a TOML document (missing sections fall back to defaults)
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("careu").join("config").join("rules.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "Loading rules config");
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    thresholds: Option<RawThresholds>,
    consent: Option<RawConsent>,
    patient: Option<Vec<RawRuleSpec>>,
    provider: Option<Vec<RawRuleSpec>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThresholds {
    window_days: Option<u32>,
    calorie_target_ratio: Option<f64>,
    calorie_floor_kcal: Option<f64>,
    protein_target_ratio: Option<f64>,
    min_logged_days: Option<u32>,
    activity_drop_ratio: Option<f64>,
    sleep_records: Option<u32>,
    short_sleep_hours: Option<f64>,
    short_sleep_nights: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConsent {
    fail_open_on_missing_profile: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleSpec {
    rule: String,
    enabled: Option<bool>,
    suppress_hours: i64,
}

fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid rules TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(t) = raw.thresholds {
        let th = &mut config.thresholds;
        if let Some(v) = t.window_days {
            th.window_days = v;
        }
        if let Some(v) = t.calorie_target_ratio {
            th.calorie_target_ratio = v;
        }
        if let Some(v) = t.calorie_floor_kcal {
            th.calorie_floor_kcal = v;
        }
        if let Some(v) = t.protein_target_ratio {
            th.protein_target_ratio = v;
        }
        if let Some(v) = t.min_logged_days {
            th.min_logged_days = v;
        }
        if let Some(v) = t.activity_drop_ratio {
            th.activity_drop_ratio = v;
        }
        if let Some(v) = t.sleep_records {
            th.sleep_records = v;
        }
        if let Some(v) = t.short_sleep_hours {
            th.short_sleep_hours = v;
        }
        if let Some(v) = t.short_sleep_nights {
            th.short_sleep_nights = v;
        }
    }

    if let Some(c) = raw.consent {
        if let Some(v) = c.fail_open_on_missing_profile {
            config.consent.fail_open_on_missing_profile = v;
        }
    }

    if let Some(entries) = raw.patient {
        config.patient = parse_registry("patient", entries)?;
    }
    if let Some(entries) = raw.provider {
        config.provider = parse_registry("provider", entries)?;
    }

    validate(&config)?;
    Ok(config)
}

fn parse_registry(name: &str, entries: Vec<RawRuleSpec>) -> Result<Vec<RuleSpec>> {
    let mut specs: Vec<RuleSpec> = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.into_iter().enumerate() {
        let rule: Rule = entry
            .rule
            .parse()
            .map_err(|e: String| Error::Config(format!("[[{}]] entry {}: {}", name, idx + 1, e)))?;

        if entry.suppress_hours <= 0 || entry.suppress_hours > MAX_SUPPRESS_HOURS {
            return Err(Error::Config(format!(
                "[[{}]] {}: suppress_hours must be in 1..={}, got {}",
                name, rule, MAX_SUPPRESS_HOURS, entry.suppress_hours
            )));
        }
        let suppress_for = Duration::try_hours(entry.suppress_hours).ok_or_else(|| {
            Error::Config(format!("[[{}]] {}: suppress_hours out of range", name, rule))
        })?;
        if specs.iter().any(|s| s.rule == rule) {
            return Err(Error::Config(format!(
                "[[{}]] {} is listed twice",
                name, rule
            )));
        }
        // The completeness check gates everything after it
        if rule == Rule::IncompleteProfile && idx != 0 {
            return Err(Error::Config(format!(
                "[[{}]] incomplete_profile must be the first entry",
                name
            )));
        }

        specs.push(RuleSpec {
            rule,
            enabled: entry.enabled.unwrap_or(true),
            suppress_for,
        });
    }

    Ok(specs)
}

fn validate(config: &EngineConfig) -> Result<()> {
    let t = &config.thresholds;

    let ratios = [
        ("calorie_target_ratio", t.calorie_target_ratio),
        ("protein_target_ratio", t.protein_target_ratio),
        ("activity_drop_ratio", t.activity_drop_ratio),
    ];
    for (name, value) in ratios {
        if !(value > 0.0 && value <= 1.0) {
            return Err(Error::Config(format!(
                "{} must be in (0, 1], got {}",
                name, value
            )));
        }
    }

    if t.window_days == 0 || t.window_days > MAX_WINDOW_DAYS {
        return Err(Error::Config(format!(
            "window_days must be in 1..={}, got {}",
            MAX_WINDOW_DAYS, t.window_days
        )));
    }
    if t.min_logged_days > t.window_days {
        return Err(Error::Config(format!(
            "min_logged_days ({}) exceeds window_days ({})",
            t.min_logged_days, t.window_days
        )));
    }
    if t.sleep_records == 0 || t.short_sleep_nights == 0 {
        return Err(Error::Config(
            "sleep_records and short_sleep_nights must be positive".into(),
        ));
    }
    if t.short_sleep_nights > t.sleep_records {
        return Err(Error::Config(format!(
            "short_sleep_nights ({}) exceeds sleep_records ({})",
            t.short_sleep_nights, t.sleep_records
        )));
    }
    if !(t.calorie_floor_kcal > 0.0) || !(t.short_sleep_hours > 0.0) {
        return Err(Error::Config(
            "calorie_floor_kcal and short_sleep_hours must be positive".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_matches_builtin_defaults() {
        let config = EngineConfig::embedded().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [thresholds]
            calorie_floor_kcal = 1200.0
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.calorie_floor_kcal, 1200.0);
        assert_eq!(config.thresholds.window_days, 7);
        assert_eq!(config.patient.len(), 6);
    }

    #[test]
    fn test_registry_order_preserved() {
        let config = EngineConfig::from_toml(
            r#"
            [[provider]]
            rule = "insufficient_sleep"
            suppress_hours = 12

            [[provider]]
            rule = "low_calorie_intake"
            enabled = false
            suppress_hours = 48
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.len(), 2);
        assert_eq!(config.provider[0].rule, Rule::InsufficientSleep);
        assert_eq!(config.provider[0].suppress_for, Duration::hours(12));
        assert!(!config.provider[1].enabled);
    }

    #[test]
    fn test_rejects_unknown_rule() {
        let err = EngineConfig::from_toml(
            r#"
            [[patient]]
            rule = "hydration"
            suppress_hours = 24
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = EngineConfig::from_toml(
            r#"
            [[patient]]
            rule = "low_calorie_intake"
            suppress_hours = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        for bad in ["0.0", "1.5", "-0.2"] {
            let toml = format!("[thresholds]\nactivity_drop_ratio = {}\n", bad);
            assert!(EngineConfig::from_toml(&toml).is_err(), "ratio {}", bad);
        }
    }

    #[test]
    fn test_rejects_oversized_window() {
        let err = EngineConfig::from_toml("[thresholds]\nwindow_days = 100000000\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = EngineConfig::from_toml("[thresholds]\nwindow_days = 8\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = EngineConfig::from_toml("[thresholds]\nwindow_days = 7\nmin_logged_days = 3\n")
            .unwrap();
        assert_eq!(config.thresholds.window_days, MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_rejects_oversized_suppression() {
        for hours in ["9223372036854775807", "8761"] {
            let toml = format!(
                "[[provider]]\nrule = \"low_calorie_intake\"\nsuppress_hours = {}\n",
                hours
            );
            let err = EngineConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "suppress_hours {}", hours);
        }

        let config = EngineConfig::from_toml(
            "[[provider]]\nrule = \"low_calorie_intake\"\nsuppress_hours = 8760\n",
        )
        .unwrap();
        assert_eq!(config.provider[0].suppress_for, Duration::hours(MAX_SUPPRESS_HOURS));
    }

    #[test]
    fn test_incomplete_profile_must_lead() {
        let err = EngineConfig::from_toml(
            r#"
            [[patient]]
            rule = "low_calorie_intake"
            suppress_hours = 24

            [[patient]]
            rule = "incomplete_profile"
            suppress_hours = 24
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[consent]\nfail_open_on_missing_profile = false").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert!(!config.consent.fail_open_on_missing_profile);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/careu/rules.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
