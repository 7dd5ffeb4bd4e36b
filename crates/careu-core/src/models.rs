//! Domain models for CareU

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Biological sex as recorded on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown sex: {}", s)),
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-reported activity level used for TDEE and protein targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    /// Little or no exercise
    #[default]
    Sedentary,
    /// Light exercise 1-3 days/week
    Light,
    /// Moderate exercise 3-5 days/week
    Moderate,
    /// Hard exercise 6-7 days/week
    Active,
    /// Very hard exercise and a physical job
    VeryActive,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
            Self::VeryActive => "very_active",
        }
    }

    pub fn all() -> &'static [ActivityLevel] {
        &[
            Self::Sedentary,
            Self::Light,
            Self::Moderate,
            Self::Active,
            Self::VeryActive,
        ]
    }
}

impl std::str::FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Ok(Self::Sedentary),
            "light" => Ok(Self::Light),
            "moderate" => Ok(Self::Moderate),
            "active" => Ok(Self::Active),
            "very_active" | "veryactive" => Ok(Self::VeryActive),
            _ => Err(format!("Unknown activity level: {}", s)),
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-user profile (exactly one per user, provisioned with the user)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub user_id: i64,
    pub age: Option<u32>,
    pub height_cm: Option<u32>,
    pub weight_kg: Option<f64>,
    pub sex: Option<Sex>,
    pub activity_level: Option<ActivityLevel>,
    pub data_sharing_consent: bool,
    pub consent_timestamp: Option<DateTime<Utc>>,
}

impl Profile {
    /// A freshly provisioned profile with nothing filled in
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            age: None,
            height_cm: None,
            weight_kg: None,
            sex: None,
            activity_level: None,
            data_sharing_consent: false,
            consent_timestamp: None,
        }
    }

    // Zero is treated the same as unset: a 0 kg / 0 cm / 0 year profile is
    // never real data.

    pub fn age_years(&self) -> Option<u32> {
        self.age.filter(|a| *a > 0)
    }

    pub fn height(&self) -> Option<u32> {
        self.height_cm.filter(|h| *h > 0)
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight_kg.filter(|w| *w > 0.0)
    }

    /// Names of the profile fields required for personalized analysis that
    /// are still unset, in display order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.age_years().is_none() {
            missing.push("age");
        }
        if self.weight().is_none() {
            missing.push("weight");
        }
        if self.height().is_none() {
            missing.push("height");
        }
        if self.sex.is_none() {
            missing.push("sex");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Partial profile update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub age: Option<u32>,
    pub height_cm: Option<u32>,
    pub weight_kg: Option<f64>,
    pub sex: Option<Sex>,
    pub activity_level: Option<ActivityLevel>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(age) = self.age {
            if age == 0 || age > 130 {
                return Err(Error::InvalidData(format!("Age out of range: {}", age)));
            }
        }
        if let Some(height) = self.height_cm {
            if !(50..=272).contains(&height) {
                return Err(Error::InvalidData(format!(
                    "Height out of range: {} cm",
                    height
                )));
            }
        }
        if let Some(weight) = self.weight_kg {
            if !(weight > 0.0 && weight < 700.0) {
                return Err(Error::InvalidData(format!(
                    "Weight out of range: {} kg",
                    weight
                )));
            }
        }
        Ok(())
    }

    /// Apply this update on top of an existing profile
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(age) = self.age {
            profile.age = Some(age);
        }
        if let Some(height) = self.height_cm {
            profile.height_cm = Some(height);
        }
        if let Some(weight) = self.weight_kg {
            profile.weight_kg = Some(weight);
        }
        if let Some(sex) = self.sex {
            profile.sex = Some(sex);
        }
        if let Some(level) = self.activity_level {
            profile.activity_level = Some(level);
        }
    }
}

/// Kinds of health log the tracker stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Nutrition,
    Activity,
    Sleep,
    Vitals,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nutrition => "nutrition",
            Self::Activity => "activity",
            Self::Sleep => "sleep",
            Self::Vitals => "vitals",
        }
    }

    /// Backing table for this kind
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Nutrition => "nutrition_entries",
            Self::Activity => "activity_entries",
            Self::Sleep => "sleep_entries",
            Self::Vitals => "vitals_entries",
        }
    }

    pub fn all() -> &'static [LogKind] {
        &[Self::Nutrition, Self::Activity, Self::Sleep, Self::Vitals]
    }
}

impl std::str::FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nutrition" | "meal" | "meals" => Ok(Self::Nutrition),
            "activity" | "steps" => Ok(Self::Activity),
            "sleep" => Ok(Self::Sleep),
            "vitals" | "vital" => Ok(Self::Vitals),
            _ => Err(format!("Unknown log kind: {}", s)),
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            _ => Err(format!("Unknown meal type: {}", s)),
        }
    }
}

/// A logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionEntry {
    pub id: i64,
    pub user_id: i64,
    pub logged_on: NaiveDate,
    pub meal_type: MealType,
    pub calories: u32,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNutritionEntry {
    pub logged_on: NaiveDate,
    #[serde(default)]
    pub meal_type: MealType,
    pub calories: u32,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub notes: Option<String>,
}

/// One day of activity (steps etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub steps: u32,
    pub active_minutes: Option<u32>,
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivityEntry {
    pub date: NaiveDate,
    pub steps: u32,
    pub active_minutes: Option<u32>,
    pub distance_km: Option<f64>,
}

/// One night of sleep, keyed by the date the user woke up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub quality: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl SleepEntry {
    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSleepEntry {
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub quality: Option<u8>,
}

/// A vitals reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalsEntry {
    pub id: i64,
    pub user_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub resting_hr: Option<u32>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub temperature_c: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVitalsEntry {
    pub recorded_at: DateTime<Utc>,
    pub resting_hr: Option<u32>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub temperature_c: Option<f64>,
}

/// Any logged health entry, as read back from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Nutrition(NutritionEntry),
    Activity(ActivityEntry),
    Sleep(SleepEntry),
    Vitals(VitalsEntry),
}

impl LogEntry {
    pub fn kind(&self) -> LogKind {
        match self {
            Self::Nutrition(_) => LogKind::Nutrition,
            Self::Activity(_) => LogKind::Activity,
            Self::Sleep(_) => LogKind::Sleep,
            Self::Vitals(_) => LogKind::Vitals,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Nutrition(e) => e.id,
            Self::Activity(e) => e.id,
            Self::Sleep(e) => e.id,
            Self::Vitals(e) => e.id,
        }
    }

    /// Calendar day the entry belongs to
    pub fn day(&self) -> NaiveDate {
        match self {
            Self::Nutrition(e) => e.logged_on,
            Self::Activity(e) => e.date,
            Self::Sleep(e) => e.date,
            Self::Vitals(e) => e.recorded_at.date_naive(),
        }
    }
}

/// A new entry submitted by the logging flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NewLogEntry {
    Nutrition(NewNutritionEntry),
    Activity(NewActivityEntry),
    Sleep(NewSleepEntry),
    Vitals(NewVitalsEntry),
}

impl NewLogEntry {
    pub fn kind(&self) -> LogKind {
        match self {
            Self::Nutrition(_) => LogKind::Nutrition,
            Self::Activity(_) => LogKind::Activity,
            Self::Sleep(_) => LogKind::Sleep,
            Self::Vitals(_) => LogKind::Vitals,
        }
    }

    /// Reject values the forms would never accept
    pub fn validate(&self) -> Result<()> {
        fn non_negative(name: &str, value: Option<f64>) -> Result<()> {
            match value {
                Some(v) if !(v >= 0.0) => Err(Error::InvalidData(format!(
                    "{} must be non-negative, got {}",
                    name, v
                ))),
                _ => Ok(()),
            }
        }

        match self {
            Self::Nutrition(e) => {
                non_negative("protein_g", e.protein_g)?;
                non_negative("carbs_g", e.carbs_g)?;
                non_negative("fat_g", e.fat_g)?;
            }
            Self::Activity(e) => {
                non_negative("distance_km", e.distance_km)?;
            }
            Self::Sleep(e) => {
                if e.duration_minutes > 24 * 60 {
                    return Err(Error::InvalidData(format!(
                        "Sleep duration longer than a day: {} minutes",
                        e.duration_minutes
                    )));
                }
                if let Some(q) = e.quality {
                    if !(1..=5).contains(&q) {
                        return Err(Error::InvalidData(format!(
                            "Sleep quality must be 1-5, got {}",
                            q
                        )));
                    }
                }
            }
            Self::Vitals(e) => {
                if let Some(t) = e.temperature_c {
                    if !(30.0..=45.0).contains(&t) {
                        return Err(Error::InvalidData(format!(
                            "Temperature must be 30-45 °C, got {}",
                            t
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Nutrition totals for one day (dashboard summary)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub entries: i64,
    pub calories: i64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}
