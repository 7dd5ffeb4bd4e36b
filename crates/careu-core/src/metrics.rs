//! Metric Calculator - derived physiological targets from a profile
//!
//! Every function here is pure: the same profile always yields the same
//! output, and a profile missing a required attribute yields `None` rather
//! than a guess.

use serde::{Deserialize, Serialize};

use crate::models::{ActivityLevel, Profile, Sex};

/// TDEE multiplier applied to BMR for an activity level
pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.20,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::Active => 1.725,
        ActivityLevel::VeryActive => 1.90,
    }
}

/// Grams of protein per kg of body weight for an activity level
pub fn protein_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 0.8,
        ActivityLevel::Light => 1.0,
        ActivityLevel::Moderate => 1.2,
        ActivityLevel::Active => 1.6,
        ActivityLevel::VeryActive => 2.0,
    }
}

/// The profile's activity level, or sedentary when unset
pub fn resolve_activity_level(profile: &Profile) -> ActivityLevel {
    profile.activity_level.unwrap_or_default()
}

/// Basal metabolic rate (Mifflin-St Jeor), kcal/day
///
/// Requires weight, height, age and sex. Every sex other than male uses the
/// female constant (-161). That is a simplification of the formula, which
/// only defines the two branches, not a statement about the person.
pub fn basal_metabolic_rate(profile: &Profile) -> Option<f64> {
    let weight = profile.weight()?;
    let height = profile.height()? as f64;
    let age = profile.age_years()? as f64;
    let sex = profile.sex?;

    let base = 10.0 * weight + 6.25 * height - 5.0 * age;
    Some(match sex {
        Sex::Male => base + 5.0,
        Sex::Female | Sex::Other => base - 161.0,
    })
}

/// Total daily energy expenditure, kcal/day
pub fn total_daily_energy_expenditure(profile: &Profile) -> Option<f64> {
    let bmr = basal_metabolic_rate(profile)?;
    Some(bmr * activity_multiplier(resolve_activity_level(profile)))
}

/// Daily protein target in grams; only needs weight
pub fn protein_target_grams(profile: &Profile) -> Option<f64> {
    let weight = profile.weight()?;
    Some(weight * protein_multiplier(resolve_activity_level(profile)))
}

/// Body mass index rounded to one decimal
pub fn body_mass_index(profile: &Profile) -> Option<f64> {
    let weight = profile.weight()?;
    let height_m = profile.height()? as f64 / 100.0;
    let bmi = weight / (height_m * height_m);
    Some((bmi * 10.0).round() / 10.0)
}

/// All derived targets for a profile in one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub activity_level: ActivityLevel,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
    pub protein_g: Option<f64>,
    pub bmi: Option<f64>,
}

impl Targets {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            activity_level: resolve_activity_level(profile),
            bmr: basal_metabolic_rate(profile),
            tdee: total_daily_energy_expenditure(profile),
            protein_g: protein_target_grams(profile),
            bmi: body_mass_index(profile),
        }
    }
}
