//! Pattern Rules - independent, read-only predicates over a history window
//!
//! `Rule` is a tagged strategy: the registry in [`super::config`] is an
//! ordered list of these, and the engine calls [`Rule::evaluate`] on each
//! enabled one. A rule that lacks the data it needs returns a quiet verdict.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::config::Thresholds;
use super::explain::{self, ProfileFacts};
use super::types::{Category, RuleVerdict, Severity};
use crate::metrics::{resolve_activity_level, Targets};
use crate::models::{ActivityEntry, LogEntry, NutritionEntry, Profile, SleepEntry};

/// The built-in pattern rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    IncompleteProfile,
    LowCalorieIntake,
    LowProteinIntake,
    InconsistentLogging,
    ActivityDrop,
    InsufficientSleep,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::IncompleteProfile => "incomplete_profile",
            Rule::LowCalorieIntake => "low_calorie_intake",
            Rule::LowProteinIntake => "low_protein_intake",
            Rule::InconsistentLogging => "inconsistent_logging",
            Rule::ActivityDrop => "activity_drop",
            Rule::InsufficientSleep => "insufficient_sleep",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Rule::IncompleteProfile => Category::IncompleteProfile,
            Rule::LowCalorieIntake => Category::LowCalorieIntake,
            Rule::LowProteinIntake => Category::LowProteinIntake,
            Rule::InconsistentLogging => Category::InconsistentLogging,
            Rule::ActivityDrop => Category::ActivityDrop,
            Rule::InsufficientSleep => Category::InsufficientSleep,
        }
    }

    pub fn all() -> &'static [Rule] {
        &[
            Rule::IncompleteProfile,
            Rule::LowCalorieIntake,
            Rule::LowProteinIntake,
            Rule::InconsistentLogging,
            Rule::ActivityDrop,
            Rule::InsufficientSleep,
        ]
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleVerdict {
        match self {
            Rule::IncompleteProfile => incomplete_profile(ctx),
            Rule::LowCalorieIntake => low_calorie_intake(ctx),
            Rule::LowProteinIntake => low_protein_intake(ctx),
            Rule::InconsistentLogging => inconsistent_logging(ctx),
            Rule::ActivityDrop => activity_drop(ctx),
            Rule::InsufficientSleep => insufficient_sleep(ctx),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown rule: {}", s))
    }
}

/// The slice of a user's logs the rules look at
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    pub nutrition: Vec<NutritionEntry>,
    pub activity: Vec<ActivityEntry>,
    pub sleep: Vec<SleepEntry>,
}

impl HistoryWindow {
    /// Sort store results into per-kind lists; vitals are not used by any rule
    pub fn from_entries(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        let mut window = Self::default();
        for entry in entries {
            match entry {
                LogEntry::Nutrition(e) => window.nutrition.push(e),
                LogEntry::Activity(e) => window.activity.push(e),
                LogEntry::Sleep(e) => window.sleep.push(e),
                LogEntry::Vitals(_) => {}
            }
        }
        window
    }

    /// Days of history the rules need: two consecutive windows
    pub fn span_days(thresholds: &Thresholds) -> i64 {
        i64::from(thresholds.window_days) * 2
    }
}

/// Everything a rule may read
pub struct RuleContext<'a> {
    pub profile: &'a Profile,
    pub targets: &'a Targets,
    pub history: &'a HistoryWindow,
    pub today: NaiveDate,
    pub thresholds: &'a Thresholds,
}

impl<'a> RuleContext<'a> {
    fn window_days(&self) -> i64 {
        i64::from(self.thresholds.window_days)
    }

    /// Inclusive `[today - (window - 1), today]`
    fn in_window(&self, day: NaiveDate) -> bool {
        let start = self.today - Duration::days(self.window_days() - 1);
        day >= start && day <= self.today
    }

    fn recent_nutrition(&self) -> impl Iterator<Item = &'a NutritionEntry> + '_ {
        self.history
            .nutrition
            .iter()
            .filter(move |e| self.in_window(e.logged_on))
    }

    fn profile_facts(&self) -> Option<ProfileFacts> {
        Some(ProfileFacts {
            age: self.profile.age_years()?,
            weight_kg: self.profile.weight()?,
            height_cm: self.profile.height()?,
            activity_level: resolve_activity_level(self.profile),
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn incomplete_profile(ctx: &RuleContext<'_>) -> RuleVerdict {
    let missing = ctx.profile.missing_fields();
    if missing.is_empty() {
        return RuleVerdict::quiet(Category::IncompleteProfile);
    }

    let fields = missing.join(", ");
    RuleVerdict::fired(
        Category::IncompleteProfile,
        Severity::Moderate,
        "Complete Your Profile",
        format!(
            "Please add your {} to receive personalized health recommendations.",
            fields
        ),
    )
    .with_explanation(explain::incomplete_profile(&missing))
    .with_steps(vec![
        "Open your profile settings".to_string(),
        format!("Fill in the missing information: {}", fields),
        "Set your activity level if you know it".to_string(),
        "Save to unlock personalized insights".to_string(),
    ])
}

fn low_calorie_intake(ctx: &RuleContext<'_>) -> RuleVerdict {
    let calories: Vec<f64> = ctx.recent_nutrition().map(|e| e.calories as f64).collect();
    let Some(avg) = mean(&calories) else {
        return RuleVerdict::quiet(Category::LowCalorieIntake);
    };
    let t = ctx.thresholds;
    let days = t.window_days;

    let verdict = match ctx.targets.tdee {
        Some(target) => {
            if avg >= t.calorie_target_ratio * target {
                return RuleVerdict::quiet(Category::LowCalorieIntake);
            }
            let deficit = target - avg;
            RuleVerdict::fired(
                Category::LowCalorieIntake,
                Severity::High,
                "Low Calorie Intake Detected",
                format!(
                    "Your {}-day average is {:.0} cal/day, about {:.0} calories below your target of {:.0} cal/day.",
                    days, avg, deficit, target
                ),
            )
            .with_explanation(explain::low_calorie(avg, target, ctx.profile_facts()))
            .with_steps(vec![
                format!("Target: {:.0} calories per day", target),
                format!("Add ~{:.0} calories through healthy foods", deficit),
                "Add a healthy snack between meals (nuts, yogurt, fruit)".to_string(),
                "Include calorie-dense healthy foods (avocado, olive oil, nut butters)".to_string(),
                "Check your portion sizes, they may be smaller than you think".to_string(),
                "Talk to a nutritionist if this continues".to_string(),
            ])
        }
        None => {
            let floor = t.calorie_floor_kcal;
            if avg >= floor {
                return RuleVerdict::quiet(Category::LowCalorieIntake);
            }
            RuleVerdict::fired(
                Category::LowCalorieIntake,
                Severity::Moderate,
                "Low Calorie Intake Detected",
                format!(
                    "Your {}-day average is {:.0} cal/day, below the general minimum of {:.0} cal/day.",
                    days, avg, floor
                ),
            )
            .with_explanation(explain::low_calorie(avg, floor, None))
            .with_steps(vec![
                format!("Aim for at least {:.0} calories per day", floor),
                format!("Add ~{:.0} calories through healthy foods", floor - avg),
                "Add a healthy snack between meals (nuts, yogurt, fruit)".to_string(),
                "Complete your profile to get a personalized target".to_string(),
            ])
        }
    };

    verdict.with_provider_hint("Discuss nutrition sufficiency and fatigue/dehydration risks.")
}

fn low_protein_intake(ctx: &RuleContext<'_>) -> RuleVerdict {
    let (Some(target), Some(weight)) = (ctx.targets.protein_g, ctx.profile.weight()) else {
        return RuleVerdict::quiet(Category::LowProteinIntake);
    };
    let protein: Vec<f64> = ctx.recent_nutrition().filter_map(|e| e.protein_g).collect();
    let Some(avg) = mean(&protein) else {
        return RuleVerdict::quiet(Category::LowProteinIntake);
    };
    if avg >= ctx.thresholds.protein_target_ratio * target {
        return RuleVerdict::quiet(Category::LowProteinIntake);
    }

    let deficit = target - avg;
    RuleVerdict::fired(
        Category::LowProteinIntake,
        Severity::Moderate,
        "Increase Your Protein Intake",
        format!(
            "Your average protein intake is {:.1}g/day. Target: {:.0}g/day based on your profile.",
            avg, target
        ),
    )
    .with_explanation(explain::low_protein(
        avg,
        target,
        weight,
        resolve_activity_level(ctx.profile),
    ))
    .with_steps(vec![
        format!("Target: {:.0}g protein per day", target),
        format!("Increase by ~{:.0}g daily", deficit),
        "Add Greek yogurt to breakfast (15-20g protein)".to_string(),
        "Include lean chicken or fish at lunch (25-30g)".to_string(),
        "Snack on nuts or cheese (5-10g)".to_string(),
        "Consider a protein shake if needed (20-25g)".to_string(),
    ])
    .with_provider_hint("Review dietary protein sources; consider a dietitian referral.")
}

fn inconsistent_logging(ctx: &RuleContext<'_>) -> RuleVerdict {
    let days: BTreeSet<NaiveDate> = ctx.recent_nutrition().map(|e| e.logged_on).collect();
    let logged = days.len();
    let t = ctx.thresholds;
    if logged >= t.min_logged_days as usize {
        return RuleVerdict::quiet(Category::InconsistentLogging);
    }

    RuleVerdict::fired(
        Category::InconsistentLogging,
        Severity::Low,
        "Keep Up Your Logging Streak",
        format!(
            "You've logged meals on {} out of the last {} days. Consistency helps us give you better insights!",
            logged, t.window_days
        ),
    )
    .with_explanation(explain::inconsistent_logging(logged, t.window_days))
    .with_steps(vec![
        "Set a daily reminder on your phone to log meals".to_string(),
        "Log meals right after eating instead of at the end of the day".to_string(),
        "Start small: log just breakfast every day this week".to_string(),
        format!(
            "Goal: log at least {} out of {} days per week",
            t.window_days.saturating_sub(1).max(t.min_logged_days),
            t.window_days
        ),
    ])
}

fn activity_drop(ctx: &RuleContext<'_>) -> RuleVerdict {
    let w = ctx.window_days();
    let mid = ctx.today - Duration::days(w);
    let start = mid - Duration::days(w);

    let mut this_week: u64 = 0;
    let mut last_week: u64 = 0;
    for entry in &ctx.history.activity {
        let steps = u64::from(entry.steps);
        if entry.date > mid && entry.date <= ctx.today {
            this_week += steps;
        } else if entry.date > start && entry.date <= mid {
            last_week += steps;
        }
    }

    if last_week == 0 || (this_week as f64) >= ctx.thresholds.activity_drop_ratio * last_week as f64 {
        return RuleVerdict::quiet(Category::ActivityDrop);
    }

    RuleVerdict::fired(
        Category::ActivityDrop,
        Severity::Moderate,
        "Sharp Activity Drop",
        format!(
            "Steps fell from {} last week to {} this week.",
            last_week, this_week
        ),
    )
    .with_explanation(explain::activity_drop(this_week, last_week))
    .with_steps(vec![
        "Note anything that changed this week (illness, injury, schedule)".to_string(),
        "Add a short walk to your day".to_string(),
        "Build back up gradually rather than all at once".to_string(),
    ])
    .with_provider_hint("Explore reasons (injury/illness/schedule). Consider gentle ramp-up.")
}

fn insufficient_sleep(ctx: &RuleContext<'_>) -> RuleVerdict {
    let t = ctx.thresholds;
    let oldest = ctx.today - Duration::days(HistoryWindow::span_days(t));

    let mut recent: Vec<&SleepEntry> = ctx
        .history
        .sleep
        .iter()
        .filter(|s| s.date > oldest && s.date <= ctx.today)
        .collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    recent.truncate(t.sleep_records as usize);

    let short = recent
        .iter()
        .filter(|s| s.duration_hours() < t.short_sleep_hours)
        .count();
    if short < t.short_sleep_nights as usize {
        return RuleVerdict::quiet(Category::InsufficientSleep);
    }

    RuleVerdict::fired(
        Category::InsufficientSleep,
        Severity::Info,
        "Frequent Short Sleep",
        format!(
            "{} of your last {} nights were under {:.0} hours.",
            short,
            recent.len(),
            t.short_sleep_hours
        ),
    )
    .with_explanation(explain::insufficient_sleep(
        short,
        recent.len(),
        t.short_sleep_hours,
    ))
    .with_steps(vec![
        "Keep a consistent bedtime and wake time".to_string(),
        "Avoid screens for 30 minutes before bed".to_string(),
        "Limit caffeine after noon".to_string(),
    ])
    .with_provider_hint("Reinforce sleep hygiene; review stress/schedule factors.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealType, Sex};
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn meal(days_ago: i64, calories: u32, protein: Option<f64>) -> NutritionEntry {
        NutritionEntry {
            id: days_ago,
            user_id: 1,
            logged_on: today() - Duration::days(days_ago),
            meal_type: MealType::Lunch,
            calories,
            protein_g: protein,
            carbs_g: None,
            fat_g: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn walk(days_ago: i64, steps: u32) -> ActivityEntry {
        ActivityEntry {
            id: days_ago,
            user_id: 1,
            date: today() - Duration::days(days_ago),
            steps,
            active_minutes: None,
            distance_km: None,
            created_at: Utc::now(),
        }
    }

    fn night(days_ago: i64, hours: f64) -> SleepEntry {
        SleepEntry {
            id: days_ago,
            user_id: 1,
            date: today() - Duration::days(days_ago),
            duration_minutes: (hours * 60.0) as u32,
            quality: None,
            created_at: Utc::now(),
        }
    }

    fn no_targets() -> Targets {
        Targets::for_profile(&Profile::empty(1))
    }

    fn with_tdee(tdee: f64) -> Targets {
        Targets {
            tdee: Some(tdee),
            ..no_targets()
        }
    }

    fn complete_profile() -> Profile {
        Profile {
            age: Some(30),
            height_cm: Some(175),
            weight_kg: Some(70.0),
            sex: Some(Sex::Male),
            ..Profile::empty(1)
        }
    }

    fn run(rule: Rule, profile: &Profile, targets: &Targets, history: &HistoryWindow) -> RuleVerdict {
        let thresholds = Thresholds::default();
        let ctx = RuleContext {
            profile,
            targets,
            history,
            today: today(),
            thresholds: &thresholds,
        };
        rule.evaluate(&ctx)
    }

    fn week_of_meals(calories: u32) -> HistoryWindow {
        HistoryWindow {
            nutrition: (0..7).map(|d| meal(d, calories, None)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rule_names_round_trip() {
        for rule in Rule::all() {
            assert_eq!(rule.as_str().parse::<Rule>().unwrap(), *rule);
        }
        assert!("hydration".parse::<Rule>().is_err());
    }

    #[test]
    fn test_low_calorie_floor_fallback() {
        let profile = Profile::empty(1);
        let verdict = run(Rule::LowCalorieIntake, &profile, &no_targets(), &week_of_meals(900));
        assert!(verdict.triggered);
        assert_eq!(verdict.category, Category::LowCalorieIntake);
        assert_eq!(verdict.severity, Severity::Moderate);
        assert!(verdict.message.contains("900"));
    }

    #[test]
    fn test_low_calorie_personalized_target() {
        let profile = Profile::empty(1);
        let verdict = run(Rule::LowCalorieIntake, &profile, &with_tdee(2000.0), &week_of_meals(900));
        assert!(verdict.triggered);
        assert_eq!(verdict.severity, Severity::High);
        assert!(verdict.message.contains("about 1100 calories below your target of 2000"));
        assert_eq!(verdict.actionable_steps[0], "Target: 2000 calories per day");
        assert!(verdict.provider_hint.is_some());
    }

    #[test]
    fn test_low_calorie_target_takes_precedence_over_floor() {
        // 1600 is above 0.75 × 2000 = 1500, so no floor fallback either
        let profile = Profile::empty(1);
        let verdict = run(Rule::LowCalorieIntake, &profile, &with_tdee(2000.0), &week_of_meals(1600));
        assert!(!verdict.triggered);

        // 950 with a low target of 1200: 950 >= 900, quiet even though < 1000
        let verdict = run(Rule::LowCalorieIntake, &profile, &with_tdee(1200.0), &week_of_meals(950));
        assert!(!verdict.triggered);
    }

    #[test]
    fn test_low_calorie_ignores_entries_outside_window() {
        let history = HistoryWindow {
            nutrition: vec![meal(7, 100, None), meal(10, 100, None), meal(0, 1500, None)],
            ..Default::default()
        };
        let profile = Profile::empty(1);
        let verdict = run(Rule::LowCalorieIntake, &profile, &no_targets(), &history);
        assert!(!verdict.triggered);
    }

    #[test]
    fn test_low_calorie_no_entries_is_quiet() {
        let profile = Profile::empty(1);
        let verdict = run(Rule::LowCalorieIntake, &profile, &no_targets(), &HistoryWindow::default());
        assert!(!verdict.triggered);
    }

    #[test]
    fn test_low_protein_requires_target() {
        let history = HistoryWindow {
            nutrition: (0..7).map(|d| meal(d, 2000, Some(20.0))).collect(),
            ..Default::default()
        };
        let empty = Profile::empty(1);
        let verdict = run(Rule::LowProteinIntake, &empty, &no_targets(), &history);
        assert!(!verdict.triggered);

        let profile = complete_profile();
        let targets = Targets::for_profile(&profile);
        let verdict = run(Rule::LowProteinIntake, &profile, &targets, &history);
        assert!(verdict.triggered);
        assert_eq!(verdict.severity, Severity::Moderate);
        // 70 kg sedentary => 56 g target
        assert!(verdict.message.contains("20.0g/day"));
        assert!(verdict.message.contains("Target: 56g/day"));
    }

    #[test]
    fn test_low_protein_skips_entries_without_protein() {
        let mut nutrition: Vec<NutritionEntry> = (0..6).map(|d| meal(d, 2000, None)).collect();
        nutrition.push(meal(1, 2000, Some(60.0)));
        let history = HistoryWindow {
            nutrition,
            ..Default::default()
        };
        let profile = complete_profile();
        let targets = Targets::for_profile(&profile);
        assert!(!run(Rule::LowProteinIntake, &profile, &targets, &history).triggered);
    }

    #[test]
    fn test_inconsistent_logging_counts_distinct_days() {
        let history = HistoryWindow {
            nutrition: vec![
                meal(0, 500, None),
                meal(0, 700, None),
                meal(1, 500, None),
                meal(2, 500, None),
                meal(3, 500, None),
            ],
            ..Default::default()
        };
        let profile = complete_profile();
        let verdict = run(Rule::InconsistentLogging, &profile, &no_targets(), &history);
        assert!(verdict.triggered);
        assert_eq!(verdict.severity, Severity::Low);
        assert!(verdict.message.contains("4 out of the last 7"));

        let history = HistoryWindow {
            nutrition: (0..5).map(|d| meal(d, 500, None)).collect(),
            ..Default::default()
        };
        assert!(!run(Rule::InconsistentLogging, &profile, &no_targets(), &history).triggered);
    }

    #[test]
    fn test_incomplete_profile() {
        let profile = Profile {
            age: None,
            ..complete_profile()
        };
        let verdict = run(Rule::IncompleteProfile, &profile, &no_targets(), &HistoryWindow::default());
        assert!(verdict.triggered);
        assert_eq!(verdict.title, "Complete Your Profile");
        assert!(verdict.message.contains("age"));

        let full = complete_profile();
        assert!(!run(Rule::IncompleteProfile, &full, &no_targets(), &HistoryWindow::default()).triggered);
    }

    #[test]
    fn test_activity_drop() {
        let mut activity: Vec<ActivityEntry> = (7..14).map(|d| walk(d, 10_000)).collect();
        activity.extend((0..7).map(|d| walk(d, 3_000)));
        let history = HistoryWindow {
            activity,
            ..Default::default()
        };
        let profile = Profile::empty(1);
        let verdict = run(Rule::ActivityDrop, &profile, &no_targets(), &history);
        assert!(verdict.triggered);
        assert_eq!(verdict.severity, Severity::Moderate);
        assert!(verdict.message.contains("70000"));
        assert!(verdict.message.contains("21000"));
    }

    #[test]
    fn test_activity_drop_needs_previous_week() {
        let history = HistoryWindow {
            activity: (0..7).map(|d| walk(d, 100)).collect(),
            ..Default::default()
        };
        let profile = Profile::empty(1);
        assert!(!run(Rule::ActivityDrop, &profile, &no_targets(), &history).triggered);
    }

    #[test]
    fn test_activity_drop_boundary_is_strict() {
        // exactly 60% of last week does not fire
        let history = HistoryWindow {
            activity: vec![walk(8, 10_000), walk(1, 6_000)],
            ..Default::default()
        };
        let profile = Profile::empty(1);
        assert!(!run(Rule::ActivityDrop, &profile, &no_targets(), &history).triggered);
    }

    #[test]
    fn test_insufficient_sleep() {
        let history = HistoryWindow {
            sleep: vec![
                night(0, 4.5),
                night(1, 7.0),
                night(2, 4.0),
                night(3, 8.0),
                night(4, 3.5),
            ],
            ..Default::default()
        };
        let profile = Profile::empty(1);
        let verdict = run(Rule::InsufficientSleep, &profile, &no_targets(), &history);
        assert!(verdict.triggered);
        assert_eq!(verdict.severity, Severity::Info);
        assert!(verdict.message.starts_with("3 of your last 5"));
    }

    #[test]
    fn test_insufficient_sleep_only_recent_records_count() {
        // two short recent nights; older short nights fall outside the last five
        let history = HistoryWindow {
            sleep: vec![
                night(0, 4.0),
                night(1, 4.0),
                night(2, 8.0),
                night(3, 8.0),
                night(4, 8.0),
                night(5, 3.0),
                night(6, 3.0),
            ],
            ..Default::default()
        };
        let profile = Profile::empty(1);
        assert!(!run(Rule::InsufficientSleep, &profile, &no_targets(), &history).triggered);
    }
}
