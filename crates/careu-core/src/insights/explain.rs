//! Explanation Generator - long-form rationale text for each insight kind
//!
//! These functions only format the numbers handed to them; they never query
//! anything. The engine stores their output as an opaque blob.

use crate::models::ActivityLevel;

fn bullets(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("• {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Profile facts quoted back to the user in explanations
#[derive(Debug, Clone, Copy)]
pub struct ProfileFacts {
    pub age: u32,
    pub weight_kg: f64,
    pub height_cm: u32,
    pub activity_level: ActivityLevel,
}

pub fn low_calorie(avg_calories: f64, target_calories: f64, facts: Option<ProfileFacts>) -> String {
    let basis = match facts {
        Some(f) => format!(
            "your recommended target of {:.0} calories per day (estimated from your profile: \
             {} years, {} kg, {} cm, {} activity level)",
            target_calories, f.age, f.weight_kg, f.height_cm, f.activity_level
        ),
        None => format!(
            "the general minimum of {:.0} calories per day we use until your profile is complete",
            target_calories
        ),
    };

    format!(
        "Over the last week you averaged {:.0} calories per day, well below {}.\n\n\
         Eating this little for a sustained period can lead to:\n\n{}\n\n\
         Your body needs enough fuel for daily activity, to keep muscle, and to stay healthy \
         in the long run.",
        avg_calories,
        basis,
        bullets(&[
            "Low energy and persistent tiredness",
            "Muscle loss as the body looks for fuel",
            "Weaker immune response and slower recovery",
            "A slower metabolism as the body adapts",
            "Gaps in essential nutrients",
            "Trouble concentrating and shifts in mood",
        ])
    )
}

pub fn low_protein(
    avg_protein: f64,
    target_protein: f64,
    weight_kg: f64,
    activity_level: ActivityLevel,
) -> String {
    let per_kg = if weight_kg > 0.0 {
        target_protein / weight_kg
    } else {
        0.0
    };

    format!(
        "You are averaging {:.1}g of protein per day, below your target of {:.0}g per day \
         ({:.1}g per kg of body weight for a {} activity level).\n\n\
         Protein matters for:\n\n{}\n\n\
         Needs rise with activity. Your target follows your weight ({} kg) and how active you are.",
        avg_protein,
        target_protein,
        per_kg,
        activity_level,
        bullets(&[
            "Building and repairing muscle after activity",
            "Immune function",
            "Healthy skin, hair and nails",
            "Making the enzymes and hormones your body relies on",
            "Feeling full between meals",
            "Keeping muscle while losing weight",
        ]),
        weight_kg
    )
}

pub fn inconsistent_logging(days_logged: usize, total_days: u32) -> String {
    format!(
        "Meals were logged on {} of the last {} days.\n\n\
         Regular tracking helps because it:\n\n{}\n\n\
         Occasional entries make it hard to see the full picture. A rough entry every day is \
         more useful than a perfect one now and then.",
        days_logged,
        total_days,
        bullets(&[
            "Shows habits you may not notice from day to day",
            "Makes it clear what is working and what is not",
            "Gives the data personalized recommendations depend on",
            "Surfaces worrying patterns early",
        ])
    )
}

pub fn incomplete_profile(missing: &[&str]) -> String {
    format!(
        "Personalized recommendations need a few basics about you. Still missing: {}.\n\n\
         With them we can:\n\n{}\n\n\
         Without this information any advice would be generic. Your profile is private and \
         only used to tailor your own insights.",
        missing.join(", "),
        bullets(&[
            "Estimate your Basal Metabolic Rate (BMR), the energy you use at rest",
            "Estimate your Total Daily Energy Expenditure (TDEE)",
            "Set calorie and protein targets that fit you",
            "Spot patterns that matter for your body specifically",
        ])
    )
}

pub fn activity_drop(this_week_steps: u64, last_week_steps: u64) -> String {
    let drop_pct = if last_week_steps > 0 {
        (1.0 - this_week_steps as f64 / last_week_steps as f64) * 100.0
    } else {
        0.0
    };
    format!(
        "Steps over the last 7 days totalled {} compared with {} the week before, a drop of \
         {:.0}%.\n\n\
         Sudden drops often follow an injury, an illness or a change in schedule. Easing back \
         in gradually is usually safer than jumping straight to the previous level.",
        this_week_steps, last_week_steps, drop_pct
    )
}

pub fn insufficient_sleep(short_nights: usize, nights_checked: usize, threshold_hours: f64) -> String {
    format!(
        "{} of your last {} recorded nights were shorter than {:.0} hours.\n\n\
         Repeated short sleep affects mood, focus, appetite and recovery. Consistent bed and \
         wake times and less screen time before bed are good places to start.",
        short_nights, nights_checked, threshold_hours
    )
}
