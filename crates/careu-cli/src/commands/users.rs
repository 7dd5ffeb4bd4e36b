//! User, profile and consent commands

use anyhow::{anyhow, Result};
use chrono::Utc;
use careu_core::models::{ActivityLevel, Profile, ProfileUpdate, Sex, User};
use careu_core::{Database, ProfileStore, Targets};

use super::resolve_user;

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Add one with:");
        println!("  careu users add <username>");
        return Ok(());
    }

    println!();
    println!("👥 Users");
    println!("   ─────────────────────────────");
    for user in users {
        println!(
            "   {:>4}  {:<20} since {}",
            user.id,
            user.username,
            user.created_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn cmd_users_add(db: &Database, username: &str) -> Result<User> {
    let user = db.create_user(username)?;
    println!("✅ Added user {} (id {})", user.username, user.id);
    println!("   Fill in the profile to unlock personalized targets:");
    println!(
        "   careu profile set {} --age <years> --height <cm> --weight <kg> --sex <male|female|other>",
        user.username
    );
    Ok(user)
}

fn load_profile(db: &Database, user: &User) -> Result<Profile> {
    db.get_profile(user.id)?
        .ok_or_else(|| anyhow!("No profile for user {}", user.username))
}

pub fn cmd_profile_show(db: &Database, user: &str) -> Result<()> {
    let user = resolve_user(db, user)?;
    let profile = load_profile(db, &user)?;

    println!();
    println!("🧑 Profile: {}", user.username);
    println!("   ─────────────────────────────");
    println!("   Age:      {}", display_or_dash(profile.age.map(|a| format!("{} years", a))));
    println!("   Height:   {}", display_or_dash(profile.height_cm.map(|h| format!("{} cm", h))));
    println!("   Weight:   {}", display_or_dash(profile.weight_kg.map(|w| format!("{:.1} kg", w))));
    println!("   Sex:      {}", display_or_dash(profile.sex.map(|s| s.to_string())));
    println!(
        "   Activity: {}",
        display_or_dash(profile.activity_level.map(|l| l.to_string()))
    );

    if profile.data_sharing_consent {
        let since = profile
            .consent_timestamp
            .map(|t| format!(" (since {})", t.format("%Y-%m-%d")))
            .unwrap_or_default();
        println!("   Sharing:  🔓 consented{}", since);
    } else {
        println!("   Sharing:  🔒 not consented");
    }

    let missing = profile.missing_fields();
    if !missing.is_empty() {
        println!();
        println!("   ⚠️  Missing: {}", missing.join(", "));
    }

    Ok(())
}

fn display_or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

/// Raw CLI profile flags, parsed into a [`ProfileUpdate`]
pub struct ProfileArgs<'a> {
    pub age: Option<u32>,
    pub height: Option<u32>,
    pub weight: Option<f64>,
    pub sex: Option<&'a str>,
    pub activity: Option<&'a str>,
}

impl ProfileArgs<'_> {
    fn into_update(self) -> Result<ProfileUpdate> {
        let sex = self
            .sex
            .map(|s| s.parse::<Sex>())
            .transpose()
            .map_err(|e| anyhow!(e))?;
        let activity_level = self
            .activity
            .map(|s| s.parse::<ActivityLevel>())
            .transpose()
            .map_err(|e| anyhow!(e))?;

        Ok(ProfileUpdate {
            age: self.age,
            height_cm: self.height,
            weight_kg: self.weight,
            sex,
            activity_level,
        })
    }
}

pub fn cmd_profile_set(db: &Database, user: &str, args: ProfileArgs<'_>) -> Result<Profile> {
    let user = resolve_user(db, user)?;
    let update = args.into_update()?;
    let profile = db.update_profile(user.id, &update)?;

    db.log_audit("cli", "update", Some("profile"), Some(user.id), None)?;

    println!("✅ Updated profile for {}", user.username);
    let missing = profile.missing_fields();
    if missing.is_empty() {
        let targets = Targets::for_profile(&profile);
        if let (Some(tdee), Some(protein)) = (targets.tdee, targets.protein_g) {
            println!("   🎯 Targets: {:.0} kcal/day, {:.1} g protein/day", tdee, protein);
        }
    } else {
        println!("   ⚠️  Still missing: {}", missing.join(", "));
    }

    Ok(profile)
}

pub fn cmd_consent(db: &Database, user: &str, grant: bool) -> Result<Profile> {
    let user = resolve_user(db, user)?;
    let profile = db.set_consent(user.id, grant, Utc::now())?;

    let action = if grant { "consent_grant" } else { "consent_revoke" };
    db.log_audit("cli", action, Some("profile"), Some(user.id), None)?;

    if grant {
        println!("🔓 {} now shares data with providers", user.username);
    } else {
        println!("🔒 {} no longer shares data with providers", user.username);
    }

    Ok(profile)
}
