//! crates/lingo_core/src/profile.rs
//!
//! Reads and mutations of a user's profile: languages, proficiency, name,
//! email and free-form preferences. Every mutation validates all of its input
//! before touching the user, then saves the user once.

use tracing::info;

use crate::domain::{CefrLevel, Language, User};
use crate::ports::{DatabaseService, FeedbackMailer, PortError, PortResult, Preferences};

/// Fields submitted to the settings form. Empty strings count as "not submitted".
#[derive(Debug, Clone, Default)]
pub struct UserSettings {
    pub name: Option<String>,
    pub email: Option<String>,
    pub native_language: Option<String>,
    pub learned_language: Option<String>,
    pub cefr_level: Option<String>,
}

fn parse_language(code: &str) -> PortResult<Language> {
    Language::from_code(code)
        .ok_or_else(|| PortError::Validation(format!("Unknown language code '{}'", code)))
}

fn parse_cefr_level(level: &str) -> PortResult<CefrLevel> {
    level.parse::<CefrLevel>().map_err(PortError::Validation)
}

fn submitted(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn set_native_language(
    db: &dyn DatabaseService,
    user_id: i64,
    code: &str,
) -> PortResult<()> {
    let language = parse_language(code)?;
    let mut user = db.get_user_by_id(user_id).await?;
    user.native_language = language;
    db.save_user(&user).await
}

/// Sets the learned language. A submitted level replaces the stored one.
pub async fn set_learned_language(
    db: &dyn DatabaseService,
    user_id: i64,
    code: &str,
    cefr_level: Option<&str>,
) -> PortResult<()> {
    let language = parse_language(code)?;
    let level = cefr_level.map(parse_cefr_level).transpose()?;
    let mut user = db.get_user_by_id(user_id).await?;
    user.learned_language = language;
    if level.is_some() {
        user.cefr_level = level;
    }
    db.save_user(&user).await
}

/// Applies the settings form. `cefr_level` is mandatory; if any field is
/// invalid nothing is applied.
pub async fn apply_settings(
    db: &dyn DatabaseService,
    user_id: i64,
    settings: &UserSettings,
) -> PortResult<User> {
    let cefr_level = submitted(&settings.cefr_level)
        .ok_or_else(|| PortError::Validation("cefr_level is required".to_string()))
        .and_then(parse_cefr_level)?;
    let native = submitted(&settings.native_language)
        .map(parse_language)
        .transpose()?;
    let learned = submitted(&settings.learned_language)
        .map(parse_language)
        .transpose()?;
    let email = submitted(&settings.email);
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(PortError::Validation(format!("Invalid email '{}'", email)));
        }
    }

    let mut user = db.get_user_by_id(user_id).await?;
    if let Some(name) = submitted(&settings.name) {
        user.name = name.to_string();
    }
    if let Some(native) = native {
        user.native_language = native;
    }
    // The level travels with the learned language, as in set_learned_language.
    if let Some(learned) = learned {
        user.learned_language = learned;
        user.cefr_level = Some(cefr_level);
    }
    if let Some(email) = email {
        user.email = email.to_string();
    }
    db.save_user(&user).await?;
    info!(user_id, "Updated user settings");
    Ok(user)
}

pub async fn preferences(db: &dyn DatabaseService, user_id: i64) -> PortResult<Preferences> {
    Ok(db.get_user_by_id(user_id).await?.preferences)
}

/// Merges `updates` into the stored preferences. Keys must be non-empty.
pub async fn save_preferences(
    db: &dyn DatabaseService,
    user_id: i64,
    updates: Preferences,
) -> PortResult<()> {
    if updates.keys().any(|k| k.trim().is_empty()) {
        return Err(PortError::Validation("Preference keys must not be empty".to_string()));
    }
    let mut user = db.get_user_by_id(user_id).await?;
    user.preferences.extend(updates);
    db.save_user(&user).await
}

pub async fn send_feedback(
    db: &dyn DatabaseService,
    mailer: &dyn FeedbackMailer,
    user_id: i64,
    message: &str,
    context: &str,
) -> PortResult<()> {
    let user = db.get_user_by_id(user_id).await?;
    mailer.send_feedback("Feedback", context, message, &user).await
}
