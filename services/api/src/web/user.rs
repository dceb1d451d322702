//! services/api/src/web/user.rs
//!
//! Profile endpoints for the user in session.

use axum::{
    extract::{Path, Query, State},
    Extension, Form, Json,
};
use lingo_core::profile::{self, UserSettings};
use lingo_core::ports::Preferences;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::{AppState, AuthUser};

#[derive(Serialize, ToSchema)]
pub struct LanguagesResponse {
    pub native: String,
    pub learned: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserDetails {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub native_language: String,
    pub learned_language: String,
    pub cefr_level: Option<i16>,
}

#[derive(Deserialize, ToSchema)]
pub struct SettingsForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub native_language: Option<String>,
    pub learned_language: Option<String>,
    pub cefr_level: Option<String>,
}

#[derive(Deserialize)]
pub struct LearnedLanguageQuery {
    pub cefr_level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct FeedbackForm {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
}

/// GET /learned_language
pub async fn learned_language_handler(Extension(auth): Extension<AuthUser>) -> String {
    auth.user.learned_language.code().to_string()
}

/// POST /learned_language/{code}?cefr_level=
pub async fn set_learned_language_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
    Query(form): Query<LearnedLanguageQuery>,
) -> Result<&'static str, ApiError> {
    let level = form.cefr_level.as_deref().filter(|l| !l.trim().is_empty());
    profile::set_learned_language(state.db.as_ref(), auth.user.id, &code, level).await?;
    Ok("OK")
}

/// GET /native_language
pub async fn native_language_handler(Extension(auth): Extension<AuthUser>) -> String {
    auth.user.native_language.code().to_string()
}

/// POST /native_language/{code}
pub async fn set_native_language_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<&'static str, ApiError> {
    profile::set_native_language(state.db.as_ref(), auth.user.id, &code).await?;
    Ok("OK")
}

/// GET /learned_and_native_language
#[utoipa::path(
    get,
    path = "/learned_and_native_language",
    params(("session" = String, Query, description = "Session token")),
    responses((status = 200, description = "Both languages of the user", body = LanguagesResponse))
)]
pub async fn learned_and_native_language_handler(
    Extension(auth): Extension<AuthUser>,
) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        native: auth.user.native_language.code().to_string(),
        learned: auth.user.learned_language.code().to_string(),
    })
}

/// GET /get_user_details
#[utoipa::path(
    get,
    path = "/get_user_details",
    params(("session" = String, Query, description = "Session token")),
    responses((status = 200, description = "Profile of the user in session", body = UserDetails))
)]
pub async fn user_details_handler(Extension(auth): Extension<AuthUser>) -> Json<UserDetails> {
    let user = auth.user;
    Json(UserDetails {
        id: user.id,
        email: user.email,
        name: user.name,
        native_language: user.native_language.code().to_string(),
        learned_language: user.learned_language.code().to_string(),
        cefr_level: user.cefr_level.map(|level| level.rank()),
    })
}

/// POST /user_settings
#[utoipa::path(
    post,
    path = "/user_settings",
    params(("session" = String, Query, description = "Session token")),
    request_body(content = SettingsForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Settings saved", body = String),
        (status = 400, description = "cefr_level missing or a field is invalid")
    )
)]
pub async fn user_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Form(form): Form<SettingsForm>,
) -> Result<&'static str, ApiError> {
    let settings = UserSettings {
        name: form.name,
        email: form.email,
        native_language: form.native_language,
        learned_language: form.learned_language,
        cefr_level: form.cefr_level,
    };
    profile::apply_settings(state.db.as_ref(), auth.user.id, &settings).await?;
    Ok("OK")
}

/// GET /user_preferences
pub async fn preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Preferences>, ApiError> {
    Ok(Json(profile::preferences(state.db.as_ref(), auth.user.id).await?))
}

/// POST /save_user_preferences - every submitted form field is stored as a preference
pub async fn save_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Form(form): Form<Preferences>,
) -> Result<&'static str, ApiError> {
    profile::save_preferences(state.db.as_ref(), auth.user.id, form).await?;
    Ok("OK")
}

/// POST /send_feedback
pub async fn send_feedback_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Form(form): Form<FeedbackForm>,
) -> Result<&'static str, ApiError> {
    profile::send_feedback(
        state.db.as_ref(),
        state.mailer.as_ref(),
        auth.user.id,
        &form.message,
        &form.context,
    )
    .await?;
    Ok("OK")
}
