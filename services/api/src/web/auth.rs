//! services/api/src/web/auth.rs
//!
//! Session endpoints: login, anonymous login, account creation, validation
//! and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Extension, Form, Json,
};
use chrono::Duration;
use lingo_core::domain::{Language, NewUser, MAX_SESSION_IDLE_DAYS};
use lingo_core::ports::PortError;
use lingo_core::sessions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::SESSION_COOKIE;
use crate::web::state::{AppState, AuthUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PasswordForm {
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SignupForm {
    pub password: Option<String>,
    pub username: Option<String>,
    pub native_language: Option<String>,
    pub learned_language: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub session: String,
}

//=========================================================================================
// Password Hashing
//=========================================================================================

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        Duration::days(MAX_SESSION_IDLE_DAYS).num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /session/{email} - Log in with email and password
#[utoipa::path(
    post,
    path = "/session/{email}",
    params(("email" = String, Path, description = "Account email")),
    request_body(content = PasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Missing password, unknown account or invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    Form(form): Form<PasswordForm>,
) -> Result<impl IntoResponse, ApiError> {
    let password = form.password.unwrap_or_default();
    if password.is_empty() {
        return Err(ApiError::Unauthorized("Password not given".to_string()));
    }

    // 1. Get user by email
    let creds = match state.db.get_credentials_by_email(&email).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Unauthorized(
                "There is no account associated with this email".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    if !verify_password(&password, &creds.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    // 3. Create the session
    let session = sessions::create_session(state.db.as_ref(), creds.user_id).await?;
    info!(user_id = creds.user_id, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&session.uuid))],
        Json(SessionResponse {
            session: session.uuid,
        }),
    ))
}

/// POST /get_anon_session/{uuid} - Log in to an anonymous account
#[utoipa::path(
    post,
    path = "/get_anon_session/{uuid}",
    params(("uuid" = String, Path, description = "Anonymous account id")),
    request_body(content = PasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Session token", body = String),
        (status = 400, description = "Password missing"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn anon_login_handler(
    State(state): State<Arc<AppState>>,
    Path(anon_uuid): Path<String>,
    Form(form): Form<PasswordForm>,
) -> Result<String, ApiError> {
    let password = form
        .password
        .ok_or_else(|| ApiError::BadRequest("password is required".to_string()))?;

    let creds = match state.db.get_credentials_by_anon_uuid(&anon_uuid).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&password, &creds.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let session = sessions::create_session(state.db.as_ref(), creds.user_id).await?;
    Ok(session.uuid)
}

/// POST /add_user/{email} - Create an account and log in
#[utoipa::path(
    post,
    path = "/add_user/{email}",
    params(("email" = String, Path, description = "Account email")),
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Session token", body = String),
        (status = 400, description = "Missing field, unknown language or email taken")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
    Form(form): Form<SignupForm>,
) -> Result<String, ApiError> {
    let required = |value: Option<String>, field: &str| {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("{} is required", field)))
    };
    let password = required(form.password, "password")?;
    let name = required(form.username, "username")?;
    let learned_code = required(form.learned_language, "learned_language")?;
    let native_code = form.native_language.unwrap_or_else(|| "en".to_string());

    let language = |code: &str| {
        Language::from_code(code)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown language code '{}'", code)))
    };
    let new_user = NewUser {
        email,
        name,
        password_hash: hash_password(&password)?,
        native_language: language(&native_code)?,
        learned_language: language(&learned_code)?,
    };

    let user = state.db.create_user(new_user).await?;
    info!(user_id = user.id, "Created account");
    let session = sessions::create_session(state.db.as_ref(), user.id).await?;
    Ok(session.uuid)
}

/// GET /validate - OK if the session is valid
#[utoipa::path(
    get,
    path = "/validate",
    params(("session" = String, Query, description = "Session token")),
    responses(
        (status = 200, description = "Session is valid", body = String),
        (status = 401, description = "Missing, unknown or expired session")
    )
)]
pub async fn validate_handler() -> &'static str {
    // require_auth has already validated and refreshed the session.
    "OK"
}

/// GET /is_up - Liveness probe
pub async fn is_up_handler() -> &'static str {
    "OK"
}

/// GET /logout_session - Invalidate the caller's session
#[utoipa::path(
    get,
    path = "/logout_session",
    params(("session" = String, Query, description = "Session token")),
    responses(
        (status = 200, description = "Logout successful", body = String),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    sessions::invalidate(state.db.as_ref(), &auth.session)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => ApiError::Unauthorized("No active session".to_string()),
            other => other.into(),
        })?;
    info!(user_id = auth.user.id, "User logged out");

    let cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    Ok(([(header::SET_COOKIE, cookie)], "OK"))
}
