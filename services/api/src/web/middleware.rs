//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use lingo_core::ports::PortError;
use lingo_core::sessions;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::web::state::{AppState, AuthUser};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "chocolatechip";

#[derive(Deserialize)]
struct SessionQuery {
    session: Option<String>,
}

/// Finds the session token in the `session` query parameter or, failing
/// that, in the session cookie.
pub fn session_token(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let from_query = Query::<SessionQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.session)
        .filter(|token| !token.is_empty());
    from_query.or_else(|| {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())?
            .split(';')
            .find_map(|c| c.trim().strip_prefix(&format!("{}=", SESSION_COOKIE)).map(str::to_string))
            .filter(|token| !token.is_empty())
    })
}

/// Middleware that validates the session and extracts the user.
///
/// A valid session has its last-use time refreshed, and the caller is
/// inserted into request extensions as an `AuthUser`. Missing, unknown or
/// expired sessions get 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the session token
    let token = session_token(req.uri(), req.headers())
        .ok_or_else(|| ApiError::Unauthorized("No session given".to_string()))?;

    // 2. Validate the session in the database, get the user
    let user = sessions::validate(state.db.as_ref(), &token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => {
                debug!("Rejected invalid or expired session");
                ApiError::Unauthorized("Invalid or expired session".to_string())
            }
            other => {
                error!("Failed to validate session: {:?}", other);
                ApiError::Port(other)
            }
        })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser {
        user,
        session: token,
    });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
