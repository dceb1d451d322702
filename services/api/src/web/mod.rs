pub mod articles;
pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod user;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
pub use middleware::require_auth;
pub use state::{AppState, AuthUser};

/// Builds the API router: public session routes plus the routes that
/// require a valid session.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = HeaderValue::from_str(&app_state.config.cors_origin).map_err(|e| {
        ApiError::Internal(format!(
            "Invalid CORS origin '{}': {}",
            app_state.config.cors_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/session/{email}", post(auth::login_handler))
        .route("/get_anon_session/{uuid}", post(auth::anon_login_handler))
        .route("/add_user/{email}", post(auth::signup_handler))
        .route("/is_up", get(auth::is_up_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/validate", get(auth::validate_handler))
        .route("/logout_session", get(auth::logout_handler))
        .route("/learned_language", get(user::learned_language_handler))
        .route(
            "/learned_language/{code}",
            post(user::set_learned_language_handler),
        )
        .route("/native_language", get(user::native_language_handler))
        .route(
            "/native_language/{code}",
            post(user::set_native_language_handler),
        )
        .route(
            "/learned_and_native_language",
            get(user::learned_and_native_language_handler),
        )
        .route("/get_user_details", get(user::user_details_handler))
        .route("/user_settings", post(user::user_settings_handler))
        .route("/user_preferences", get(user::preferences_handler))
        .route("/save_user_preferences", post(user::save_preferences_handler))
        .route("/send_feedback", post(user::send_feedback_handler))
        .route("/index_article/{id}", post(articles::index_article_handler))
        .route(
            "/remove_article_from_index/{id}",
            post(articles::remove_article_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Ok(Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state))
}
