//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::{articles, auth, user};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::anon_login_handler,
        auth::signup_handler,
        auth::validate_handler,
        auth::logout_handler,
        user::learned_and_native_language_handler,
        user::user_details_handler,
        user::user_settings_handler,
        articles::index_article_handler,
        articles::remove_article_handler,
    ),
    components(
        schemas(
            auth::PasswordForm,
            auth::SignupForm,
            auth::SessionResponse,
            user::LanguagesResponse,
            user::UserDetails,
            user::SettingsForm,
        )
    ),
    tags(
        (name = "Lingo API", description = "Sessions, user profiles and article search synchronization.")
    )
)]
pub struct ApiDoc;
