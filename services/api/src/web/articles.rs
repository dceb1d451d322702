//! services/api/src/web/articles.rs
//!
//! Endpoints that push article changes to the search index.
//!
//! The index is rebuildable from the database, so synchronization failures
//! are logged and never turned into an error response.

use axum::extract::{Path, State};
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::AppState;

/// POST /index_article/{id} - Rebuild the article's search document
#[utoipa::path(
    post,
    path = "/index_article/{id}",
    params(
        ("id" = i64, Path, description = "Article id"),
        ("session" = String, Query, description = "Session token")
    ),
    responses(
        (status = 200, description = "Synchronization attempted", body = String),
        (status = 404, description = "No such article")
    )
)]
pub async fn index_article_handler(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
) -> Result<&'static str, ApiError> {
    let article = state.db.get_article(article_id).await?;

    match state.synchronizer().await {
        // upsert logs its own failures
        Ok(sync) => {
            sync.upsert(&article, state.db.as_ref()).await;
        }
        Err(e) => warn!(article_id, "Search index unavailable: {}", e),
    }
    Ok("OK")
}

/// POST /remove_article_from_index/{id} - Drop the article's search document
#[utoipa::path(
    post,
    path = "/remove_article_from_index/{id}",
    params(
        ("id" = i64, Path, description = "Article id"),
        ("session" = String, Query, description = "Session token")
    ),
    responses(
        (status = 200, description = "Removal attempted", body = String),
        (status = 404, description = "No such article")
    )
)]
pub async fn remove_article_handler(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
) -> Result<&'static str, ApiError> {
    let article = state.db.get_article(article_id).await?;

    let result = match state.synchronizer().await {
        Ok(sync) => sync.remove(&article).await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(article_id, "Failed to remove article from the index: {}", e);
    }
    Ok("OK")
}
