//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request identity.

use crate::config::Config;
use lingo_core::domain::User;
use lingo_core::ports::{
    DatabaseService, DifficultyRanker, EmbeddingService, FeedbackMailer, IndexResult, SearchIndex,
};
use lingo_core::sync::SearchIndexSynchronizer;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub search: Arc<dyn SearchIndex>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub ranker: Arc<dyn DifficultyRanker>,
    pub mailer: Arc<dyn FeedbackMailer>,
}

impl AppState {
    /// Creates a synchronizer for the configured index. The server's schema
    /// version is looked up once per call.
    pub async fn synchronizer(&self) -> IndexResult<SearchIndexSynchronizer> {
        SearchIndexSynchronizer::connect(
            self.search.clone(),
            self.embedder.clone(),
            self.ranker.clone(),
            &self.config.es_index,
        )
        .await
    }
}

//=========================================================================================
// AuthUser (Specific to One Request)
//=========================================================================================

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: String,
}
