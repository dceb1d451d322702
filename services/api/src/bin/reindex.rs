//! services/api/src/bin/reindex.rs
//!
//! Rebuilds the search index from the database through the bulk API.
//! Articles that fail are logged and skipped; the run always finishes.

use lingo_api::{
    adapters::{DbAdapter, ElasticsearchAdapter, LixRanker, SemanticVectorAdapter},
    config::Config,
    error::ApiError,
    init_tracing,
};
use lingo_core::sync::SearchIndexSynchronizer;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    init_tracing(config.log_level);

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let db = DbAdapter::new(db_pool);

    let http = reqwest::Client::new();
    let sync = SearchIndexSynchronizer::connect(
        Arc::new(ElasticsearchAdapter::new(http.clone(), &config.es_url)),
        Arc::new(SemanticVectorAdapter::new(http, &config.embedding_url)),
        Arc::new(LixRanker),
        &config.es_index,
    )
    .await?;
    info!(
        index = sync.index_name(),
        schema = ?sync.schema(),
        batch_size = config.reindex_batch_size,
        "Starting reindex"
    );

    let summary = sync.reindex_all(&db, config.reindex_batch_size).await?;
    info!(
        submitted = summary.submitted,
        failed = summary.failed,
        "Reindex finished"
    );
    Ok(())
}
