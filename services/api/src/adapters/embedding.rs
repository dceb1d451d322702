//! services/api/src/adapters/embedding.rs
//!
//! Client for the semantic vector service that computes article embeddings.

use async_trait::async_trait;
use lingo_core::domain::Article;
use lingo_core::ports::{EmbeddingService, PortError, PortResult};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

pub struct SemanticVectorAdapter {
    client: Client,
    base_url: String,
}

impl SemanticVectorAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    article_content: &'a str,
    article_language: &'a str,
}

#[async_trait]
impl EmbeddingService for SemanticVectorAdapter {
    async fn embed_article(&self, article: &Article) -> PortResult<Vec<f32>> {
        debug!(article_id = article.id, "Requesting article embedding");
        let request = EmbeddingRequest {
            article_content: &article.content,
            article_language: article.language.name(),
        };
        let response = self
            .client
            .post(format!("{}/get_article_embedding", self.base_url))
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PortError::Unexpected(format!("Embedding service: {}", e)))?;

        let embedding: Vec<f32> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Embedding service: {}", e)))?;
        if embedding.is_empty() {
            return Err(PortError::Unexpected(
                "Embedding service returned an empty vector".to_string(),
            ));
        }
        Ok(embedding)
    }
}
