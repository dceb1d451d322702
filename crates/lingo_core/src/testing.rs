//! Fakes for the collaborator ports, shared by the unit tests of this crate
//! and, through the `testing` feature, by the service's integration tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{Article, Language};
use crate::ports::{DifficultyRanker, EmbeddingService, PortResult};

pub fn sample_article(id: i64, content: &str) -> Article {
    Article {
        id,
        title: format!("Article {}", id),
        content: content.to_string(),
        summary: "A short summary".to_string(),
        authors: "Jens Hansen".to_string(),
        word_count: content.split_whitespace().count() as i32,
        published_time: None,
        language: Language::from_code("da").unwrap(),
        fk_difficulty: 42,
        url: format!("https://example.com/articles/{}", id),
        video: false,
    }
}

/// Deterministic embedder that counts how often it is called.
#[derive(Default)]
pub struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for CountingEmbedder {
    async fn embed_article(&self, article: &Article) -> PortResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            article.content.len() as f32,
            article.content.split_whitespace().count() as f32,
        ])
    }
}

pub struct FixedRanker(pub f64);

#[async_trait]
impl DifficultyRanker for FixedRanker {
    async fn rank(&self, _article: &Article) -> PortResult<f64> {
        Ok(self.0)
    }
}
