//! crates/lingo_core/src/projection.rs
//!
//! Builds the search document for an article from relational data.
//!
//! The embedding is the expensive part of a projection. When a previously
//! indexed document is supplied and its content is byte-for-byte equal to the
//! article's, its embedding is reused instead of being recomputed.

use tracing::debug;

use crate::domain::{
    Article, DocumentV7, DocumentV8, IndexedDocument, SchemaVersion, TopicOrigin,
};
use crate::ports::{DatabaseService, DifficultyRanker, EmbeddingService, PortResult};

/// Topic titles of an article, split by provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleTopics {
    /// Space-separated titles from the legacy topic join.
    pub legacy: String,
    pub human: Vec<String>,
    pub inferred: Vec<String>,
}

/// Collects the legacy and structured topics of an article.
pub async fn find_topics(db: &dyn DatabaseService, article_id: i64) -> PortResult<ArticleTopics> {
    let legacy = db
        .get_legacy_topics(article_id)
        .await?
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string();

    let (inferred, human): (Vec<_>, Vec<_>) = db
        .get_topic_mappings(article_id)
        .await?
        .into_iter()
        .partition(|m| m.origin == TopicOrigin::Inferred);

    Ok(ArticleTopics {
        legacy,
        human: human.into_iter().map(|m| m.title).collect(),
        inferred: inferred.into_iter().map(|m| m.title).collect(),
    })
}

/// Whether a new embedding must be computed for `article`.
pub fn embedding_required(article: &Article, current: Option<&IndexedDocument>) -> bool {
    match current.and_then(|doc| doc.embedding().map(|_| doc)) {
        Some(doc) => doc.content() != article.content,
        None => true,
    }
}

/// Assembles documents in the shape chosen by `schema`.
pub struct ProjectionBuilder<'a> {
    pub schema: SchemaVersion,
    pub embedder: &'a dyn EmbeddingService,
    pub ranker: &'a dyn DifficultyRanker,
}

impl<'a> ProjectionBuilder<'a> {
    /// Builds the document for `article`. `current` is the document presently in
    /// the index, if any, and is only consulted to reuse its embedding.
    pub async fn build(
        &self,
        article: &Article,
        db: &dyn DatabaseService,
        current: Option<&IndexedDocument>,
    ) -> PortResult<IndexedDocument> {
        let topics = find_topics(db, article.id).await?;
        let lr_difficulty = self.ranker.rank(article).await?;

        let doc = match self.schema {
            SchemaVersion::V7 => {
                IndexedDocument::V7(DocumentV7 {
                    title: article.title.clone(),
                    author: article.authors.clone(),
                    content: article.content.clone(),
                    summary: article.summary.clone(),
                    word_count: article.word_count,
                    published_time: article.published_time,
                    topics: topics.legacy,
                    language: article.language.name().to_string(),
                    fk_difficulty: article.fk_difficulty,
                    lr_difficulty,
                    url: article.url.clone(),
                    video: article.video,
                })
            }
            SchemaVersion::V8 => {
                let sem_vec = match current.and_then(IndexedDocument::embedding) {
                    Some(previous) if !embedding_required(article, current) => {
                        debug!(article_id = article.id, "Content unchanged, reusing embedding");
                        previous.to_vec()
                    }
                    _ => self.embedder.embed_article(article).await?,
                };
                IndexedDocument::V8(DocumentV8 {
                    title: article.title.clone(),
                    author: article.authors.clone(),
                    content: article.content.clone(),
                    summary: article.summary.clone(),
                    word_count: article.word_count,
                    published_time: article.published_time,
                    old_topics: topics.legacy,
                    topics: topics.human,
                    topics_inferred: topics.inferred,
                    language: article.language.name().to_string(),
                    fk_difficulty: article.fk_difficulty,
                    lr_difficulty,
                    url: article.url.clone(),
                    video: article.video,
                    sem_vec,
                })
            }
        };
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, TopicMapping};
    use crate::memory::InMemoryDatabase;
    use crate::testing::{sample_article, CountingEmbedder, FixedRanker};

    fn seeded_db() -> InMemoryDatabase {
        let db = InMemoryDatabase::new();
        db.put_legacy_topics(7, vec!["Sport".to_string(), "Culture".to_string()]);
        db.put_topic_mappings(
            7,
            vec![
                TopicMapping {
                    title: "Sports".to_string(),
                    origin: TopicOrigin::Hardset,
                },
                TopicMapping {
                    title: "Health".to_string(),
                    origin: TopicOrigin::Inferred,
                },
                TopicMapping {
                    title: "Travel".to_string(),
                    origin: TopicOrigin::UrlParsed,
                },
            ],
        );
        db
    }

    #[tokio::test]
    async fn test_find_topics_splits_inferred() {
        let db = seeded_db();

        let topics = find_topics(&db, 7).await.unwrap();

        assert_eq!(topics.legacy, "Sport Culture");
        assert_eq!(topics.human, vec!["Sports", "Travel"]);
        assert_eq!(topics.inferred, vec!["Health"]);
    }

    #[tokio::test]
    async fn test_find_topics_without_mappings_is_empty() {
        let db = InMemoryDatabase::new();

        assert_eq!(find_topics(&db, 1).await.unwrap(), ArticleTopics::default());
    }

    #[tokio::test]
    async fn test_v7_document_has_flat_topics_and_no_embedding() {
        let db = seeded_db();
        let embedder = CountingEmbedder::default();
        let builder = ProjectionBuilder {
            schema: SchemaVersion::V7,
            embedder: &embedder,
            ranker: &FixedRanker(4.5),
        };

        let doc = builder.build(&sample_article(7, "Hej"), &db, None).await.unwrap();

        match doc {
            IndexedDocument::V7(doc) => {
                assert_eq!(doc.topics, "Sport Culture");
                assert_eq!(doc.lr_difficulty, 4.5);
                assert_eq!(doc.language, Language::from_code("da").unwrap().name());
            }
            other => panic!("expected a V7 document, got {:?}", other),
        }
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_v8_document_reuses_embedding_for_same_content() {
        let db = seeded_db();
        let embedder = CountingEmbedder::default();
        let builder = ProjectionBuilder {
            schema: SchemaVersion::V8,
            embedder: &embedder,
            ranker: &FixedRanker(1.0),
        };
        let article = sample_article(7, "Hej med dig");
        let mut previous = builder.build(&article, &db, None).await.unwrap();
        if let IndexedDocument::V8(doc) = &mut previous {
            doc.sem_vec = vec![0.25, 0.5];
        }

        let doc = builder.build(&article, &db, Some(&previous)).await.unwrap();

        assert_eq!(embedder.calls(), 1);
        assert_eq!(doc.embedding(), Some(&[0.25, 0.5][..]));
    }

    #[tokio::test]
    async fn test_v8_document_recomputes_embedding_for_changed_content() {
        let db = seeded_db();
        let embedder = CountingEmbedder::default();
        let builder = ProjectionBuilder {
            schema: SchemaVersion::V8,
            embedder: &embedder,
            ranker: &FixedRanker(1.0),
        };
        let previous = builder
            .build(&sample_article(7, "Hej"), &db, None)
            .await
            .unwrap();

        let doc = builder
            .build(&sample_article(7, "Hej med dig"), &db, Some(&previous))
            .await
            .unwrap();

        assert_eq!(embedder.calls(), 2);
        assert_ne!(doc.embedding(), previous.embedding());
    }

    #[test]
    fn test_embedding_required_without_previous_document() {
        assert!(embedding_required(&sample_article(1, "x"), None));
    }
}
