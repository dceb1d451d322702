//! crates/lingo_core/src/sync.rs
//!
//! Mirrors relational articles into the search index.
//!
//! The index is a disposable cache that can always be rebuilt from the
//! database, so a failure to synchronize one article is logged and reported,
//! never propagated in a way that would stop a batch.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Article, BulkInstruction, BulkOperation, IndexedDocument, SchemaVersion};
use crate::ports::{
    DatabaseService, DifficultyRanker, EmbeddingService, IndexError, IndexResult, SearchIndex,
};
use crate::projection::ProjectionBuilder;

/// Result of a single-article write that must not abort its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The document was written. `replaced` tells whether an older one existed.
    Indexed { replaced: bool },
    /// The article was left out of the index; the error has been logged.
    Skipped(IndexError),
}

impl UpsertOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, UpsertOutcome::Indexed { .. })
    }
}

/// Totals of a full reindex run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexSummary {
    pub submitted: usize,
    pub failed: usize,
}

/// Writes article projections to one index, using the schema of that index's
/// server. The schema is detected once, when the synchronizer is created.
pub struct SearchIndexSynchronizer {
    index: Arc<dyn SearchIndex>,
    embedder: Arc<dyn EmbeddingService>,
    ranker: Arc<dyn DifficultyRanker>,
    index_name: String,
    schema: SchemaVersion,
}

impl SearchIndexSynchronizer {
    /// Asks the server for its version and picks the matching document schema.
    pub async fn connect(
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn EmbeddingService>,
        ranker: Arc<dyn DifficultyRanker>,
        index_name: &str,
    ) -> IndexResult<Self> {
        let version = index.server_version().await?;
        let schema = SchemaVersion::from_server_version(&version).ok_or_else(|| {
            IndexError::Permanent(format!("Unrecognised search server version '{}'", version))
        })?;
        debug!(%version, ?schema, "Detected search index schema");
        if schema == SchemaVersion::V7 {
            warn!(
                %version,
                index = index_name,
                "Search index is version 7, using the old document schema"
            );
        }
        Ok(Self::with_schema(index, embedder, ranker, index_name, schema))
    }

    pub fn with_schema(
        index: Arc<dyn SearchIndex>,
        embedder: Arc<dyn EmbeddingService>,
        ranker: Arc<dyn DifficultyRanker>,
        index_name: &str,
        schema: SchemaVersion,
    ) -> Self {
        Self {
            index,
            embedder,
            ranker,
            index_name: index_name.to_string(),
            schema,
        }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn builder(&self) -> ProjectionBuilder<'_> {
        ProjectionBuilder {
            schema: self.schema,
            embedder: self.embedder.as_ref(),
            ranker: self.ranker.as_ref(),
        }
    }

    /// Fetches the stored document. The outer `bool` is whether anything is
    /// stored at all; a body in another schema is reported as unusable (`None`).
    async fn current_document(&self, id: i64) -> IndexResult<(bool, Option<IndexedDocument>)> {
        let Some(source) = self.index.get(&self.index_name, id).await? else {
            return Ok((false, None));
        };
        match IndexedDocument::from_json(self.schema, source) {
            Ok(doc) => Ok((true, Some(doc))),
            Err(e) => {
                warn!(article_id = id, "Ignoring stored document in unexpected shape: {}", e);
                Ok((true, None))
            }
        }
    }

    /// Rebuilds the article's document and replaces the stored one.
    ///
    /// The stored document is read first so an unchanged article keeps its
    /// embedding. Failures are logged and returned as `Skipped`.
    pub async fn upsert(&self, article: &Article, db: &dyn DatabaseService) -> UpsertOutcome {
        match self.try_upsert(article, db).await {
            Ok(replaced) => {
                info!(article_id = article.id, replaced, "Indexed article");
                UpsertOutcome::Indexed { replaced }
            }
            Err(e) => {
                warn!(
                    article_id = article.id,
                    retryable = e.is_retryable(),
                    "Failed to index article: {}",
                    e
                );
                UpsertOutcome::Skipped(e)
            }
        }
    }

    async fn try_upsert(&self, article: &Article, db: &dyn DatabaseService) -> IndexResult<bool> {
        let (exists, current) = self.current_document(article.id).await?;
        let doc = self.builder().build(article, db, current.as_ref()).await?;

        if exists {
            match self.index.delete(&self.index_name, article.id).await {
                Ok(()) | Err(IndexError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        self.index
            .index(&self.index_name, article.id, doc.to_json()?)
            .await?;
        Ok(exists)
    }

    /// Indexes a newly crawled article without looking at what is stored.
    pub async fn index_new(&self, article: &Article, db: &dyn DatabaseService) -> UpsertOutcome {
        match self.try_index_new(article, db).await {
            Ok(()) => UpsertOutcome::Indexed { replaced: false },
            Err(e) => {
                warn!(article_id = article.id, "Failed to index new article: {}", e);
                UpsertOutcome::Skipped(e)
            }
        }
    }

    async fn try_index_new(&self, article: &Article, db: &dyn DatabaseService) -> IndexResult<()> {
        let doc = self.builder().build(article, db, None).await?;
        self.index
            .index(&self.index_name, article.id, doc.to_json()?)
            .await
    }

    /// Builds a bulk-API entry for the article: `update` when a document is
    /// already stored, `create` otherwise. Only reads from the index.
    pub async fn upsert_for_bulk(
        &self,
        article: &Article,
        db: &dyn DatabaseService,
    ) -> IndexResult<BulkInstruction> {
        let (exists, current) = self.current_document(article.id).await?;
        let doc = self
            .builder()
            .build(article, db, current.as_ref())
            .await?
            .to_json()?;

        let (operation, payload) = if exists {
            (BulkOperation::Update, json!({ "doc": doc }))
        } else {
            (BulkOperation::Create, doc)
        };
        Ok(BulkInstruction {
            id: article.id,
            index: self.index_name.clone(),
            operation,
            payload,
        })
    }

    /// Deletes the article's document. Returns whether one was there.
    pub async fn remove(&self, article: &Article) -> IndexResult<bool> {
        if !self.index.exists(&self.index_name, article.id).await? {
            return Ok(false);
        }
        match self.index.delete(&self.index_name, article.id).await {
            Ok(()) => {
                info!(article_id = article.id, "Removed article from the index");
                Ok(true)
            }
            Err(IndexError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn submit_bulk(&self, instructions: &[BulkInstruction]) -> IndexResult<()> {
        if instructions.is_empty() {
            return Ok(());
        }
        self.index.bulk(instructions).await
    }

    /// Rebuilds the index for every article, `batch_size` articles per bulk
    /// request. Articles that fail are counted and skipped.
    pub async fn reindex_all(
        &self,
        db: &dyn DatabaseService,
        batch_size: usize,
    ) -> IndexResult<ReindexSummary> {
        let mut summary = ReindexSummary::default();
        let mut after = 0;
        let limit = i64::try_from(batch_size.max(1)).unwrap_or(i64::MAX);

        loop {
            let ids = db.list_article_ids(after, limit).await?;
            let Some(&last) = ids.last() else {
                break;
            };
            after = last;

            let mut batch = Vec::with_capacity(ids.len());
            for id in ids {
                let instruction = match db.get_article(id).await {
                    Ok(article) => self.upsert_for_bulk(&article, db).await,
                    Err(e) => Err(e.into()),
                };
                match instruction {
                    Ok(instruction) => batch.push(instruction),
                    Err(e) => {
                        warn!(article_id = id, "Skipping article: {}", e);
                        summary.failed += 1;
                    }
                }
            }

            match self.submit_bulk(&batch).await {
                Ok(()) => summary.submitted += batch.len(),
                Err(e) => {
                    warn!(count = batch.len(), "Bulk request failed: {}", e);
                    summary.failed += batch.len();
                }
            }
            info!(after, submitted = summary.submitted, failed = summary.failed, "Reindex progress");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDatabase, InMemorySearchIndex};
    use crate::testing::{sample_article, CountingEmbedder, FixedRanker};

    const INDEX: &str = "zeeguu";

    struct Fixture {
        db: InMemoryDatabase,
        index: Arc<InMemorySearchIndex>,
        embedder: Arc<CountingEmbedder>,
        sync: SearchIndexSynchronizer,
    }

    async fn fixture(version: &str) -> Fixture {
        let index = Arc::new(InMemorySearchIndex::new(version));
        let embedder = Arc::new(CountingEmbedder::default());
        let sync = SearchIndexSynchronizer::connect(
            index.clone(),
            embedder.clone(),
            Arc::new(FixedRanker(2.0)),
            INDEX,
        )
        .await
        .unwrap();
        Fixture {
            db: InMemoryDatabase::new(),
            index,
            embedder,
            sync,
        }
    }

    fn stored_embedding(f: &Fixture, id: i64) -> serde_json::Value {
        f.index.document(INDEX, id).unwrap()["sem_vec"].clone()
    }

    #[tokio::test]
    async fn test_connect_detects_schema() {
        assert_eq!(fixture("7.17.9").await.sync.schema(), SchemaVersion::V7);
        assert_eq!(fixture("8.11.1").await.sync.schema(), SchemaVersion::V8);
    }

    #[tokio::test]
    async fn test_connect_rejects_garbage_version() {
        let result = SearchIndexSynchronizer::connect(
            Arc::new(InMemorySearchIndex::new("unknown")),
            Arc::new(CountingEmbedder::default()),
            Arc::new(FixedRanker(0.0)),
            INDEX,
        )
        .await;

        assert!(matches!(result, Err(IndexError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_upsert_unchanged_content_reuses_embedding() {
        let f = fixture("8.11.1").await;
        let article = sample_article(1, "En lille historie");

        assert_eq!(
            f.sync.upsert(&article, &f.db).await,
            UpsertOutcome::Indexed { replaced: false }
        );
        let first = stored_embedding(&f, 1);
        assert_eq!(
            f.sync.upsert(&article, &f.db).await,
            UpsertOutcome::Indexed { replaced: true }
        );

        assert_eq!(f.embedder.calls(), 1);
        assert_eq!(stored_embedding(&f, 1), first);
    }

    #[tokio::test]
    async fn test_upsert_changed_content_recomputes_embedding() {
        let f = fixture("8.11.1").await;
        f.sync
            .upsert(&sample_article(1, "En lille historie"), &f.db)
            .await;
        let first = stored_embedding(&f, 1);

        f.sync
            .upsert(&sample_article(1, "En meget længere lille historie"), &f.db)
            .await;

        assert_eq!(f.embedder.calls(), 2);
        assert_ne!(stored_embedding(&f, 1), first);
    }

    #[tokio::test]
    async fn test_upsert_failure_is_swallowed_and_classified() {
        let f = fixture("8.11.1").await;
        f.index
            .fail_writes_with(IndexError::TransientIo("connection reset".to_string()));

        let outcome = f.sync.upsert(&sample_article(1, "Tekst"), &f.db).await;

        match outcome {
            UpsertOutcome::Skipped(e) => assert!(e.is_retryable()),
            other => panic!("expected a skipped upsert, got {:?}", other),
        }
        assert!(f.index.is_empty());
    }

    #[tokio::test]
    async fn test_index_new_writes_document() {
        let f = fixture("7.10.0").await;

        let outcome = f.sync.index_new(&sample_article(3, "Tekst"), &f.db).await;

        assert!(outcome.is_indexed());
        let doc = f.index.document(INDEX, 3).unwrap();
        assert!(doc.get("sem_vec").is_none());
        assert_eq!(f.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_remove_absent_document_is_noop() {
        let f = fixture("8.11.1").await;

        assert_eq!(f.sync.remove(&sample_article(9, "x")).await, Ok(false));
    }

    #[tokio::test]
    async fn test_remove_present_document() {
        let f = fixture("8.11.1").await;
        let article = sample_article(2, "Tekst");
        f.sync.upsert(&article, &f.db).await;

        assert_eq!(f.sync.remove(&article).await, Ok(true));
        assert!(f.index.document(INDEX, 2).is_none());
    }

    #[tokio::test]
    async fn test_upsert_for_bulk_creates_then_updates() {
        let f = fixture("8.11.1").await;
        let article = sample_article(5, "Tekst om vejret");

        let first = f.sync.upsert_for_bulk(&article, &f.db).await.unwrap();
        assert_eq!(first.operation, BulkOperation::Create);
        assert_eq!(first.index, INDEX);
        assert!(f.index.is_empty());
        f.sync.submit_bulk(&[first]).await.unwrap();

        let second = f.sync.upsert_for_bulk(&article, &f.db).await.unwrap();
        assert_eq!(second.operation, BulkOperation::Update);
        assert!(second.payload.get("doc").is_some());
        assert_eq!(f.embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_reindex_all_covers_every_article() {
        let f = fixture("8.11.1").await;
        for id in 1..=5 {
            f.db.put_article(sample_article(id, "Tekst"));
        }

        let summary = f.sync.reindex_all(&f.db, 2).await.unwrap();

        assert_eq!(summary, ReindexSummary { submitted: 5, failed: 0 });
        assert_eq!(f.index.len(), 5);
    }

    #[tokio::test]
    async fn test_reindex_all_keeps_going_when_bulk_fails() {
        let f = fixture("8.11.1").await;
        for id in 1..=3 {
            f.db.put_article(sample_article(id, "Tekst"));
        }
        f.index
            .fail_writes_with(IndexError::Permanent("mapping conflict".to_string()));

        let summary = f.sync.reindex_all(&f.db, 2).await.unwrap();

        assert_eq!(summary, ReindexSummary { submitted: 0, failed: 3 });
    }
}
