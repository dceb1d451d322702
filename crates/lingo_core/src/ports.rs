//! crates/lingo_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::{
    Article, BulkInstruction, NewUser, Session, TopicMapping, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure kinds reported by the search index port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The document (or index) does not exist. Never fatal for synchronization.
    #[error("Document not found")]
    NotFound,
    /// Network or server-side failure that may succeed when retried.
    #[error("Transient search index failure: {0}")]
    TransientIo(String),
    /// The request itself was rejected (malformed document, bad mapping, ...).
    #[error("Permanent search index failure: {0}")]
    Permanent(String),
}

impl IndexError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::TransientIo(_))
    }
}

impl From<PortError> for IndexError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::Unexpected(msg) => IndexError::TransientIo(msg),
            other => IndexError::Permanent(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Permanent(e.to_string())
    }
}

pub type IndexResult<T> = Result<T, IndexError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn get_user_by_id(&self, user_id: i64) -> PortResult<User>;

    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    /// Persists every mutable profile field of `user`, including preferences.
    async fn save_user(&self, user: &User) -> PortResult<()>;

    // --- Auth Methods ---
    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_credentials_by_anon_uuid(&self, anon_uuid: &str) -> PortResult<UserCredentials>;

    // --- Session Management ---
    async fn insert_session(&self, session: &Session) -> PortResult<()>;

    async fn get_session(&self, uuid: &str) -> PortResult<Session>;

    async fn touch_session(&self, uuid: &str, last_use: DateTime<Utc>) -> PortResult<()>;

    async fn delete_session(&self, uuid: &str) -> PortResult<()>;

    // --- Articles ---
    async fn get_article(&self, article_id: i64) -> PortResult<Article>;

    /// Article ids greater than `after`, ascending, at most `limit` of them.
    async fn list_article_ids(&self, after: i64, limit: i64) -> PortResult<Vec<i64>>;

    /// Titles from the legacy free-text topic join.
    async fn get_legacy_topics(&self, article_id: i64) -> PortResult<Vec<String>>;

    async fn get_topic_mappings(&self, article_id: i64) -> PortResult<Vec<TopicMapping>>;
}

/// Client for the external search index. Bodies are raw JSON; the synchronizer
/// owns the document shape.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// The server's version number, e.g. `"8.11.1"`.
    async fn server_version(&self) -> IndexResult<String>;

    async fn exists(&self, index: &str, id: i64) -> IndexResult<bool>;

    /// The stored `_source`, or `None` when the document is absent.
    async fn get(&self, index: &str, id: i64) -> IndexResult<Option<serde_json::Value>>;

    async fn index(&self, index: &str, id: i64, document: serde_json::Value) -> IndexResult<()>;

    async fn delete(&self, index: &str, id: i64) -> IndexResult<()>;

    async fn bulk(&self, instructions: &[BulkInstruction]) -> IndexResult<()>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Computes the semantic embedding of an article's text.
    async fn embed_article(&self, article: &Article) -> PortResult<Vec<f32>>;
}

#[async_trait]
pub trait DifficultyRanker: Send + Sync {
    /// The "Lingo Rank" difficulty estimate for an article.
    async fn rank(&self, article: &Article) -> PortResult<f64>;
}

#[async_trait]
pub trait FeedbackMailer: Send + Sync {
    async fn send_feedback(
        &self,
        subject: &str,
        context: &str,
        message: &str,
        user: &User,
    ) -> PortResult<()>;
}

/// Key/value preferences as submitted by the client.
pub type Preferences = BTreeMap<String, String>;
