//! crates/lingo_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format, except for
//! the search documents, whose field names are the index contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sessions idle for longer than this many days are expired and removed.
pub const MAX_SESSION_IDLE_DAYS: i64 = 30;

//=========================================================================================
// Sessions and Users
//=========================================================================================

/// A login session, identified by an opaque token handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uuid: String,
    pub user_id: i64,
    pub last_use: DateTime<Utc>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub native_language: Language,
    pub learned_language: Language,
    pub cefr_level: Option<CefrLevel>,
    pub preferences: BTreeMap<String, String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Fields needed to register a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub native_language: Language,
    pub learned_language: Language,
}

//=========================================================================================
// Languages
//=========================================================================================

const KNOWN_LANGUAGES: &[(&str, &str)] = &[
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("hu", "Hungarian"),
    ("it", "Italian"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sv", "Swedish"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("zh-CN", "Chinese"),
];

/// A language from the known language set. Only constructible from a valid code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    code: &'static str,
    name: &'static str,
}

impl Language {
    /// Looks up a language by its ISO code.
    pub fn from_code(code: &str) -> Option<Self> {
        KNOWN_LANGUAGES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(code, name)| Self { code, name })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// CEFR proficiency level for the learned language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Numeric rank, 1 (A1) through 6 (C2).
    pub fn rank(self) -> i16 {
        match self {
            CefrLevel::A1 => 1,
            CefrLevel::A2 => 2,
            CefrLevel::B1 => 3,
            CefrLevel::B2 => 4,
            CefrLevel::C1 => 5,
            CefrLevel::C2 => 6,
        }
    }

    pub fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            1 => Some(CefrLevel::A1),
            2 => Some(CefrLevel::A2),
            3 => Some(CefrLevel::B1),
            4 => Some(CefrLevel::B2),
            5 => Some(CefrLevel::C1),
            6 => Some(CefrLevel::C2),
            _ => None,
        }
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    /// Accepts either the numeric rank (`"3"`) or the label (`"B1"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(rank) = s.parse::<i16>() {
            return Self::from_rank(rank).ok_or_else(|| format!("unknown CEFR level '{}'", s));
        }
        match s.to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            _ => Err(format!("unknown CEFR level '{}'", s)),
        }
    }
}

//=========================================================================================
// Articles and Topics
//=========================================================================================

/// The relational article record. Source of truth for the search index.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub authors: String,
    pub word_count: i32,
    pub published_time: Option<DateTime<Utc>>,
    pub language: Language,
    pub fk_difficulty: i32,
    pub url: String,
    pub video: bool,
}

/// How a structured topic came to be attached to an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOrigin {
    Hardset,
    UrlParsed,
    Inferred,
}

impl TopicOrigin {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(TopicOrigin::Hardset),
            1 => Some(TopicOrigin::UrlParsed),
            2 => Some(TopicOrigin::Inferred),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            TopicOrigin::Hardset => 0,
            TopicOrigin::UrlParsed => 1,
            TopicOrigin::Inferred => 2,
        }
    }
}

/// A structured topic attached to an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapping {
    pub title: String,
    pub origin: TopicOrigin,
}

//=========================================================================================
// Search Documents
//=========================================================================================

/// Document schema understood by an Elasticsearch 7 server: flat topic string,
/// no embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentV7 {
    pub title: String,
    pub author: String,
    pub content: String,
    pub summary: String,
    pub word_count: i32,
    pub published_time: Option<DateTime<Utc>>,
    pub topics: String,
    pub language: String,
    pub fk_difficulty: i32,
    pub lr_difficulty: f64,
    pub url: String,
    pub video: bool,
}

/// Document schema for Elasticsearch 8 and later: human and inferred topics
/// are kept apart, and the semantic embedding is stored alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentV8 {
    pub title: String,
    pub author: String,
    pub content: String,
    pub summary: String,
    pub word_count: i32,
    pub published_time: Option<DateTime<Utc>>,
    pub old_topics: String,
    pub topics: Vec<String>,
    // Inferred labels must not be used to classify further articles.
    pub topics_inferred: Vec<String>,
    pub language: String,
    pub fk_difficulty: i32,
    pub lr_difficulty: f64,
    pub url: String,
    pub video: bool,
    pub sem_vec: Vec<f32>,
}

/// The denormalized, rebuildable projection of an article stored in the index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexedDocument {
    V7(DocumentV7),
    V8(DocumentV8),
}

impl IndexedDocument {
    pub fn schema(&self) -> SchemaVersion {
        match self {
            IndexedDocument::V7(_) => SchemaVersion::V7,
            IndexedDocument::V8(_) => SchemaVersion::V8,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            IndexedDocument::V7(doc) => &doc.content,
            IndexedDocument::V8(doc) => &doc.content,
        }
    }

    /// The stored embedding, if the schema carries one.
    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            IndexedDocument::V7(_) => None,
            IndexedDocument::V8(doc) => Some(&doc.sem_vec),
        }
    }

    /// Serializes the document into the JSON body sent to the index.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            IndexedDocument::V7(doc) => serde_json::to_value(doc),
            IndexedDocument::V8(doc) => serde_json::to_value(doc),
        }
    }

    /// Parses a stored `_source` body using the given schema.
    pub fn from_json(schema: SchemaVersion, source: serde_json::Value) -> serde_json::Result<Self> {
        match schema {
            SchemaVersion::V7 => serde_json::from_value(source).map(IndexedDocument::V7),
            SchemaVersion::V8 => serde_json::from_value(source).map(IndexedDocument::V8),
        }
    }
}

/// Which document shape the target index expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V7,
    V8,
}

impl SchemaVersion {
    /// Picks the schema from a server version string such as `"8.11.1"`.
    /// Only major version 7 uses the old schema.
    pub fn from_server_version(version: &str) -> Option<Self> {
        let major = version.split('.').next()?.trim().parse::<u32>().ok()?;
        Some(if major == 7 {
            SchemaVersion::V7
        } else {
            SchemaVersion::V8
        })
    }
}

/// Bulk operation kind for a single article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    Create,
    Update,
}

impl BulkOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// One entry of a bulk write request. Built without touching the index.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInstruction {
    pub id: i64,
    pub index: String,
    pub operation: BulkOperation,
    pub payload: serde_json::Value,
}
