//! crates/lingo_core/src/memory.rs
//!
//! In-memory implementations of the database and search index ports.
//! Used by the test suites and for running the service without Postgres or
//! Elasticsearch. Locks are never held across an `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    Article, BulkInstruction, BulkOperation, NewUser, Session, TopicMapping, User,
    UserCredentials,
};
use crate::ports::{
    DatabaseService, IndexError, IndexResult, PortError, PortResult, SearchIndex,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned lock only means another test thread panicked mid-update.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    credentials: HashMap<i64, UserCredentials>,
    anon_uuids: HashMap<String, i64>,
    sessions: HashMap<String, Session>,
    articles: BTreeMap<i64, Article>,
    legacy_topics: HashMap<i64, Vec<String>>,
    topic_mappings: HashMap<i64, Vec<TopicMapping>>,
}

/// A `DatabaseService` backed by plain maps.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an anonymous login for an existing user.
    pub fn add_anonymous_login(&self, anon_uuid: &str, user_id: i64) {
        lock(&self.tables)
            .anon_uuids
            .insert(anon_uuid.to_string(), user_id);
    }

    pub fn put_article(&self, article: Article) {
        lock(&self.tables).articles.insert(article.id, article);
    }

    pub fn put_legacy_topics(&self, article_id: i64, titles: Vec<String>) {
        lock(&self.tables).legacy_topics.insert(article_id, titles);
    }

    pub fn put_topic_mappings(&self, article_id: i64, mappings: Vec<TopicMapping>) {
        lock(&self.tables).topic_mappings.insert(article_id, mappings);
    }

    /// Overwrites a stored session as-is, e.g. to age it in tests.
    pub fn put_session(&self, session: Session) {
        lock(&self.tables)
            .sessions
            .insert(session.uuid.clone(), session);
    }

    pub fn session_count(&self) -> usize {
        lock(&self.tables).sessions.len()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn get_user_by_id(&self, user_id: i64) -> PortResult<User> {
        lock(&self.tables)
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut tables = lock(&self.tables);
        if tables.credentials.values().any(|c| c.email == new_user.email) {
            return Err(PortError::Validation(format!(
                "There is already an account for {}",
                new_user.email
            )));
        }
        let id = tables.users.keys().next_back().copied().unwrap_or(0) + 1;
        let user = User {
            id,
            email: new_user.email.clone(),
            name: new_user.name,
            native_language: new_user.native_language,
            learned_language: new_user.learned_language,
            cefr_level: None,
            preferences: BTreeMap::new(),
        };
        tables.users.insert(id, user.clone());
        tables.credentials.insert(
            id,
            UserCredentials {
                user_id: id,
                email: new_user.email,
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> PortResult<()> {
        let mut tables = lock(&self.tables);
        if !tables.users.contains_key(&user.id) {
            return Err(PortError::NotFound(format!("User {} not found", user.id)));
        }
        let taken = tables
            .credentials
            .values()
            .any(|c| c.email == user.email && c.user_id != user.id);
        if taken {
            return Err(PortError::Validation(format!(
                "There is already an account for {}",
                user.email
            )));
        }
        if let Some(creds) = tables.credentials.get_mut(&user.id) {
            creds.email = user.email.clone();
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        lock(&self.tables)
            .credentials
            .values()
            .find(|c| c.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No account for {}", email)))
    }

    async fn get_credentials_by_anon_uuid(&self, anon_uuid: &str) -> PortResult<UserCredentials> {
        let tables = lock(&self.tables);
        tables
            .anon_uuids
            .get(anon_uuid)
            .and_then(|id| tables.credentials.get(id))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No anonymous account {}", anon_uuid)))
    }

    async fn insert_session(&self, session: &Session) -> PortResult<()> {
        lock(&self.tables)
            .sessions
            .insert(session.uuid.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, uuid: &str) -> PortResult<Session> {
        lock(&self.tables)
            .sessions
            .get(uuid)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", uuid)))
    }

    async fn touch_session(&self, uuid: &str, last_use: DateTime<Utc>) -> PortResult<()> {
        match lock(&self.tables).sessions.get_mut(uuid) {
            Some(session) => {
                session.last_use = last_use;
                Ok(())
            }
            None => Err(PortError::NotFound(format!("Session {} not found", uuid))),
        }
    }

    async fn delete_session(&self, uuid: &str) -> PortResult<()> {
        lock(&self.tables)
            .sessions
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", uuid)))
    }

    async fn get_article(&self, article_id: i64) -> PortResult<Article> {
        lock(&self.tables)
            .articles
            .get(&article_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))
    }

    async fn list_article_ids(&self, after: i64, limit: i64) -> PortResult<Vec<i64>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(lock(&self.tables)
            .articles
            .range(after + 1..)
            .take(limit)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_legacy_topics(&self, article_id: i64) -> PortResult<Vec<String>> {
        Ok(lock(&self.tables)
            .legacy_topics
            .get(&article_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_topic_mappings(&self, article_id: i64) -> PortResult<Vec<TopicMapping>> {
        Ok(lock(&self.tables)
            .topic_mappings
            .get(&article_id)
            .cloned()
            .unwrap_or_default())
    }
}

//=========================================================================================
// Search Index
//=========================================================================================

/// A `SearchIndex` holding documents in a map keyed by `(index, id)`.
pub struct InMemorySearchIndex {
    version: String,
    documents: Mutex<HashMap<(String, i64), serde_json::Value>>,
    fail_writes: Mutex<Option<IndexError>>,
}

impl InMemorySearchIndex {
    /// Creates an empty index reporting the given server version.
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            documents: Mutex::new(HashMap::new()),
            fail_writes: Mutex::new(None),
        }
    }

    /// Makes every subsequent write (`index`, `delete`, `bulk`) fail with `error`.
    pub fn fail_writes_with(&self, error: IndexError) {
        *lock(&self.fail_writes) = Some(error);
    }

    pub fn document(&self, index: &str, id: i64) -> Option<serde_json::Value> {
        lock(&self.documents).get(&(index.to_string(), id)).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> IndexResult<()> {
        match lock(&self.fail_writes).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn server_version(&self) -> IndexResult<String> {
        Ok(self.version.clone())
    }

    async fn exists(&self, index: &str, id: i64) -> IndexResult<bool> {
        Ok(lock(&self.documents).contains_key(&(index.to_string(), id)))
    }

    async fn get(&self, index: &str, id: i64) -> IndexResult<Option<serde_json::Value>> {
        Ok(self.document(index, id))
    }

    async fn index(&self, index: &str, id: i64, document: serde_json::Value) -> IndexResult<()> {
        self.check_writable()?;
        lock(&self.documents).insert((index.to_string(), id), document);
        Ok(())
    }

    async fn delete(&self, index: &str, id: i64) -> IndexResult<()> {
        self.check_writable()?;
        lock(&self.documents)
            .remove(&(index.to_string(), id))
            .map(|_| ())
            .ok_or(IndexError::NotFound)
    }

    async fn bulk(&self, instructions: &[BulkInstruction]) -> IndexResult<()> {
        self.check_writable()?;
        let mut documents = lock(&self.documents);
        for instruction in instructions {
            let key = (instruction.index.clone(), instruction.id);
            match instruction.operation {
                BulkOperation::Create => {
                    if documents.contains_key(&key) {
                        return Err(IndexError::Permanent(format!(
                            "document {} already exists",
                            instruction.id
                        )));
                    }
                    documents.insert(key, instruction.payload.clone());
                }
                BulkOperation::Update => {
                    let partial = instruction
                        .payload
                        .get("doc")
                        .and_then(|doc| doc.as_object())
                        .ok_or_else(|| {
                            IndexError::Permanent("update without a doc body".to_string())
                        })?;
                    let stored = documents
                        .get_mut(&key)
                        .and_then(|doc| doc.as_object_mut())
                        .ok_or(IndexError::NotFound)?;
                    for (field, value) in partial {
                        stored.insert(field.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }
}
