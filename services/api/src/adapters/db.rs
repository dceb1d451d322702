//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingo_core::domain::{
    Article, CefrLevel, Language, NewUser, Session, TopicMapping, TopicOrigin, User,
    UserCredentials,
};
use lingo_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::warn;

const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn preferences_for(&self, user_id: i64) -> PortResult<BTreeMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// Maps a unique-constraint violation on `email` to a validation error.
fn duplicate_email_or_unexpected(e: sqlx::Error, email: &str) -> PortError {
    let duplicate = e
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if duplicate {
        PortError::Validation(format!("There is already an account for {}", email))
    } else {
        unexpected(e)
    }
}

fn stored_language(code: &str) -> PortResult<Language> {
    Language::from_code(code)
        .ok_or_else(|| PortError::Unexpected(format!("Unknown language '{}' in database", code)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    email: String,
    name: String,
    native_language: String,
    learned_language: String,
    cefr_level: Option<i16>,
}
impl UserRecord {
    fn to_domain(self, preferences: BTreeMap<String, String>) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            native_language: stored_language(&self.native_language)?,
            learned_language: stored_language(&self.learned_language)?,
            cefr_level: self.cefr_level.and_then(CefrLevel::from_rank),
            preferences,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    uuid: String,
    user_id: i64,
    last_use: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            uuid: self.uuid,
            user_id: self.user_id,
            last_use: self.last_use,
        }
    }
}

#[derive(FromRow)]
struct ArticleRecord {
    id: i64,
    title: String,
    content: String,
    summary: String,
    authors: String,
    word_count: i32,
    published_time: Option<DateTime<Utc>>,
    language_code: String,
    fk_difficulty: i32,
    url: String,
    video: bool,
}
impl ArticleRecord {
    fn to_domain(self) -> PortResult<Article> {
        Ok(Article {
            id: self.id,
            title: self.title,
            content: self.content,
            summary: self.summary,
            authors: self.authors,
            word_count: self.word_count,
            published_time: self.published_time,
            language: stored_language(&self.language_code)?,
            fk_difficulty: self.fk_difficulty,
            url: self.url,
            video: self.video,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_user_by_id(&self, user_id: i64) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, native_language, learned_language, cefr_level \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {} not found", user_id)))?;

        let preferences = self.preferences_for(user_id).await?;
        record.to_domain(preferences)
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, name, password_hash, native_language, learned_language) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, email, name, native_language, learned_language, cefr_level",
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.native_language.code())
        .bind(new_user.learned_language.code())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| duplicate_email_or_unexpected(e, &new_user.email))?;
        record.to_domain(BTreeMap::new())
    }

    async fn save_user(&self, user: &User) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let updated = sqlx::query(
            "UPDATE users SET email = $1, name = $2, native_language = $3, \
             learned_language = $4, cefr_level = $5 WHERE id = $6",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.native_language.code())
        .bind(user.learned_language.code())
        .bind(user.cefr_level.map(CefrLevel::rank))
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_email_or_unexpected(e, &user.email))?;
        if updated.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user.id)));
        }

        for (key, value) in &user.preferences {
            sqlx::query(
                "INSERT INTO user_preferences (user_id, key, value) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, key) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(user.id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("No account for {}", email)))?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_anon_uuid(&self, anon_uuid: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash FROM users WHERE anon_uuid = $1",
        )
        .bind(anon_uuid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, || format!("No anonymous account {}", anon_uuid))
        })?;
        Ok(record.to_domain())
    }

    async fn insert_session(&self, session: &Session) -> PortResult<()> {
        sqlx::query("INSERT INTO sessions (uuid, user_id, last_use) VALUES ($1, $2, $3)")
            .bind(&session.uuid)
            .bind(session.user_id)
            .bind(session.last_use)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_session(&self, uuid: &str) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT uuid, user_id, last_use FROM sessions WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Session {} not found", uuid)))?;
        Ok(record.to_domain())
    }

    async fn touch_session(&self, uuid: &str, last_use: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE sessions SET last_use = GREATEST(last_use, $1) WHERE uuid = $2",
        )
        .bind(last_use)
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", uuid)));
        }
        Ok(())
    }

    async fn delete_session(&self, uuid: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", uuid)));
        }
        Ok(())
    }

    async fn get_article(&self, article_id: i64) -> PortResult<Article> {
        let record = sqlx::query_as::<_, ArticleRecord>(
            "SELECT id, title, content, summary, authors, word_count, published_time, \
             language_code, fk_difficulty, url, video FROM articles WHERE id = $1",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Article {} not found", article_id)))?;
        record.to_domain()
    }

    async fn list_article_ids(&self, after: i64, limit: i64) -> PortResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM articles WHERE id > $1 ORDER BY id ASC LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_legacy_topics(&self, article_id: i64) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT t.title FROM topic t \
             JOIN article_topic_map m ON m.topic_id = t.id \
             WHERE m.article_id = $1 ORDER BY t.id",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_topic_mappings(&self, article_id: i64) -> PortResult<Vec<TopicMapping>> {
        let rows = sqlx::query_as::<_, (String, i16)>(
            "SELECT t.title, m.origin_type FROM new_topic t \
             JOIN new_article_topic_map m ON m.new_topic_id = t.id \
             WHERE m.article_id = $1 ORDER BY t.id",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows
            .into_iter()
            .filter_map(|(title, origin)| match TopicOrigin::from_i16(origin) {
                Some(origin) => Some(TopicMapping { title, origin }),
                None => {
                    warn!(article_id, origin, "Skipping topic with unknown origin type");
                    None
                }
            })
            .collect())
    }
}
