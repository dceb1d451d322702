//! crates/lingo_core/src/sessions.rs
//!
//! The session store: issues, validates and expires login sessions.
//!
//! Each operation takes the database handle explicitly. A session expires once
//! it has been idle for more than `MAX_SESSION_IDLE_DAYS`; expired sessions are
//! deleted on the validation that notices them.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Session, User, MAX_SESSION_IDLE_DAYS};
use crate::ports::{DatabaseService, PortError, PortResult};

/// Creates and persists a fresh session for `user_id`.
pub async fn create_session(db: &dyn DatabaseService, user_id: i64) -> PortResult<Session> {
    let session = Session {
        uuid: Uuid::new_v4().to_string(),
        user_id,
        last_use: Utc::now(),
    };
    db.insert_session(&session).await?;
    debug!(user_id, "Created session");
    Ok(session)
}

/// Validates `token` against the current time. See [`validate_at`].
pub async fn validate(db: &dyn DatabaseService, token: &str) -> PortResult<User> {
    validate_at(db, token, Utc::now()).await
}

/// Validates `token` as of `now`.
///
/// Fails with `Unauthorized` if the session is unknown, or if it is too old, in
/// which case it is also deleted. Otherwise refreshes `last_use` and returns the
/// session's user.
pub async fn validate_at(
    db: &dyn DatabaseService,
    token: &str,
    now: DateTime<Utc>,
) -> PortResult<User> {
    let session = match db.get_session(token).await {
        Ok(session) => session,
        Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
        Err(e) => return Err(e),
    };

    if is_expired(&session, now) {
        info!(user_id = session.user_id, "Session was too old, logging out");
        match db.delete_session(token).await {
            Ok(()) | Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        return Err(PortError::Unauthorized);
    }

    // last_use never moves backward, even if clocks disagree.
    let last_use = now.max(session.last_use);
    match db.touch_session(token, last_use).await {
        Ok(()) => {}
        // Logged out concurrently.
        Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
        Err(e) => return Err(e),
    }

    db.get_user_by_id(session.user_id).await
}

/// Deletes the session. Fails with `Unauthorized` if it does not exist, so a
/// second logout with the same token is reported as an error.
pub async fn invalidate(db: &dyn DatabaseService, token: &str) -> PortResult<()> {
    match db.delete_session(token).await {
        Ok(()) => Ok(()),
        Err(PortError::NotFound(_)) => Err(PortError::Unauthorized),
        Err(e) => Err(e),
    }
}

/// A session is expired once idle for more than the maximum, counted in
/// whole days: 30 days and some hours is still valid.
pub fn is_expired(session: &Session, now: DateTime<Utc>) -> bool {
    (now - session.last_use).num_days() > MAX_SESSION_IDLE_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, NewUser};
    use chrono::Duration;
    use crate::memory::InMemoryDatabase;

    async fn db_with_user() -> (InMemoryDatabase, i64) {
        let db = InMemoryDatabase::new();
        let user = db
            .create_user(NewUser {
                email: "ana@example.com".to_string(),
                name: "Ana".to_string(),
                password_hash: "hash".to_string(),
                native_language: Language::from_code("en").unwrap(),
                learned_language: Language::from_code("da").unwrap(),
            })
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_create_session_persists_unique_tokens() {
        let (db, user_id) = db_with_user().await;

        let first = create_session(&db, user_id).await.unwrap();
        let second = create_session(&db, user_id).await.unwrap();

        assert_ne!(first.uuid, second.uuid);
        assert_eq!(db.session_count(), 2);
        assert_eq!(db.get_session(&first.uuid).await.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_validate_recent_session_refreshes_last_use() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();
        let now = session.last_use + Duration::days(29);

        let user = validate_at(&db, &session.uuid, now).await.unwrap();

        assert_eq!(user.id, user_id);
        assert_eq!(db.get_session(&session.uuid).await.unwrap().last_use, now);
    }

    #[tokio::test]
    async fn test_validate_stale_session_fails_and_deletes() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();
        let now = session.last_use + Duration::days(31);

        let result = validate_at(&db, &session.uuid, now).await;

        assert_eq!(result, Err(PortError::Unauthorized));
        assert_eq!(db.session_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_exactly_at_limit_is_still_valid() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();
        let now = session.last_use + Duration::days(MAX_SESSION_IDLE_DAYS);

        assert!(validate_at(&db, &session.uuid, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_counts_whole_idle_days() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();
        let now = session.last_use + Duration::days(30) + Duration::hours(12);

        assert!(validate_at(&db, &session.uuid, now).await.is_ok());
        assert_eq!(db.session_count(), 1);
    }

    #[test]
    fn test_is_expired_from_the_thirty_first_day() {
        let session = Session {
            uuid: "token".to_string(),
            user_id: 1,
            last_use: Utc::now(),
        };

        let almost = session.last_use + Duration::days(31) - Duration::seconds(1);

        assert!(!is_expired(&session, almost));
        assert!(is_expired(&session, session.last_use + Duration::days(31)));
    }

    #[tokio::test]
    async fn test_validate_never_moves_last_use_backward() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();
        let earlier = session.last_use - Duration::hours(1);

        validate_at(&db, &session.uuid, earlier).await.unwrap();

        assert_eq!(
            db.get_session(&session.uuid).await.unwrap().last_use,
            session.last_use
        );
    }

    #[tokio::test]
    async fn test_validate_unknown_token_is_unauthorized() {
        let (db, _) = db_with_user().await;

        assert_eq!(
            validate(&db, "no-such-token").await,
            Err(PortError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_invalidate_twice_reports_unauthorized() {
        let (db, user_id) = db_with_user().await;
        let session = create_session(&db, user_id).await.unwrap();

        assert_eq!(invalidate(&db, &session.uuid).await, Ok(()));
        assert_eq!(
            invalidate(&db, &session.uuid).await,
            Err(PortError::Unauthorized)
        );
        assert_eq!(
            validate(&db, &session.uuid).await,
            Err(PortError::Unauthorized)
        );
    }
}
