//! Shared setup for the HTTP integration tests: an app wired to the
//! in-memory adapters, plus request helpers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use lingo_api::adapters::{LixRanker, LogFeedbackMailer};
use lingo_api::config::Config;
use lingo_api::web::{auth::hash_password, build_router, AppState};
use lingo_core::domain::{Language, NewUser};
use lingo_core::memory::{InMemoryDatabase, InMemorySearchIndex};
use lingo_core::ports::DatabaseService;
pub use lingo_core::testing::{sample_article, CountingEmbedder};
use std::sync::Arc;
use tower::ServiceExt;

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "correct horse";
pub const INDEX: &str = "zeeguu";

pub struct TestApp {
    pub router: Router,
    pub db: Arc<InMemoryDatabase>,
    pub search: Arc<InMemorySearchIndex>,
    pub embedder: Arc<CountingEmbedder>,
    pub user_id: i64,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::DEBUG,
        cors_origin: "http://localhost:3000".to_string(),
        es_url: "http://unused:9200".to_string(),
        es_index: INDEX.to_string(),
        embedding_url: "http://unused:3654".to_string(),
        reindex_batch_size: 10,
    }
}

/// An app with one registered user (`EMAIL` / `PASSWORD`).
pub async fn spawn_app() -> TestApp {
    let db = Arc::new(InMemoryDatabase::new());
    let user = db
        .create_user(NewUser {
            email: EMAIL.to_string(),
            name: "Ana".to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            native_language: Language::from_code("en").unwrap(),
            learned_language: Language::from_code("da").unwrap(),
        })
        .await
        .unwrap();
    let search = Arc::new(InMemorySearchIndex::new("8.11.1"));
    let embedder = Arc::new(CountingEmbedder::default());

    let state = Arc::new(AppState {
        db: db.clone(),
        config: Arc::new(test_config()),
        search: search.clone(),
        embedder: embedder.clone(),
        ranker: Arc::new(LixRanker),
        mailer: Arc::new(LogFeedbackMailer),
    });

    TestApp {
        router: build_router(state).unwrap(),
        db,
        search,
        embedder,
        user_id: user.id,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Logs in as the default user and returns the session token.
    pub async fn login(&self) -> String {
        let response = self
            .post_form(&format!("/session/{}", EMAIL), "password=correct+horse")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        json["session"].as_str().unwrap().to_string()
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
