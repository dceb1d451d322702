//! Integration tests for the endpoints that synchronize articles with the
//! search index.

mod common;

use axum::http::StatusCode;
use common::{sample_article, spawn_app, INDEX};
use lingo_core::ports::IndexError;

#[tokio::test]
async fn test_index_article_writes_document() {
    let app = spawn_app().await;
    let token = app.login().await;
    app.db.put_article(sample_article(11, "Det regner i dag."));

    let response = app
        .post_form(&format!("/index_article/11?session={}", token), "")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = app.search.document(INDEX, 11).unwrap();
    assert_eq!(doc["content"], "Det regner i dag.");
    assert_eq!(doc["language"], "Danish");
    assert_eq!(app.embedder.calls(), 1);
}

#[tokio::test]
async fn test_reindexing_unchanged_article_skips_embedding() {
    let app = spawn_app().await;
    let token = app.login().await;
    app.db.put_article(sample_article(11, "Det regner i dag."));

    for _ in 0..3 {
        app.post_form(&format!("/index_article/11?session={}", token), "")
            .await;
    }

    assert_eq!(app.embedder.calls(), 1);
    assert_eq!(app.search.len(), 1);
}

#[tokio::test]
async fn test_index_failure_is_not_surfaced() {
    let app = spawn_app().await;
    let token = app.login().await;
    app.db.put_article(sample_article(11, "Det regner i dag."));
    app.search
        .fail_writes_with(IndexError::TransientIo("connection refused".to_string()));

    let response = app
        .post_form(&format!("/index_article/11?session={}", token), "")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.search.is_empty());
}

#[tokio::test]
async fn test_index_unknown_article_is_not_found() {
    let app = spawn_app().await;
    let token = app.login().await;

    let response = app
        .post_form(&format!("/index_article/999?session={}", token), "")
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_article_from_index() {
    let app = spawn_app().await;
    let token = app.login().await;
    app.db.put_article(sample_article(11, "Det regner i dag."));
    app.post_form(&format!("/index_article/11?session={}", token), "")
        .await;

    let first = app
        .post_form(&format!("/remove_article_from_index/11?session={}", token), "")
        .await;
    let second = app
        .post_form(&format!("/remove_article_from_index/11?session={}", token), "")
        .await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert!(app.search.document(INDEX, 11).is_none());
}
