//! Integration tests for the session endpoints: login, validation, expiry
//! and logout.

mod common;

use axum::http::{header, StatusCode};
use chrono::{Duration, Utc};
use common::{body_json, body_text, spawn_app, EMAIL};
use lingo_core::domain::Session;
use lingo_core::ports::DatabaseService;

#[tokio::test]
async fn test_login_validate_logout_flow() {
    let app = spawn_app().await;

    let token = app.login().await;

    let response = app.get(&format!("/validate?session={}", token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let response = app.get(&format!("/logout_session?session={}", token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/validate?session={}", token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = spawn_app().await;

    let response = app
        .post_form(&format!("/session/{}", EMAIL), "password=correct+horse")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let json = body_json(response).await;
    let token = json["session"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("chocolatechip={};", token)));
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = spawn_app().await;
    let token = app.login().await;

    let response = app
        .send(
            axum::http::Request::builder()
                .uri("/validate")
                .header(header::COOKIE, format!("chocolatechip={}", token))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = spawn_app().await;

    let wrong = app
        .post_form(&format!("/session/{}", EMAIL), "password=wrong")
        .await;
    let empty = app
        .post_form(&format!("/session/{}", EMAIL), "password=")
        .await;
    let unknown = app
        .post_form("/session/nobody@example.com", "password=whatever")
        .await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(empty.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(empty).await, "Password not given");
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.db.session_count(), 0);
}

#[tokio::test]
async fn test_validate_without_session_is_unauthorized() {
    let app = spawn_app().await;

    let response = app.get("/validate").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stale_session_is_rejected_and_removed() {
    let app = spawn_app().await;
    let token = app.login().await;
    app.db.put_session(Session {
        uuid: token.clone(),
        user_id: app.user_id,
        last_use: Utc::now() - Duration::days(31),
    });

    let response = app.get(&format!("/validate?session={}", token)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.db.get_session(&token).await.is_err());
}

#[tokio::test]
async fn test_validate_refreshes_last_use() {
    let app = spawn_app().await;
    let token = app.login().await;
    let old = Utc::now() - Duration::days(10);
    app.db.put_session(Session {
        uuid: token.clone(),
        user_id: app.user_id,
        last_use: old,
    });

    let response = app.get(&format!("/validate?session={}", token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.db.get_session(&token).await.unwrap().last_use > old);
}

#[tokio::test]
async fn test_anonymous_login() {
    let app = spawn_app().await;
    app.db.add_anonymous_login("anon-42", app.user_id);

    let missing = app.post_form("/get_anon_session/anon-42", "").await;
    let wrong = app
        .post_form("/get_anon_session/anon-42", "password=nope")
        .await;
    let ok = app
        .post_form("/get_anon_session/anon-42", "password=correct+horse")
        .await;

    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ok.status(), StatusCode::OK);
    let token = body_text(ok).await;
    assert!(app.db.get_session(&token).await.is_ok());
}

#[tokio::test]
async fn test_signup_creates_account_and_session() {
    let app = spawn_app().await;

    let response = app
        .post_form(
            "/add_user/bea@example.com",
            "password=secret&username=Bea&learned_language=fr&native_language=nl",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_text(response).await;

    let details = app.get(&format!("/get_user_details?session={}", token)).await;
    let json = body_json(details).await;
    assert_eq!(json["email"], "bea@example.com");
    assert_eq!(json["learned_language"], "fr");
    assert_eq!(json["native_language"], "nl");
}

#[tokio::test]
async fn test_signup_rejects_taken_email() {
    let app = spawn_app().await;

    let response = app
        .post_form(
            &format!("/add_user/{}", EMAIL),
            "password=secret&username=Ana&learned_language=da",
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_is_up() {
    let app = spawn_app().await;

    let response = app.get("/is_up").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}
