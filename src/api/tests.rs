//! HTTP-level tests for the API router

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::Row;

use super::*;
use crate::config::AuthConfig;
use crate::db::repositories::{
    NewSession, SessionRepository, SqlxMessageRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::pool::sqlite_pool;
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::services::auth::tests::FakeProvider;
use crate::services::{
    generate_session_token, LoginService, MessageService, SessionService, UserService,
};

struct TestApp {
    server: TestServer,
    pool: DynDatabasePool,
    sessions: Arc<SessionService>,
}

async fn setup() -> TestApp {
    setup_with(AuthConfig::default()).await
}

async fn setup_with(auth: AuthConfig) -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let session_service = Arc::new(SessionService::new(SqlxSessionRepository::boxed(
        pool.clone(),
    )));
    let user_service = Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone())));
    let login_service = Arc::new(LoginService::new(
        Arc::new(FakeProvider::alice()),
        user_service.clone(),
        session_service.clone(),
        "http://localhost:3000/api/auth/callback",
    ));
    let message_service = Arc::new(MessageService::new(SqlxMessageRepository::boxed(
        pool.clone(),
    )));

    let state = AppState {
        pool: pool.clone(),
        session_gate: Arc::new(StageChain::session_gate(
            session_service.clone(),
            user_service.clone(),
        )),
        session_service: session_service.clone(),
        user_service,
        login_service,
        message_service,
        auth: Arc::new(auth),
    };

    let app = build_router(state, "http://localhost:5173").expect("router");
    TestApp {
        server: TestServer::new(app).expect("test server"),
        pool,
        sessions: session_service,
    }
}

fn cookie_header(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("session_token={}", token)).unwrap()
}

async fn count(pool: &DynDatabasePool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS n FROM {}", table);
    sqlx::query(&sql)
        .fetch_one(sqlite_pool(pool).unwrap())
        .await
        .unwrap()
        .get("n")
}

/// Log alice in through the callback and return the issued token
async fn login(app: &TestApp) -> String {
    let response = app.server.get("/api/auth/callback?code=abc123").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    let value = set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("session_token="))
        .expect("session_token pair");
    value.to_string()
}

// ============================================================================
// Login flow
// ============================================================================

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let app = setup().await;

    let response = app.server.get("/api/auth/login").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://provider.test/authorize?client_id=test"
    );
}

#[tokio::test]
async fn test_callback_success_sets_cookie_and_persists() {
    let app = setup().await;

    let response = app.server.get("/api/auth/callback?code=abc123").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("session_token="));
    assert!(!set_cookie.starts_with("session_token=;"));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));

    assert_eq!(count(&app.pool, "users").await, 1);
    assert_eq!(count(&app.pool, "sessions").await, 1);

    let external_id: i64 = sqlx::query("SELECT external_id FROM users")
        .fetch_one(sqlite_pool(&app.pool).unwrap())
        .await
        .unwrap()
        .get("external_id");
    assert_eq!(external_id, 42);
}

#[tokio::test]
async fn test_callback_session_expires_in_seven_days() {
    let app = setup().await;
    let token = login(&app).await;

    let session = app
        .sessions
        .find_by_token(&token)
        .await
        .unwrap()
        .expect("session stored");
    let remaining = session.expires_at - Utc::now();
    assert!(remaining > Duration::days(7) - Duration::minutes(1));
    assert!(remaining <= Duration::days(7));
}

#[tokio::test]
async fn test_callback_twice_keeps_one_user() {
    let app = setup().await;

    let first = login(&app).await;
    let second = login(&app).await;

    assert_ne!(first, second);
    assert_eq!(count(&app.pool, "users").await, 1);
    assert_eq!(count(&app.pool, "sessions").await, 2);
}

#[tokio::test]
async fn test_callback_without_code_redirects_to_failure() {
    let app = setup_with(AuthConfig {
        success_redirect: "/".to_string(),
        failure_redirect: "/login-failed".to_string(),
    })
    .await;

    let response = app.server.get("/api/auth/callback").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login-failed"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(count(&app.pool, "users").await, 0);
    assert_eq!(count(&app.pool, "sessions").await, 0);
}

#[tokio::test]
async fn test_callback_with_rejected_code_redirects_without_cookie() {
    let app = setup().await;

    let response = app.server.get("/api/auth/callback?code=stale").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(count(&app.pool, "users").await, 0);
}

#[tokio::test]
async fn test_callback_with_provider_error_param() {
    let app = setup().await;

    let response = app
        .server
        .get("/api/auth/callback?error=access_denied&error_description=denied")
        .await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_callback_with_repeated_code_redirects_to_failure() {
    let app = setup_with(AuthConfig {
        success_redirect: "/".to_string(),
        failure_redirect: "/login-failed".to_string(),
    })
    .await;

    let response = app
        .server
        .get("/api/auth/callback?code=abc123&code=abc123")
        .await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login-failed"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(count(&app.pool, "users").await, 0);
    assert_eq!(count(&app.pool, "sessions").await, 0);
}

// ============================================================================
// Session gate
// ============================================================================

#[tokio::test]
async fn test_status_without_cookie_is_rejected() {
    let app = setup().await;

    let response = app.server.get("/api/auth/status").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), "no session token");
}

#[tokio::test]
async fn test_status_with_unknown_token_is_rejected() {
    let app = setup().await;

    let response = app
        .server
        .get("/api/auth/status")
        .add_header(header::COOKIE, cookie_header("deadbeef"))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), "invalid session token");
}

#[tokio::test]
async fn test_status_with_valid_cookie_returns_user() {
    let app = setup().await;
    let token = login(&app).await;

    let response = app
        .server
        .get("/api/auth/status")
        .add_header(header::COOKIE, cookie_header(&token))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["user"]["login"], "alice");
    assert_eq!(body["user"]["external_id"], 42);
    assert!(body["user"].get("email").is_none());
}

#[tokio::test]
async fn test_status_finds_token_among_other_cookies() {
    let app = setup().await;
    let token = login(&app).await;

    let cookie = HeaderValue::from_str(&format!("theme=dark; session_token={}; lang=en", token))
        .unwrap();
    let response = app
        .server
        .get("/api/auth/status")
        .add_header(header::COOKIE, cookie)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_removed() {
    let app = setup().await;
    login(&app).await;

    let user_id: i64 = sqlx::query("SELECT id FROM users")
        .fetch_one(sqlite_pool(&app.pool).unwrap())
        .await
        .unwrap()
        .get("id");
    let token = generate_session_token().unwrap();
    let now = Utc::now();
    SqlxSessionRepository::new(app.pool.clone())
        .create(NewSession {
            token: token.clone(),
            user_id,
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        })
        .await
        .unwrap();

    let response = app
        .server
        .get("/api/auth/status")
        .add_header(header::COOKIE, cookie_header(&token))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), "session expired");
    assert!(app.sessions.find_by_token(&token).await.unwrap().is_none());
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_cookie_and_session() {
    let app = setup().await;
    let token = login(&app).await;

    let response = app
        .server
        .post("/api/auth/logout")
        .add_header(header::COOKIE, cookie_header(&token))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("session_token=;"));
    assert!(set_cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    assert_eq!(
        response.json::<Value>(),
        json!({ "message": "Logged out successfully" })
    );
    assert_eq!(count(&app.pool, "sessions").await, 0);

    let after = app
        .server
        .get("/api/auth/status")
        .add_header(header::COOKIE, cookie_header(&token))
        .await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(after.text(), "invalid session token");
}

#[tokio::test]
async fn test_logout_without_cookie_is_rejected() {
    let app = setup().await;

    let response = app.server.post("/api/auth/logout").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn test_post_message_requires_session() {
    let app = setup().await;

    let response = app
        .server
        .post("/api/messages")
        .json(&json!({ "message": "hello" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(count(&app.pool, "messages").await, 0);
}

#[tokio::test]
async fn test_post_message_with_session() {
    let app = setup().await;
    let token = login(&app).await;

    let response = app
        .server
        .post("/api/messages")
        .add_header(header::COOKIE, cookie_header(&token))
        .json(&json!({ "name": "Alice", "message": "hello" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["statusMessage"], "Message added successfully");
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["message"], "hello");
    assert_eq!(count(&app.pool, "messages").await, 1);
}

#[tokio::test]
async fn test_post_message_defaults_name_to_login() {
    let app = setup().await;
    let token = login(&app).await;

    let response = app
        .server
        .post("/api/messages")
        .add_header(header::COOKIE, cookie_header(&token))
        .json(&json!({ "message": "hi" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["name"], "alice");
}

#[tokio::test]
async fn test_post_empty_message_is_bad_request() {
    let app = setup().await;
    let token = login(&app).await;

    let response = app
        .server
        .post("/api/messages")
        .add_header(header::COOKIE, cookie_header(&token))
        .json(&json!({ "name": "Alice", "message": "   " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "VALIDATION_ERROR"
    );
    assert_eq!(count(&app.pool, "messages").await, 0);
}

#[tokio::test]
async fn test_list_messages_is_public_and_newest_first() {
    let app = setup().await;
    let token = login(&app).await;

    for text in ["first", "second"] {
        app.server
            .post("/api/messages")
            .add_header(header::COOKIE, cookie_header(&token))
            .json(&json!({ "message": text }))
            .await;
    }

    let response = app.server.get("/api/messages").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["message"], "second");
    assert_eq!(list[1]["message"], "first");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = setup().await;

    let response = app.server.get("/api/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}
