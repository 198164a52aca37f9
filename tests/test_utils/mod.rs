//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body};
use chrono::Utc;
use tempfile::TempDir;

use katalyst::api::AppState;
use katalyst::api::app;
use katalyst::auth::SessionUser;
use katalyst::auth::session::create_session;
use katalyst::core::db::{async_db, initialize_db};
use katalyst::core::retry::RetryPolicy;
use katalyst::core::{AppConfig, Environment};

pub const TEST_EMAIL: &str = "ada@example.com";

/// Keeps the temporary db directory alive for as long as the test needs
/// the app.
pub struct TestContext {
    pub state: Arc<AppState>,
    _dir: TempDir,
}

impl TestContext {
    pub fn app(&self) -> Router {
        app(Arc::clone(&self.state))
    }
}

/// Config with every Google and connector endpoint pointed at
/// `server_url`, usually a `mockito` server.
pub fn test_config(server_url: &str, db_path: &str) -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        db_path: db_path.to_string(),
        app_url: String::from("http://localhost:3000"),
        environment: Environment::Test,
        google_client_id: String::from("test_client_id"),
        google_client_secret: String::from("test_client_secret"),
        google_auth_url: format!("{}/o/oauth2/v2/auth", server_url),
        google_token_url: format!("{}/token", server_url),
        google_api_url: server_url.to_string(),
        google_api_key: None,
        google_calendar_id: None,
        enable_api_key_fallback: false,
        composio_api_key: None,
        composio_auth_config_id: None,
        composio_api_url: server_url.to_string(),
    }
}

/// Creates the application state backed by a fresh db in a temporary
/// directory. `customize` can adjust the config before the state is
/// built.
pub async fn test_context_with(server_url: &str, customize: impl FnOnce(&mut AppConfig)) -> TestContext {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("katalyst.db");
    let db_path = db_path.to_str().unwrap();

    let db = async_db(db_path).await.expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await
    .unwrap();

    let mut config = test_config(server_url, db_path);
    customize(&mut config);

    let mut state = AppState::new(db, config);
    // Keep failing upstream calls from slowing the suite down
    state.retry = RetryPolicy::new(1, 1, 1);

    TestContext {
        state: Arc::new(state),
        _dir: dir,
    }
}

pub async fn test_context(server_url: &str) -> TestContext {
    test_context_with(server_url, |_| {}).await
}

/// Signs `email` in by writing a session directly and returns the
/// `Cookie` header value for it.
pub async fn signed_in_cookie(state: &AppState, email: &str) -> String {
    let user = SessionUser {
        id: email.to_string(),
        email: email.to_string(),
        name: Some(String::from("Ada Lovelace")),
        image: None,
    };
    let session = create_session(&state.db, &user, Utc::now())
        .await
        .expect("Failed to create session");
    format!("session-token={}", session.id)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}
