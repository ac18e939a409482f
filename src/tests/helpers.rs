use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::SET_COOKIE, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Once,
};
use std::time::Duration;
use tower::ServiceExt;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::AuthConfig;
use crate::db::{RevocationStore, SqliteRevocationStore, SqliteUserDirectory, UserDirectory};
use crate::errors::{AuthError, AuthResult};
use crate::models::{jwt::Role, revocation::RecordedToken, user::{NewUser, User}};
use crate::services::{CookieService, TokenCodec, TokenService};
use crate::AppState;

static INIT: Once = Once::new();

pub const PASSWORD: &str = "password123";

/// Initialize logging exactly once
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_max_level(Level::ERROR)
            .with_span_events(FmtSpan::NONE)
            .init();
    });
}

/// In-memory database. A single connection keeps every query on the same
/// database; each `sqlite::memory:` connection would otherwise get its own.
pub async fn setup_test_db() -> SqlitePool {
    init_tracing();
    info!("Setting up test database");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        access_key: "test-access-key".to_string(),
        secret_key: "test-secret-key".to_string(),
        ..AuthConfig::default()
    }
}

pub fn test_users(pool: &SqlitePool) -> Arc<dyn UserDirectory> {
    Arc::new(SqliteUserDirectory::new(pool.clone()).with_hash_cost(4)) // bcrypt minimum cost (bcrypt::MIN_COST is private in 0.15)
}

pub fn build_token_service(
    users: Arc<dyn UserDirectory>,
    revocations: Arc<dyn RevocationStore>,
    config: AuthConfig,
) -> TokenService {
    let codec = TokenCodec::new(&config.access_key, &config.secret_key)
        .expect("test keys are valid");
    TokenService::new(codec, revocations, users, config)
}

/// Token service over SQLite for both users and revocations.
pub async fn setup_token_service() -> (TokenService, Arc<dyn UserDirectory>) {
    let pool = setup_test_db().await;
    let users = test_users(&pool);
    let revocations = Arc::new(SqliteRevocationStore::new(pool));
    let service = build_token_service(Arc::clone(&users), revocations, test_auth_config());
    (service, users)
}

pub fn build_state(pool: &SqlitePool, config: AuthConfig) -> AppState {
    let users = test_users(pool);
    let revocations = Arc::new(SqliteRevocationStore::new(pool.clone()));

    AppState {
        cookies: CookieService::new(false, &config),
        tokens: Arc::new(build_token_service(Arc::clone(&users), revocations, config)),
        users,
    }
}

pub fn create_test_app(pool: &SqlitePool) -> Router {
    crate::create_router(build_state(pool, test_auth_config()))
}

pub async fn create_user(users: &dyn UserDirectory, email: &str, role: Role) -> User {
    users
        .create_user(NewUser {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: email.to_string(),
            password: PASSWORD.to_string(),
            phone_number: "628123456789".to_string(),
            address: "1 Test Street".to_string(),
            role,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn test_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: Option<HeaderMap>,
) -> (StatusCode, String, HeaderMap) {
    info!(method = %method, uri = %uri, "Making test request");

    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(custom_headers) = headers {
        for (key, value) in custom_headers.iter() {
            request = request.header(key, value);
        }
    }

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = String::from_utf8(
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();

    info!(status = %status, body = %body, "Test response received");
    (status, body, headers)
}

/// `name=value` pairs from every `Set-Cookie` header.
pub fn set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| cookie::Cookie::parse(value.to_string()).ok())
        .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
        .collect()
}

/// Every call fails as if the database were unreachable.
#[derive(Default)]
pub struct FailingRevocationStore {
    pub calls: AtomicUsize,
}

impl FailingRevocationStore {
    fn fail<T>(&self) -> AuthResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Storage("connection refused".to_string()))
    }
}

#[async_trait]
impl RevocationStore for FailingRevocationStore {
    async fn record(&self, _token: &str) -> AuthResult<RecordedToken> {
        self.fail()
    }

    async fn lookup(&self, _token: &str) -> AuthResult<bool> {
        self.fail()
    }

    async fn list(&self) -> AuthResult<Vec<RecordedToken>> {
        self.fail()
    }
}

/// Delegates to `inner` after sleeping on every lookup.
pub struct SlowRevocationStore {
    pub delay: Duration,
    pub inner: Arc<dyn RevocationStore>,
}

#[async_trait]
impl RevocationStore for SlowRevocationStore {
    async fn record(&self, token: &str) -> AuthResult<RecordedToken> {
        self.inner.record(token).await
    }

    async fn lookup(&self, token: &str) -> AuthResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.lookup(token).await
    }

    async fn list(&self) -> AuthResult<Vec<RecordedToken>> {
        self.inner.list().await
    }
}
