use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::errors::AuthResult;
use crate::models::revocation::RecordedToken;

/// Durable, append-only record of token strings that must never be accepted
/// again. This is the source of truth for revocation across every instance.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Records `token`. Recording an already-recorded token returns the
    /// existing record and creates no duplicate.
    async fn record(&self, token: &str) -> AuthResult<RecordedToken>;

    /// Hot path: consulted on every protected request.
    async fn lookup(&self, token: &str) -> AuthResult<bool>;

    /// Administrative listing, oldest first.
    async fn list(&self) -> AuthResult<Vec<RecordedToken>>;
}

#[derive(Clone)]
pub struct SqliteRevocationStore {
    pool: SqlitePool,
}

impl SqliteRevocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for SqliteRevocationStore {
    #[instrument(skip(self, token))]
    async fn record(&self, token: &str) -> AuthResult<RecordedToken> {
        let inserted = sqlx::query(
            "INSERT INTO blacklisted_tokens (token, created_at) VALUES (?, ?) \
             ON CONFLICT(token) DO NOTHING",
        )
        .bind(token)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?
        .rows_affected();

        let record = sqlx::query_as::<_, RecordedToken>(
            "SELECT id, token, created_at FROM blacklisted_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        if inserted > 0 {
            info!(record_id = record.id, "Token recorded as revoked");
        }
        Ok(record)
    }

    #[instrument(skip(self, token))]
    async fn lookup(&self, token: &str) -> AuthResult<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM blacklisted_tokens WHERE token = ?)",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> AuthResult<Vec<RecordedToken>> {
        let records = sqlx::query_as::<_, RecordedToken>(
            "SELECT id, token, created_at FROM blacklisted_tokens ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
