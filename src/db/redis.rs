use async_trait::async_trait;
use std::collections::HashMap;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{error, info, instrument};

use super::revocation::RevocationStore;
use crate::errors::{AuthError, AuthResult};
use crate::models::revocation::RecordedToken;

const REVOKED_TOKENS_KEY: &str = "revoked_tokens";
const REVOKED_SEQ_KEY: &str = "revoked_tokens:seq";

/// Revocation store shared by every server instance. Each hash field is a
/// token string; its value is `"<id>:<created_at>"`.
#[derive(Clone)]
pub struct RedisRevocationStore {
    con: ConnectionManager,
}

impl RedisRevocationStore {
    #[instrument]
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        info!(url = %redis_url, "Initializing Redis connection");

        let client = Client::open(redis_url).map_err(|e| {
            error!(error = %e, "Failed to create Redis client");
            e
        })?;
        let con = ConnectionManager::new(client).await.map_err(|e| {
            error!(error = %e, "Failed to get Redis connection");
            e
        })?;

        info!("Redis revocation store ready");
        Ok(Self { con })
    }

    fn parse_record(token: String, raw: &str) -> AuthResult<RecordedToken> {
        let (id, created_at) = raw
            .split_once(':')
            .and_then(|(id, ts)| Some((id.parse().ok()?, ts.parse().ok()?)))
            .ok_or_else(|| AuthError::Storage(format!("malformed revocation record: {raw}")))?;

        Ok(RecordedToken { id, token, created_at })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    #[instrument(skip(self, token))]
    async fn record(&self, token: &str) -> AuthResult<RecordedToken> {
        let mut con = self.con.clone();

        if let Some(existing) = con
            .hget::<_, _, Option<String>>(REVOKED_TOKENS_KEY, token)
            .await?
        {
            return Self::parse_record(token.to_string(), &existing);
        }

        let id: i64 = con.incr(REVOKED_SEQ_KEY, 1).await?;
        let value = format!("{}:{}", id, Utc::now().timestamp());
        let inserted: bool = con.hset_nx(REVOKED_TOKENS_KEY, token, &value).await?;

        if inserted {
            info!(record_id = id, "Token recorded as revoked");
            return Self::parse_record(token.to_string(), &value);
        }

        // Lost a race with another writer; theirs is the record.
        let existing: String = con.hget(REVOKED_TOKENS_KEY, token).await?;
        Self::parse_record(token.to_string(), &existing)
    }

    #[instrument(skip(self, token))]
    async fn lookup(&self, token: &str) -> AuthResult<bool> {
        let mut con = self.con.clone();
        let found: bool = con.hexists(REVOKED_TOKENS_KEY, token).await?;
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> AuthResult<Vec<RecordedToken>> {
        let mut con = self.con.clone();
        let entries: HashMap<String, String> = con.hgetall(REVOKED_TOKENS_KEY).await?;

        let mut records = entries
            .into_iter()
            .map(|(token, raw)| Self::parse_record(token, &raw))
            .collect::<AuthResult<Vec<_>>>()?;
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}
