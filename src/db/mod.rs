use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, RevocationBackend};
use crate::errors::AuthError;

pub mod redis;
pub mod revocation;
pub mod users;

pub use redis::RedisRevocationStore;
pub use revocation::{RevocationStore, SqliteRevocationStore};
pub use users::{SqliteUserDirectory, UserDirectory};

pub async fn create_db_pool(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    // Run migrations
    sqlx::migrate!().run(&pool).await?;

    info!("Database ready");
    Ok(pool)
}

/// Picks the revocation backend named in the config. Redis is the one to use
/// when several instances share a revocation history.
pub async fn create_revocation_store(
    config: &AppConfig,
    pool: &SqlitePool,
) -> Result<Arc<dyn RevocationStore>, AuthError> {
    match config.revocation_backend {
        RevocationBackend::Sqlite => Ok(Arc::new(SqliteRevocationStore::new(pool.clone()))),
        RevocationBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                AuthError::Storage("REVOCATION_BACKEND=redis requires REDIS_URL".to_string())
            })?;
            Ok(Arc::new(RedisRevocationStore::connect(url).await?))
        }
    }
}
