use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::errors::{AuthError, AuthResult};
use crate::models::user::{NewUser, User, UserRow};

/// Narrow view of the user store that authentication depends on.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> AuthResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    async fn compare_passwords(&self, hash: &str, plaintext: &str) -> bool;

    async fn create_user(&self, new_user: NewUser) -> AuthResult<User>;
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, role, phone_number, address, created_at";

#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
    hash_cost: u32,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    #[instrument(skip(self))]
    async fn get_user_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn compare_passwords(&self, hash: &str, plaintext: &str) -> bool {
        let (hash, plaintext) = (hash.to_string(), plaintext.to_string());
        match tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!(error = %e, "Stored password hash could not be verified");
                false
            }
            Err(e) => {
                warn!(error = %e, "Password check task failed");
                false
            }
        }
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    async fn create_user(&self, new_user: NewUser) -> AuthResult<User> {
        if self.get_user_by_email(&new_user.email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let cost = self.hash_cost;
        let password = new_user.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users \
             (first_name, last_name, email, password_hash, role, phone_number, address, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.email)
        .bind(&password_hash)
        .bind(new_user.role.as_str())
        .bind(&new_user.phone_number)
        .bind(&new_user.address)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => AuthError::UserExists,
            _ => AuthError::from(e),
        })?;

        let user = User::try_from(row)?;
        info!(user_id = user.id, role = %user.role, "Created user");
        Ok(user)
    }
}
