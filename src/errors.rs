use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("signing key material missing or misconfigured: {0}")]
    Signing(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token has been revoked")]
    Blacklisted,

    #[error("token identity no longer matches the user record")]
    IdentityMismatch,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user already exists")]
    UserExists,

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Collapses every token failure into `Unauthenticated` so callers cannot
    /// tell a revoked token from a forged or expired one. Storage failures are
    /// folded in as well: the gate fails closed.
    pub fn at_gate(self) -> Self {
        match self {
            AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Blacklisted
            | AuthError::IdentityMismatch
            | AuthError::Storage(_) => AuthError::Unauthenticated,
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Blacklisted
            | AuthError::IdentityMismatch
            | AuthError::Unauthenticated
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Signing(_) | AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Blacklisted
            | AuthError::IdentityMismatch
            | AuthError::Unauthenticated => "unauthenticated".to_string(),
            AuthError::Signing(_) | AuthError::Storage(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AuthError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AuthError::Storage("storage call timed out".to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed with internal error");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
