use serde::Serialize;

/// One row of the append-only revocation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RecordedToken {
    pub id: i64,
    pub token: String,
    pub created_at: i64,
}
