use serde::{Deserialize, Serialize};

use super::jwt::Role;
use crate::errors::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone_number: String,
    pub address: String,
    pub created_at: i64,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Raw `users` row; `role` is stored as text.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub phone_number: String,
    pub address: String,
    pub created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(AuthError::Storage)?;

        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            phone_number: row.phone_number,
            address: row.address,
            created_at: row.created_at,
        })
    }
}

/// A user about to be created. `password` is plaintext and is hashed by the
/// directory before it is stored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub address: String,
    #[serde(skip, default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Customer
}

impl NewUser {
    pub fn validate(&self) -> Result<(), AuthError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone_number", &self.phone_number),
            ("address", &self.address),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AuthError::BadRequest(format!("{field} is required")));
        }
        if !self.email.contains('@') {
            return Err(AuthError::BadRequest("email is invalid".to_string()));
        }
        let len = self.password.chars().count();
        if !(3..=130).contains(&len) {
            return Err(AuthError::BadRequest(
                "password must be between 3 and 130 characters".to_string(),
            ));
        }
        Ok(())
    }
}
