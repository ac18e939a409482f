// src/models/jwt.rs
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Which of the two cooperating tokens a string is. Each kind has its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Secret,
}

/// Signed payload shared by access and secret tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub sub: i64,             // user id
    pub role: Role,
    pub name: String,         // "first last"
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub exp: i64,             // unix seconds, expired when now >= exp
    pub iat: i64,
    pub jti: String,          // makes tokens minted in the same second distinct
    pub sid: String,          // login session both tokens belong to
    pub kind: TokenKind,
}

impl ClaimSet {
    pub fn for_user(user: &User, sid: &str, kind: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user.id,
            role: user.role,
            name: user.display_name(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            address: user.address.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            sid: sid.to_string(),
            kind,
        }
    }

    /// Same identity and session, new kind and lifetime. Used when a secret
    /// token mints a fresh access token, which never outlives that secret.
    pub fn reissue(&self, kind: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            exp: (now + ttl).timestamp().min(self.exp),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind,
            ..self.clone()
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// True when every identity-bearing claim still agrees with the stored user.
    pub fn matches_user(&self, user: &User) -> bool {
        self.sub == user.id
            && self.role == user.role
            && self.name == user.display_name()
            && self.email == user.email
            && self.phone_number == user.phone_number
            && self.address == user.address
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub secret_token: String,
}
