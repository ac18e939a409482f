// src/services/jwt_service.rs
use crate::errors::{AuthError, AuthResult};
use crate::models::jwt::{ClaimSet, TokenKind};

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

#[derive(Clone)]
struct SigningKeys {
    enc_key: EncodingKey,
    dec_key: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            enc_key: EncodingKey::from_secret(secret.as_bytes()),
            dec_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies claim sets. Holds no state besides key material, so
/// decoding is a pure function of (token, key, clock). Revocation is checked
/// by the caller.
#[derive(Clone)]
pub struct TokenCodec {
    access: SigningKeys,
    secret: SigningKeys,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(access_key: &str, secret_key: &str) -> AuthResult<Self> {
        if access_key.trim().is_empty() {
            return Err(AuthError::Signing("access key is not set".to_string()));
        }
        if secret_key.trim().is_empty() {
            return Err(AuthError::Signing("secret key is not set".to_string()));
        }
        if access_key == secret_key {
            return Err(AuthError::Signing(
                "access and secret keys must differ".to_string(),
            ));
        }

        // Expiry is checked by hand below: inclusive and without leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            access: SigningKeys::from_secret(access_key),
            secret: SigningKeys::from_secret(secret_key),
            validation,
        })
    }

    /* ---------- PUBLIC API ---------- */

    /// Signs `claims` with the key belonging to `claims.kind`.
    pub fn issue(&self, claims: &ClaimSet) -> AuthResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.kind).enc_key,
        )
        .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn decode(&self, token: &str, kind: TokenKind) -> AuthResult<ClaimSet> {
        self.decode_at(token, kind, Utc::now().timestamp())
    }

    /// Verifies `token` against the key for `kind` as of `now` (unix seconds).
    pub fn decode_at(&self, token: &str, kind: TokenKind, now: i64) -> AuthResult<ClaimSet> {
        let claims = decode::<ClaimSet>(token, &self.keys(kind).dec_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, ?kind, "Token failed verification");
                AuthError::InvalidSignature
            })?;

        if claims.kind != kind {
            return Err(AuthError::InvalidSignature);
        }
        if claims.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /* ---------- PRIVATE HELPERS ---------- */

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Secret => &self.secret,
        }
    }
}
