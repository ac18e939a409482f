// src/services/token_service.rs
use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{RevocationStore, UserDirectory};
use crate::errors::{AuthError, AuthResult};
use crate::models::jwt::{ClaimSet, TokenKind, TokenPair};
use crate::models::revocation::RecordedToken;
use crate::models::user::User;
use super::{SessionCache, TokenCodec};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Issues, validates, refreshes and revokes token pairs.
///
/// A token is valid only when it verifies under its kind's key, is not
/// expired, is absent from the revocation store, and still agrees with the
/// user record. The revocation store is consulted before anything else.
pub struct TokenService {
    codec: TokenCodec,
    revocations: Arc<dyn RevocationStore>,
    users: Arc<dyn UserDirectory>,
    sessions: SessionCache,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        revocations: Arc<dyn RevocationStore>,
        users: Arc<dyn UserDirectory>,
        config: AuthConfig,
    ) -> Self {
        Self {
            codec,
            revocations,
            users,
            sessions: SessionCache::new(),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /* ---------- PUBLIC API ---------- */

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<TokenPair> {
        let user = self
            .with_retry(|| self.users.get_user_by_email(&credentials.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .users
            .compare_passwords(&user.password_hash, &credentials.password)
            .await
        {
            warn!(user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(&user)?;
        info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(pair)
    }

    /// Mints a fresh session for `user` and makes both tokens current.
    pub fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let sid = Uuid::new_v4().to_string();
        let access = ClaimSet::for_user(user, &sid, TokenKind::Access, self.access_ttl());
        let secret = ClaimSet::for_user(user, &sid, TokenKind::Secret, self.secret_ttl());

        let pair = TokenPair {
            access_token: self.codec.issue(&access)?,
            secret_token: self.codec.issue(&secret)?,
        };

        self.sessions
            .set(&sid, TokenKind::Access, pair.access_token.clone(), secret.exp);
        self.sessions
            .set(&sid, TokenKind::Secret, pair.secret_token.clone(), secret.exp);
        Ok(pair)
    }

    #[instrument(skip(self, token))]
    pub async fn validate(&self, token: &str, kind: TokenKind) -> AuthResult<ClaimSet> {
        let claims = self.verify(token, kind).await?;

        let user = self
            .with_retry(|| self.users.get_user_by_id(claims.sub))
            .await?
            .ok_or_else(|| {
                warn!(user_id = claims.sub, "Token subject no longer exists");
                AuthError::IdentityMismatch
            })?;

        if !claims.matches_user(&user) {
            warn!(user_id = claims.sub, "Token claims no longer match user record");
            return Err(AuthError::IdentityMismatch);
        }

        Ok(claims)
    }

    /// Mints a new access token from a valid secret token. The secret token
    /// stays valid and the previously current access token simply stops being
    /// current.
    #[instrument(skip(self, secret_token))]
    pub async fn refresh(&self, secret_token: &str) -> AuthResult<String> {
        let claims = self.validate(secret_token, TokenKind::Secret).await?;
        self.mint_access(secret_token, &claims).await
    }

    /// Refresh on behalf of the access gate. The secret token must belong to
    /// the same session as the access token being renewed.
    #[instrument(skip(self, access, secret_token), fields(user_id = access.sub))]
    pub async fn renew(&self, access: &ClaimSet, secret_token: &str) -> AuthResult<String> {
        let claims = self.validate(secret_token, TokenKind::Secret).await?;
        if claims.sid != access.sid || claims.sub != access.sub {
            warn!("Renewal rejected: secret token belongs to another session");
            return Err(AuthError::IdentityMismatch);
        }
        self.mint_access(secret_token, &claims).await
    }

    /// Revokes the secret token, every token current for its session, and the
    /// presented access token when it belongs to the same session. The secret
    /// token is recorded first so a refresh racing this call sees it revoked.
    #[instrument(skip(self, secret_token, access_token))]
    pub async fn logout(&self, secret_token: &str, access_token: Option<&str>) -> AuthResult<()> {
        // No identity cross-check: a user whose profile changed can still log out.
        let claims = self.verify(secret_token, TokenKind::Secret).await?;

        self.record(secret_token).await?;

        let presented = access_token.filter(|token| self.same_session(token, &claims));
        let (current_access, current_secret) = self.sessions.clear(&claims.sid);
        let mut pending: Vec<String> = current_access
            .into_iter()
            .chain(current_secret)
            .chain(presented.map(str::to_string))
            .filter(|token| token != secret_token)
            .collect();
        pending.sort();
        pending.dedup();

        for token in &pending {
            self.record(token).await?;
        }

        info!(user_id = claims.sub, revoked = pending.len() + 1, "User logged out");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_revoked(&self) -> AuthResult<Vec<RecordedToken>> {
        self.with_retry(|| self.revocations.list()).await
    }

    pub async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
        self.with_retry(|| self.revocations.lookup(token)).await
    }

    /* ---------- PRIVATE HELPERS ---------- */

    /// Revocation check, then signature and expiry.
    async fn verify(&self, token: &str, kind: TokenKind) -> AuthResult<ClaimSet> {
        if self.is_revoked(token).await? {
            return Err(AuthError::Blacklisted);
        }
        self.codec.decode(token, kind)
    }

    /// An access token presented at logout is only revoked when it is one of
    /// this session's. Expired or foreign tokens are left out of the store.
    fn same_session(&self, access_token: &str, secret: &ClaimSet) -> bool {
        match self.codec.decode(access_token, TokenKind::Access) {
            Ok(access) if access.sid == secret.sid && access.sub == secret.sub => true,
            Ok(_) => {
                warn!(user_id = secret.sub, "Logout ignored an access token from another session");
                false
            }
            Err(_) => false,
        }
    }

    async fn mint_access(&self, secret_token: &str, claims: &ClaimSet) -> AuthResult<String> {
        let access = self
            .codec
            .issue(&claims.reissue(TokenKind::Access, self.access_ttl()))?;
        self.sessions
            .set(&claims.sid, TokenKind::Access, access.clone(), claims.exp);

        // A logout that got in after our first check has recorded the secret
        // token by now. The token just minted must not outlive it.
        match self.is_revoked(secret_token).await {
            Ok(false) => {}
            Ok(true) => {
                // Logout may already have dropped the session; don't revive it.
                self.sessions.clear(&claims.sid);
                self.record(&access).await?;
                warn!(user_id = claims.sub, "Secret token revoked during refresh");
                return Err(AuthError::Blacklisted);
            }
            Err(e) => {
                self.sessions.blacklist(&claims.sid, TokenKind::Access);
                return Err(e);
            }
        }

        info!(user_id = claims.sub, "Access token refreshed");
        Ok(access)
    }

    async fn record(&self, token: &str) -> AuthResult<RecordedToken> {
        self.with_retry(|| self.revocations.record(token)).await
    }

    /// Runs a storage call under the configured timeout, retrying once on a
    /// storage failure. Every store operation is idempotent.
    async fn with_retry<T, F, Fut>(&self, mut call: F) -> AuthResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        match self.bounded(call()).await {
            Err(AuthError::Storage(e)) => {
                warn!(error = %e, "Storage call failed, retrying once");
                self.bounded(call()).await
            }
            other => other,
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = AuthResult<T>>) -> AuthResult<T> {
        tokio::time::timeout(self.config.storage_timeout, call).await?
    }

    fn access_ttl(&self) -> chrono::Duration {
        to_chrono(self.config.access_ttl)
    }

    fn secret_ttl(&self) -> chrono::Duration {
        to_chrono(self.config.secret_ttl)
    }
}

fn to_chrono(ttl: std::time::Duration) -> chrono::Duration {
    chrono::Duration::seconds(ttl.as_secs() as i64)
}
