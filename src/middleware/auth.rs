use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use tower_cookies::Cookies;
use tracing::{debug, warn};

use crate::{
    errors::{AuthError, AuthResult},
    models::jwt::{ClaimSet, Role, TokenKind},
    utils::carrier,
    AppState,
};

pub const RENEWED_ACCESS_TOKEN: HeaderName = HeaderName::from_static("x-renewed-access-token");

/// The caller behind an accepted access token, as handed to handlers.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
}

impl Identity {
    fn from_claims(claims: &ClaimSet) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            name: claims.name.clone(),
            email: claims.email.clone(),
            phone_number: claims.phone_number.clone(),
            address: claims.address.clone(),
        }
    }

    pub fn require_role(&self, role: Role) -> AuthResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// Set by `optional_auth`; `None` means no token was presented.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[derive(Debug, Clone, Copy)]
enum Policy {
    Optional,
    Authenticated,
    Role(Role),
}

pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    gate(state, cookies, request, next, Policy::Authenticated).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    gate(state, cookies, request, next, Policy::Role(Role::Admin)).await
}

/// Lets anonymous callers through. A token that is presented must still be
/// valid.
pub async fn optional_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    gate(state, cookies, request, next, Policy::Optional).await
}

async fn gate(
    state: AppState,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
    policy: Policy,
) -> Result<Response, AuthError> {
    let Some(token) = carrier::access_token(request.headers()) else {
        if let Policy::Optional = policy {
            request.extensions_mut().insert(MaybeUser(None));
            return Ok(next.run(request).await);
        }
        return Err(AuthError::Unauthenticated);
    };

    let claims = state
        .tokens
        .validate(&token, TokenKind::Access)
        .await
        .map_err(|e| {
            debug!(error = %e, "Access token rejected");
            e.at_gate()
        })?;

    let identity = Identity::from_claims(&claims);
    if let Policy::Role(role) = policy {
        identity.require_role(role).inspect_err(|_| {
            warn!(user_id = identity.user_id, required = %role, "Role check failed");
        })?;
    }

    let renewed = renew_if_expiring(&state, request.headers(), &claims).await;
    if let Some(token) = &renewed {
        state.cookies.set_access_cookie(&cookies, token);
    }

    if let Policy::Optional = policy {
        request.extensions_mut().insert(MaybeUser(Some(identity)));
    } else {
        request.extensions_mut().insert(CurrentUser(identity));
    }

    let mut response = next.run(request).await;
    if let Some(value) = renewed.and_then(|token| HeaderValue::from_str(&token).ok()) {
        response.headers_mut().insert(RENEWED_ACCESS_TOKEN, value);
    }
    Ok(response)
}

/// Swaps an access token that is about to expire for a fresh one. Failure
/// leaves the request on the token that was already accepted.
async fn renew_if_expiring(
    state: &AppState,
    headers: &HeaderMap,
    claims: &ClaimSet,
) -> Option<String> {
    let window = state.tokens.config().renew_window.as_secs() as i64;
    if claims.exp - Utc::now().timestamp() > window {
        return None;
    }
    let secret = carrier::secret_token(headers)?;

    match state.tokens.renew(claims, &secret).await {
        Ok(token) => {
            debug!(user_id = claims.sub, "Access token renewed by gate");
            Some(token)
        }
        Err(e) => {
            warn!(user_id = claims.sub, error = %e, "Auto-renew failed");
            None
        }
    }
}
