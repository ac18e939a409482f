use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::info;

use crate::{
    errors::AuthError,
    models::{jwt::TokenPair, revocation::RecordedToken, user::{NewUser, User}},
    services::Credentials,
    utils::carrier,
    AppState,
};

/// Fallback for clients that post tokens instead of sending headers/cookies.
#[derive(Debug, Default, Deserialize)]
pub struct TokenBody {
    pub secret_token: Option<String>,
    pub access_token: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AuthError> {
    payload.validate()?;
    let user = state.users.create_user(payload).await?;
    info!(user_id = user.id, "Registered user");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state.tokens.login(&credentials).await?;
    state.cookies.set_auth_cookies(&cookies, &pair);
    Ok(Json(pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    body: Option<Json<TokenBody>>,
) -> Result<Json<TokenPair>, AuthError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let secret_token = carrier::secret_token(&headers)
        .or(body.secret_token)
        .ok_or(AuthError::Unauthenticated)?;

    let access_token = state.tokens.refresh(&secret_token).await?;
    state.cookies.set_access_cookie(&cookies, &access_token);

    Ok(Json(TokenPair {
        access_token,
        secret_token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    body: Option<Json<TokenBody>>,
) -> Result<StatusCode, AuthError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let secret_token = carrier::secret_token(&headers)
        .or(body.secret_token)
        .ok_or(AuthError::Unauthenticated)?;
    let access_token = carrier::access_token(&headers).or(body.access_token);

    state
        .tokens
        .logout(&secret_token, access_token.as_deref())
        .await?;
    state.cookies.clear_auth_cookies(&cookies);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn blacklisted_tokens(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecordedToken>>, AuthError> {
    Ok(Json(state.tokens.list_revoked().await?))
}
