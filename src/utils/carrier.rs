use cookie::Cookie;
use http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderName,
};

use crate::services::cookie_service::{ACCESS_TOKEN_COOKIE, SECRET_TOKEN_COOKIE};

/// Header carrying the secret token next to `Authorization`.
pub const AUTHORIZATION_X: HeaderName = HeaderName::from_static("authorization-x");

const BEARER: &str = "Bearer ";

/// `Authorization` (raw or `Bearer`), then the `access_token` cookie.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    header_token(headers, &AUTHORIZATION).or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

/// `Authorization-X`, then the `secret_token` cookie.
pub fn secret_token(headers: &HeaderMap) -> Option<String> {
    header_token(headers, &AUTHORIZATION_X).or_else(|| cookie_value(headers, SECRET_TOKEN_COOKIE))
}

fn header_token(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    let token = raw.strip_prefix(BEARER).unwrap_or(raw).trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}
