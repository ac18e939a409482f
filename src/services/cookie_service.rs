use time::{Duration, OffsetDateTime};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use crate::config::AuthConfig;
use crate::models::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const SECRET_TOKEN_COOKIE: &str = "secret_token";
const HTTP_ONLY: bool = true;
const SAME_SITE: SameSite = SameSite::Strict;

/// Writes the token cookies onto the response jar. Cookie lifetimes follow
/// the token lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct CookieService {
    secure: bool,
    access_ttl: Duration,
    secret_ttl: Duration,
}

impl CookieService {
    pub fn new(secure: bool, config: &AuthConfig) -> Self {
        Self {
            secure,
            access_ttl: Duration::seconds(config.access_ttl.as_secs() as i64),
            secret_ttl: Duration::seconds(config.secret_ttl.as_secs() as i64),
        }
    }

    pub fn set_auth_cookies(&self, cookies: &Cookies, pair: &TokenPair) {
        self.set_access_cookie(cookies, &pair.access_token);
        cookies.add(self.create_cookie(SECRET_TOKEN_COOKIE, &pair.secret_token, self.secret_ttl));
    }

    pub fn set_access_cookie(&self, cookies: &Cookies, access_token: &str) {
        cookies.add(self.create_cookie(ACCESS_TOKEN_COOKIE, access_token, self.access_ttl));
    }

    pub fn clear_auth_cookies(&self, cookies: &Cookies) {
        cookies.add(self.create_removal_cookie(ACCESS_TOKEN_COOKIE));
        cookies.add(self.create_removal_cookie(SECRET_TOKEN_COOKIE));
    }

    fn create_cookie(&self, name: &'static str, value: &str, max_age: Duration) -> Cookie<'static> {
        let expires = OffsetDateTime::now_utc() + max_age;

        Cookie::build((name, value.to_string()))
            .secure(self.secure)
            .http_only(HTTP_ONLY)
            .same_site(SAME_SITE)
            .path("/")
            .expires(expires)
            .build()
    }

    fn create_removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        Cookie::build((name, ""))
            .secure(self.secure)
            .http_only(HTTP_ONLY)
            .same_site(SAME_SITE)
            .path("/")
            .expires(OffsetDateTime::now_utc() - Duration::days(1))
            .build()
    }
}
