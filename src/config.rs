use dotenv::dotenv;
use std::{env, net::SocketAddr, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    Sqlite,
    Redis,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub revocation_backend: RevocationBackend,
    pub bind_addr: SocketAddr,
    pub cookie_secure: bool,
    pub auth: AuthConfig,
}

/// Token lifetimes and key material. Keys are validated by `TokenCodec::new`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_key: String,
    pub secret_key: String,
    pub access_ttl: Duration,
    pub secret_ttl: Duration,
    pub renew_window: Duration,
    pub storage_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            access_ttl: Duration::from_secs(60),
            secret_ttl: Duration::from_secs(300),
            renew_window: Duration::from_secs(15),
            storage_timeout: Duration::from_millis(2000),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let revocation_backend = match env::var("REVOCATION_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "sqlite" => RevocationBackend::Sqlite,
            "redis" => RevocationBackend::Redis,
            other => {
                return Err(ConfigError::Invalid {
                    key: "REVOCATION_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            access_key: env::var("JWT_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("JWT_SECRET_KEY").unwrap_or_default(),
            access_ttl: Duration::from_secs(parse_or("JWT_ACCESS_TTL_SECS", defaults.access_ttl.as_secs())?),
            secret_ttl: Duration::from_secs(parse_or("JWT_EXP", defaults.secret_ttl.as_secs())?),
            renew_window: Duration::from_secs(parse_or("RENEW_WINDOW_SECS", defaults.renew_window.as_secs())?),
            storage_timeout: Duration::from_millis(parse_or(
                "STORAGE_TIMEOUT_MS",
                defaults.storage_timeout.as_millis() as u64,
            )?),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:storefront.db".to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            revocation_backend,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?,
            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            auth,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
