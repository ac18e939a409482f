use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod services;
mod utils;
#[cfg(test)]
mod tests;

use config::AppConfig;
use db::{SqliteUserDirectory, UserDirectory};
use services::{CookieService, TokenCodec, TokenService};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserDirectory>,
    pub cookies: CookieService,
}

pub fn create_router(state: AppState) -> Router {
    // Create a CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/me", get(api::user::me))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let admin = Router::new()
        .route("/blacklisted_tokens", get(api::auth::blacklisted_tokens))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin));

    let open = Router::new()
        .route("/whoami", get(api::user::whoami))
        .route_layer(from_fn_with_state(state.clone(), middleware::optional_auth));

    let routes = Router::new()
        .route("/register", post(api::auth::register))
        .route("/login", post(api::auth::login))
        .route("/refresh", post(api::auth::refresh))
        .route("/logout", post(api::auth::logout))
        .merge(protected)
        .merge(admin)
        .merge(open);

    Router::new()
        .nest("/api/v1", routes)
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Loads .env first so RUST_LOG from it reaches the filter
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_auth=info,tower_http=info")),
        )
        .init();

    // Bad key material is the one fatal signing error.
    let codec = TokenCodec::new(&config.auth.access_key, &config.auth.secret_key).map_err(|e| {
        error!(error = %e, "Refusing to start");
        e
    })?;

    // Initialize database
    let pool = db::create_db_pool(&config.database_url).await?;
    let revocations = db::create_revocation_store(&config, &pool).await?;
    let users: Arc<dyn UserDirectory> = Arc::new(SqliteUserDirectory::new(pool));

    let state = AppState {
        tokens: Arc::new(TokenService::new(
            codec,
            revocations,
            Arc::clone(&users),
            config.auth.clone(),
        )),
        users,
        cookies: CookieService::new(config.cookie_secure, &config.auth),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, backend = ?config.revocation_backend, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
