pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod mail;
pub mod password;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

use api::{UPLOADS_URL_PREFIX, create_api_router, route_not_found};
use auth::CookieConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
};
use db::Database;
use jwt::JwtConfig;
use mail::Mailer;
use rate_limit::{RateLimitConfig, rate_limit_global};
use security_headers::security_headers;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds (also the refresh cookie Max-Age)
    pub refresh_ttl: u64,
    /// Refresh cookie attributes
    pub cookie: CookieConfig,
    /// Client origin used in activation links
    pub client_url: String,
    /// Activation mail delivery
    pub mailer: Arc<dyn Mailer>,
    /// Directory where avatars are stored and served from
    pub uploads_dir: PathBuf,
    /// bcrypt work factor for new password hashes
    pub bcrypt_cost: u32,
    /// Per-IP limits on sign-in and sign-up (None disables them)
    pub rate_limit: Option<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::with_ttls(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl,
        config.refresh_ttl,
    ));
    let rate_limit = config.rate_limit.clone().map(Arc::new);

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.cookie.clone(),
        config.mailer.clone(),
        config.client_url.clone(),
        config.uploads_dir.clone(),
        config.bcrypt_cost,
        rate_limit.clone(),
    );

    let mut app = Router::new()
        .merge(api_router)
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(&config.uploads_dir))
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found);

    if let Some(limits) = rate_limit {
        app = app.layer(middleware::from_fn_with_state(limits, rate_limit_global));
    }

    // The client runs on its own origin and sends the refresh cookie along
    match HeaderValue::from_str(&config.client_url) {
        Ok(origin) => {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
            );
        }
        Err(e) => {
            tracing::warn!(
                url = %config.client_url,
                error = %e,
                "Client URL is not a valid origin, CORS disabled"
            );
        }
    }

    app.layer(middleware::from_fn_with_state(
        config.cookie.secure,
        security_headers,
    ))
    .layer(TraceLayer::new_for_http())
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    if let Some(limits) = &config.rate_limit {
        limits.spawn_cleanup_scheduler();
    }
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
