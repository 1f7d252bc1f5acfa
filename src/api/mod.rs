mod auth;
pub mod error;
pub mod extract;
pub mod response;
mod tasks;
mod users;

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::CookieConfig;
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::mail::Mailer;
use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;
pub use extract::route_not_found;
pub use tasks::TasksState;
pub use users::{MAX_AVATAR_BYTES, UPLOADS_URL_PREFIX, UsersState};

/// Create the API router.
#[allow(clippy::too_many_arguments)]
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    cookie: CookieConfig,
    mailer: Arc<dyn Mailer>,
    client_url: String,
    uploads_dir: PathBuf,
    bcrypt_cost: u32,
    rate_limit: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookie: cookie.clone(),
        mailer,
        client_url,
        bcrypt_cost,
        rate_limit,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookie,
        uploads_dir,
    };

    let tasks_state = tasks::TasksState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/users", users::router(users_state))
        .nest("/tasks", tasks::router(tasks_state))
}
