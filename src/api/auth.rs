//! Account lifecycle endpoints.
//!
//! - POST `/signUp` - Create an inactive account and mail its activation link
//! - POST `/signIn` - Exchange credentials for an access token and refresh cookie
//! - GET `/activate/{token}` - Activate an account and sign it in
//! - GET `/refreshTokens` - Rotate the refresh cookie and issue a new access token
//! - DELETE `/signOut` - Clear the refresh cookie

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::error::{ApiError, ResultExt};
use super::extract::Json;
use super::response::{ApiResponse, error_envelope};
use crate::auth::{CookieConfig, REFRESH_COOKIE_NAME, get_cookie};
use crate::db::{Database, User};
use crate::jwt::{JwtConfig, UserClaim};
use crate::mail::{ActivationMail, Mailer};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_sign_in, rate_limit_sign_up};
use crate::validation::{validate_sign_in, validate_sign_up};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookie: CookieConfig,
    pub mailer: Arc<dyn Mailer>,
    pub client_url: String,
    pub bcrypt_cost: u32,
    pub rate_limit: Option<Arc<RateLimitConfig>>,
}

pub fn router(state: AuthState) -> Router {
    let mut sign_in_router = Router::new()
        .route("/signIn", post(sign_in))
        .with_state(state.clone());
    let mut sign_up_router = Router::new()
        .route("/signUp", post(sign_up))
        .with_state(state.clone());

    if let Some(limits) = state.rate_limit.clone() {
        sign_in_router = sign_in_router.layer(middleware::from_fn_with_state(
            limits.clone(),
            rate_limit_sign_in,
        ));
        sign_up_router =
            sign_up_router.layer(middleware::from_fn_with_state(limits, rate_limit_sign_up));
    }

    Router::new()
        .route("/activate/{token}", get(activate))
        .route("/refreshTokens", get(refresh_tokens))
        .route("/signOut", delete(sign_out))
        .with_state(state)
        .merge(sign_in_router)
        .merge(sign_up_router)
}

// --- Request/response types ---

#[derive(Deserialize)]
struct SignUpRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SignInRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredUser {
    id: i64,
    name: String,
    email: String,
    is_activated: bool,
}

#[derive(Serialize)]
struct SignUpData {
    user: RegisteredUser,
}

/// Body of every response that signs a user in.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionData {
    pub user: UserClaim,
    pub access_token: String,
}

/// Issue a fresh token pair for `user`: access token in the body, refresh
/// token in the cookie.
pub(super) fn session_response(
    jwt: &JwtConfig,
    cookie: &CookieConfig,
    user: &User,
    message: &str,
) -> Result<Response, ApiError> {
    let claim = UserClaim::from(user);
    let pair = jwt
        .issue_pair(&claim)
        .internal_err("Failed to generate tokens")?;

    Ok((
        [(SET_COOKIE, cookie.refresh_cookie(&pair.refresh_token))],
        ApiResponse::ok(
            message,
            SessionData {
                user: claim,
                access_token: pair.access_token,
            },
        ),
    )
        .into_response())
}

/// True if a sqlx error is a UNIQUE constraint violation.
pub(super) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

// --- Handlers ---

async fn sign_up(
    State(state): State<AuthState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_sign_up(&payload.name, &payload.email, &payload.password)
        .map_err(ApiError::validation)?;

    let existing = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to check email")?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with this email already exists"));
    }

    let password_hash = hash_password(&payload.password, state.bcrypt_cost)
        .await
        .internal_err("Failed to hash password")?;
    let activation_token = uuid::Uuid::new_v4().to_string();

    let id = match state
        .db
        .users()
        .create(
            &payload.name,
            &payload.email,
            &password_hash,
            &activation_token,
        )
        .await
    {
        Ok(id) => id,
        // Lost a race against a concurrent sign-up with the same email
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("User with this email already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::internal("Failed to create new user"))?;

    info!(user_id = user.id, "User registered");

    let mail = ActivationMail::new(&user.email, &user.name, &state.client_url, &activation_token);
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer.send_activation(&mail).await {
            error!(to = %mail.to, error = %e, "Failed to send activation email");
        }
    });

    Ok(ApiResponse::created(
        "Registration successful! Please check your email to activate your account.",
        SignUpData {
            user: RegisteredUser {
                id: user.id,
                name: user.name,
                email: user.email,
                is_activated: user.is_activated,
            },
        },
    ))
}

async fn sign_in(
    State(state): State<AuthState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Response, ApiError> {
    validate_sign_in(&payload.email, &payload.password).map_err(ApiError::validation)?;

    let user = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::bad_request("User with this email not found"))?;

    if !user.is_activated {
        return Err(ApiError::AccountNotActivated);
    }

    if !verify_password(&payload.password, &user.password_hash).await {
        return Err(ApiError::bad_request("Invalid password"));
    }

    info!(user_id = user.id, "User signed in");
    session_response(&state.jwt, &state.cookie, &user, "Sign in successful")
}

async fn activate(
    State(state): State<AuthState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let user = state
        .db
        .users()
        .get_by_activation_token(&token)
        .await
        .db_err("Failed to look up activation token")?
        .ok_or_else(|| ApiError::not_found("Invalid or expired activation token"))?;

    if user.is_activated {
        return Err(ApiError::conflict("Account is already activated"));
    }

    // Conditional update: only one of two racing requests flips the flag
    let activated = state
        .db
        .users()
        .activate(user.id)
        .await
        .db_err("Failed to activate user")?;
    if !activated {
        return Err(ApiError::conflict("Account is already activated"));
    }

    let user = state
        .db
        .users()
        .get_by_id(user.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::internal("Failed to activate account"))?;

    info!(user_id = user.id, "Account activated");
    session_response(
        &state.jwt,
        &state.cookie,
        &user,
        "Account activated successfully! You are now logged in.",
    )
}

/// Verify the refresh cookie and load its user fresh from the database.
async fn refresh_user(state: &AuthState, headers: &HeaderMap) -> Result<User, &'static str> {
    let token = get_cookie(headers, REFRESH_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .ok_or("No refresh token")?;

    let claims = state.jwt.validate_refresh_token(token).map_err(|e| {
        debug!(error = %e, "Refresh token rejected");
        "Invalid or expired refresh token"
    })?;

    let user = state
        .db
        .users()
        .get_by_id(claims.user.id)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to get user for refresh");
            "Failed to load user"
        })?
        .ok_or("User not found")?;

    if !user.is_activated {
        return Err("Account is not activated");
    }

    Ok(user)
}

/// 401 with the refresh cookie cleared.
fn invalid_refresh(cookie: &CookieConfig, reason: &str) -> Response {
    (
        [(SET_COOKIE, cookie.clear_refresh_cookie())],
        error_envelope(StatusCode::UNAUTHORIZED, "Invalid refresh token", reason),
    )
        .into_response()
}

async fn refresh_tokens(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let user = match refresh_user(&state, &headers).await {
        Ok(user) => user,
        Err(reason) => return invalid_refresh(&state.cookie, reason),
    };

    session_response(
        &state.jwt,
        &state.cookie,
        &user,
        "User session successfully extended",
    )
    .unwrap_or_else(|_| invalid_refresh(&state.cookie, "Failed to generate tokens"))
}

async fn sign_out(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, state.cookie.clear_refresh_cookie())],
        ApiResponse::message("Sign out successful"),
    )
}
