//! Axum extractors for authentication and task ownership.

use axum::{
    extract::{FromRequestParts, Path},
    http::{HeaderMap, header, request::Parts},
};
use tracing::debug;

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::AuthenticatedUser;
use crate::api::error::{ApiError, ResultExt, parse_id};
use crate::db::Task;

/// Extract the token from an `Authorization: Bearer <token>` header.
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Extractor for endpoints that require a valid access token.
///
/// Stateless: the identity comes from the token alone, nothing is loaded
/// from the database.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::MissingToken))?;

        let claims = state.jwt().validate_access_token(token).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            ApiAuthError::new(AuthErrorKind::InvalidToken)
        })?;

        Ok(Auth(AuthenticatedUser {
            claims: claims.user,
        }))
    }
}

/// Extractor for task mutation routes (`/{id}`).
///
/// Authenticates the caller, loads the task and checks that the caller owns
/// it. The handler receives the loaded task.
pub struct OwnedTask {
    pub user: AuthenticatedUser,
    pub task: Task,
}

impl<S> FromRequestParts<S> for OwnedTask
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        let Path(raw_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("Invalid id"))?;
        let id = parse_id(&raw_id)?;

        let task = state
            .db()
            .tasks()
            .get_by_id(id)
            .await
            .db_err("Failed to get task")?
            .ok_or_else(|| ApiError::not_found("Task not found"))?;

        if task.user_id != user.id() {
            return Err(ApiError::forbidden("You can only modify your own tasks"));
        }

        Ok(OwnedTask { user, task })
    }
}
