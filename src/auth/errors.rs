//! Authentication error types.

use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::api::error::ApiError;

/// Message returned for every access guard failure.
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Why a request failed authentication. Logged; clients see one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingToken,
    InvalidToken,
}

/// Access guard rejection (401, JSON envelope).
///
/// The refresh cookie is left alone: an expired access token is the normal
/// trigger for the client to call the refresh endpoint.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
}

impl ApiAuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        debug!(kind = ?err.kind, "Request not authenticated");
        ApiError::unauthorized(NOT_AUTHENTICATED)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
