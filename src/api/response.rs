//! JSON response envelope shared by every endpoint.
//!
//! Successes and failures both render as
//! `{"statusCode", "message", "data", "error"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T> {
    status_code: u16,
    message: &'a str,
    data: Option<T>,
    error: Option<&'a str>,
}

/// Render an envelope with the given status.
pub fn envelope<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: Option<T>,
    error: Option<&str>,
) -> Response {
    (
        status,
        Json(Envelope {
            status_code: status.as_u16(),
            message,
            data,
            error,
        }),
    )
        .into_response()
}

/// Render an error envelope (`data` is null).
pub fn error_envelope(status: StatusCode, message: &str, error: &str) -> Response {
    envelope::<()>(status, message, None, Some(error))
}

/// A successful API response.
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A response with `data: null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        envelope(self.status, &self.message, self.data, None)
    }
}
