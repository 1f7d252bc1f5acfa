//! Request body extractors whose rejections render as `ApiError`.

use axum::extract::{
    FromRequest, Request,
    multipart::MultipartRejection,
    rejection::JsonRejection,
};
use tracing::debug;

use super::error::ApiError;

/// `axum::Json` with failures mapped to a 400 validation envelope.
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Json(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(status = %rejection.status(), error = %rejection.body_text(), "JSON body rejected");
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::validation(e.body_text()),
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::validation("Request body is not valid JSON")
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::validation("Expected request with Content-Type: application/json")
            }
            other => ApiError::validation(other.body_text()),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!(error = %rejection.body_text(), "Multipart body rejected");
        ApiError::bad_request("Invalid multipart data")
    }
}

/// Fallback for unknown routes and methods.
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
