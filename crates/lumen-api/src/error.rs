//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors returned by route handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown or malformed job identifier.
    JobNotFound,
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(lumen_core::Error),
}

impl From<lumen_core::Error> for ApiError {
    fn from(err: lumen_core::Error) -> Self {
        match &err {
            lumen_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            lumen_core::Error::CollectionNotFound(name) => {
                ApiError::NotFound(format!("Collection not found: {}", name))
            }
            lumen_core::Error::CollectionExists(name) => {
                ApiError::Conflict(format!("Collection already exists: {}", name))
            }
            lumen_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            // Poll clients key off the empty status on a miss
            ApiError::JobNotFound => {
                let body = Json(serde_json::json!({
                    "error": "Job not found",
                    "status": "",
                }));
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
