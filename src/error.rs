use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::db::StoreError;
use crate::idempotency::ConflictReason;
use crate::version::UnknownVersion;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// A write reused a consent with a request that is not a replay.
    ConsentAlreadyClaimed(ConflictReason),
    Store(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::ConsentAlreadyClaimed(reason) => write!(f, "Conflict: {reason}"),
            AppError::Store(err) => write!(f, "Store Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ConsentAlreadyClaimed(reason) => {
                let body = json!({ "error": reason.to_string(), "code": reason.code() });
                return (StatusCode::CONFLICT, axum::Json(body)).into_response();
            }
            AppError::Store(err) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

/// Only declared releases are routed, so an unknown label is a missing route.
impl From<UnknownVersion> for AppError {
    fn from(err: UnknownVersion) -> Self {
        AppError::NotFound(err.to_string())
    }
}
