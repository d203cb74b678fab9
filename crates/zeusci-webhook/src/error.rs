//! Webhook handler error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            WebhookError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            WebhookError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            WebhookError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<zeusci_db::DbError> for WebhookError {
    fn from(err: zeusci_db::DbError) -> Self {
        match err {
            zeusci_db::DbError::NotFound(msg) => WebhookError::NotFound(msg),
            other => WebhookError::Internal(other.to_string()),
        }
    }
}
