//! Error types for the rumor API server.
//!
//! [`ApiError`] maps service failures onto HTTP statuses through its
//! [`IntoResponse`] implementation. Every error body is
//! `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearsay_rumor::{KnowledgeError, RumorError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed JSON but semantically invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An identifier in the path or body is not a UUID.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// A concurrent write won twice in a row; the client may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RumorError> for ApiError {
    fn from(err: RumorError) -> Self {
        match err {
            RumorError::NotFound(_) => Self::NotFound(err.to_string()),
            RumorError::Validation(_) | RumorError::InvalidOperation(_) => {
                Self::BadRequest(err.to_string())
            }
            RumorError::ConcurrencyConflict(_) => Self::Conflict(err.to_string()),
            RumorError::ExternalService(_) | RumorError::Store(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::UnknownEntity(_)
            | KnowledgeError::UnknownEvent(_)
            | KnowledgeError::NoEventSource => Self::NotFound(err.to_string()),
            KnowledgeError::InvalidPosition(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) | Self::InvalidUuid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
