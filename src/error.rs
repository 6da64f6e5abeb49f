use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A session token that fails the strict format check. Rejected before
    /// any storage access.
    #[error("Invalid token format")]
    InvalidToken,

    /// No session record, or the record has expired. The two cases are
    /// indistinguishable on purpose.
    #[error("Session not found or expired")]
    SessionNotFound,

    /// A malformed start-request payload.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The eID-Server was reachable but reported a non-ok result. Carries the
    /// reported ResultMajor URI.
    #[error("eID-Server returned error: {0}")]
    UpstreamProtocol(String),

    /// Network failure, timeout, non-2xx status, or a structurally invalid
    /// response from the eID-Server.
    #[error("eID-Server transport error: {0}")]
    UpstreamTransport(String),

    /// A session persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidToken => {
                tracing::debug!("Rejected malformed session token");
                (StatusCode::BAD_REQUEST, "Invalid token format".to_string())
            }

            AppError::SessionNotFound => {
                tracing::debug!("Session not found or expired");
                (
                    StatusCode::NOT_FOUND,
                    "Session not found or expired".to_string(),
                )
            }

            AppError::InvalidConfiguration(ref msg) => {
                tracing::debug!("Invalid configuration: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid configuration: {}", msg),
                )
            }

            AppError::UpstreamProtocol(ref result_major) => {
                tracing::warn!("eID-Server reported error result: {}", result_major);
                (
                    StatusCode::BAD_REQUEST,
                    format!("eID-Server returned error: {}", result_major),
                )
            }

            AppError::UpstreamTransport(ref msg) => {
                tracing::error!("eID-Server transport error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to communicate with eID-Server".to_string(),
                )
            }

            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session storage error".to_string(),
                )
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session storage error".to_string(),
                )
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}
