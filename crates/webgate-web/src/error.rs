//! Error types for the web session layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use webgate_auth::AuthError;

/// Web session layer error type.
#[derive(Debug, Error)]
pub enum WebError {
    /// No cached context for the session.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A live context already exists for the session.
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    /// The authentication service rejected the request or could not be reached.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The session cookie is missing or malformed.
    #[error("Invalid session cookie: {0}")]
    Cookie(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session context's connection has been closed.
    #[error("Session context closed")]
    Closed,
}

impl From<webgate_session::Error> for WebError {
    fn from(e: webgate_session::Error) -> Self {
        match e {
            webgate_session::Error::NotFound(key) => WebError::NotFound(key),
            webgate_session::Error::AlreadyExists(key) => WebError::AlreadyExists(key),
            webgate_session::Error::InvalidConfig(msg) => WebError::Config(msg),
        }
    }
}

/// Result type for web session operations.
pub type Result<T> = std::result::Result<T, WebError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl WebError {
    /// HTTP status and error code the error maps to.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            WebError::NotFound(_) | WebError::Closed => (StatusCode::UNAUTHORIZED, "session_expired"),
            WebError::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            WebError::Auth(AuthError::AccessDenied(_) | AuthError::NotFound(_)) => {
                (StatusCode::UNAUTHORIZED, "access_denied")
            }
            WebError::Auth(AuthError::BadParameter(_)) => (StatusCode::BAD_REQUEST, "bad_parameter"),
            WebError::Auth(AuthError::Network(_) | AuthError::Closed) => {
                (StatusCode::BAD_GATEWAY, "auth_unavailable")
            }
            WebError::Cookie(_) => (StatusCode::BAD_REQUEST, "bad_cookie"),
            WebError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
