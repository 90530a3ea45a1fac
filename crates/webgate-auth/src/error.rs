//! Error types for the authentication client.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors reported by the authentication service or the connection to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing request parameter.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Credentials rejected, or the session has expired.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The requested session, user or token does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The authentication service could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The connection was already closed.
    #[error("Connection closed")]
    Closed,
}

impl AuthError {
    /// Check if the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::NotFound(_))
    }

    /// Check if the service refused the credentials.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, AuthError::AccessDenied(_))
    }

    /// Failures of the transport rather than of the request.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Closed)
    }
}
