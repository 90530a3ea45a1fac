//! Error types for TTL store operations.

/// Error type for TTL store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing live is stored under the key (absent, expired or tombstoned).
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// A live entry already occupies the key.
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    /// The store configuration is unusable.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for [`Error::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

/// Result type for TTL store operations.
pub type Result<T> = std::result::Result<T, Error>;
