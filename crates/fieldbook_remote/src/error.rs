//! Error types for remote store operations.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced by a remote document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The caller is not allowed to touch the collection.
    ///
    /// Never retried automatically.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached. Transient.
    #[error("network error: {0}")]
    Network(String),

    /// A document could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A user id or document key the store cannot address.
    #[error("invalid key {0:?}")]
    InvalidKey(String),
}

impl RemoteError {
    /// Returns true if the operation may succeed when tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }

    /// Returns true for authorization failures.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RemoteError::PermissionDenied(_))
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Codec(err.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => RemoteError::PermissionDenied(err.to_string()),
            _ => RemoteError::Network(err.to_string()),
        }
    }
}
