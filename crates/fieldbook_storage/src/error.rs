//! Error types for local storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing medium cannot be reached (missing directory, quota,
    /// disabled storage).
    #[error("local storage unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred while persisting a namespace.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A persisted namespace file could not be decoded.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if the failure means the store cannot serve requests
    /// right now, as opposed to holding bad data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_classification() {
        assert!(StorageError::Unavailable("quota".into()).is_unavailable());
        assert!(StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk")).is_unavailable());
        assert!(!StorageError::Corrupted("bad header".into()).is_unavailable());
    }

    #[test]
    fn error_display() {
        let err = StorageError::Unavailable("private browsing".into());
        assert_eq!(err.to_string(), "local storage unavailable: private browsing");
    }
}
