//! Error types for the sync engine.

use fieldbook_model::ModelError;
use fieldbook_remote::RemoteError;
use fieldbook_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync and migration.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The local store failed.
    #[error("local storage error: {0}")]
    Storage(#[from] StorageError),

    /// The remote store failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A record failed validation.
    #[error("invalid record: {0}")]
    Model(#[from] ModelError),

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// No signed-in, verified user is available for a remote operation.
    #[error("not signed in")]
    NotSignedIn,

    /// Remote operations are disabled until the next sign-in.
    #[error("sync blocked by a permission error; sign in again to resume")]
    PermissionBlocked,

    /// The engine was built without a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

impl SyncError {
    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Returns true when the remote store refused the caller.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_permission_denied(),
            SyncError::PermissionBlocked => true,
            _ => false,
        }
    }

    /// Returns true when local storage could not be used.
    pub fn is_storage_unavailable(&self) -> bool {
        match self {
            SyncError::Storage(err) => err.is_unavailable(),
            _ => false,
        }
    }

    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        SyncError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::codec(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::Remote(RemoteError::Network("lost".into())).is_retryable());
        assert!(!SyncError::Remote(RemoteError::PermissionDenied("rules".into())).is_retryable());
        assert!(!SyncError::NotSignedIn.is_retryable());
        assert!(!SyncError::Storage(StorageError::Unavailable("quota".into())).is_retryable());
    }

    #[test]
    fn classification() {
        assert!(SyncError::Remote(RemoteError::PermissionDenied("rules".into()))
            .is_permission_denied());
        assert!(SyncError::PermissionBlocked.is_permission_denied());
        assert!(SyncError::Storage(StorageError::Unavailable("quota".into()))
            .is_storage_unavailable());
        assert!(!SyncError::Codec("bad".into()).is_storage_unavailable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::MissingCollaborator("remote store");
        assert_eq!(err.to_string(), "missing collaborator: remote store");
    }
}
