//! Collaborators the engine consumes from the application shell.
//!
//! Every port is injected when the engine is built; none of them is
//! optional.

use async_trait::async_trait;
use fieldbook_model::{ConflictChoice, ConflictPrompt};
use tokio::sync::broadcast;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthUser {
    /// Stable user id, scoping every remote collection.
    pub uid: String,
    /// Email address, if known.
    pub email: Option<String>,
}

impl AuthUser {
    /// Creates a user with no email.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    /// Sets the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A change of authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A user signed in.
    SignedIn(AuthUser),
    /// The user signed out.
    SignedOut,
}

/// Source of the current identity and of identity changes.
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Whether the signed-in user verified their email address.
    fn is_email_verified(&self) -> bool;

    /// A stream of every later sign-in and sign-out.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// One-line user notifications.
pub trait Notifier: Send + Sync {
    /// Shows `message`; `is_error` selects the error style.
    fn notify(&self, message: &str, is_error: bool);
}

/// Asks a person to pick a side when two versions of a record conflict.
///
/// The engine awaits one prompt at a time and never continues a pass
/// before a choice is made.
#[async_trait]
pub trait ConflictResolutionPort: Send + Sync {
    /// Returns the side to keep.
    async fn choose(&self, prompt: ConflictPrompt) -> ConflictChoice;
}
