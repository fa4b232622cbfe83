//! # Fieldbook Remote
//!
//! The remote document store contract and two reference stores.
//!
//! This crate provides:
//! - [`RemoteStore`], the per-user, per-collection document store contract
//! - [`Subscription`], a typed stream of remote changes
//! - [`InMemoryRemote`], a shareable store with fault injection for tests
//! - [`DirectoryRemote`], a JSON-file-per-document store on a shared folder
//!
//! # Stamps
//!
//! Every accepted write is stamped with a server-observed
//! `remote_updated_at`. Stamps are strictly increasing per store instance,
//! so two writes never share a stamp even when the wall clock stalls.
//!
//! # Failures
//!
//! A missing document is not an error: reads return `None`. Callers
//! classify the remaining failures with [`RemoteError::is_retryable`] and
//! [`RemoteError::is_permission_denied`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collection;
mod directory;
mod document;
mod error;
mod memory;
mod stamp;
mod store;
mod subscription;

pub use collection::Collection;
pub use directory::DirectoryRemote;
pub use document::{RemoteChange, RemoteDocument};
pub use error::{RemoteError, RemoteResult};
pub use memory::InMemoryRemote;
pub use store::RemoteStore;
pub use subscription::Subscription;
