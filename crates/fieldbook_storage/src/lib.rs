//! # Fieldbook Storage
//!
//! The per-device local durable store used by the Fieldbook sync core.
//!
//! The store is a keyed table per [`Namespace`]. Values are **opaque byte
//! blobs**; the store never interprets them. Typed encoding of entries,
//! settings and outbox items lives in `fieldbook_sync_engine`.
//!
//! ## Design Principles
//!
//! - Every operation is async and namespace-isolated
//! - `upsert` is an idempotent replace-by-key
//! - An unreachable backing medium surfaces as [`StorageError::Unavailable`],
//!   which is fatal for that one operation only
//! - Stores must be `Send + Sync` so the sync engine can share them
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests and ephemeral sessions
//! - [`FileStore`] - One CBOR file per namespace in a data directory
//!
//! ## Example
//!
//! ```rust
//! use fieldbook_storage::{InMemoryStore, LocalStore, Namespace};
//!
//! # tokio_test_block_on(async {
//! let store = InMemoryStore::new();
//! store.upsert(Namespace::Entries, "2025-07-10", b"payload".to_vec()).await.unwrap();
//! assert_eq!(store.count(Namespace::Entries).await.unwrap(), 1);
//! assert_eq!(store.count(Namespace::Settings).await.unwrap(), 0);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod namespace;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use namespace::Namespace;
pub use store::LocalStore;
