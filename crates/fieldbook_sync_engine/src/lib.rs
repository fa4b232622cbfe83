//! # Fieldbook Sync Engine
//!
//! Offline-first synchronization between the local durable store and the
//! remote document store, plus the one-time migration of pre-cloud data.
//!
//! This crate provides:
//! - Sync state machine (idle, syncing, offline, permission-blocked)
//! - Write-through local writes with an outbox for offline changes
//! - Full and incremental sync passes with bootstrap in either direction
//! - Conflict handling through an injected resolution port
//! - Per-device migration tracked in a remote registry
//! - A coordinator wiring auth, connectivity and subscriptions together
//!
//! ## Architecture
//!
//! Every pass follows the same order:
//! 1. Replay the outbox, oldest write first
//! 2. Compare local and remote versions by last-write time
//! 3. Upload, download or ask, per record
//! 4. Advance the watermark
//!
//! ## Key Invariants
//!
//! - The local store is written before anything is sent remotely
//! - Outbox items are removed only after the remote store accepted them
//! - Equal timestamps with different content are never resolved silently
//! - A completed device never migrates again
//! - A permission error stops remote work until the next sign-in

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod coordinator;
mod device;
mod engine;
mod error;
mod migration;
mod outbox;
mod ports;
mod report;
mod state;
mod sync;
mod tables;

pub use config::{RetryConfig, SyncConfig};
pub use coordinator::SyncCoordinator;
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{SyncError, SyncResult};
pub use migration::{MigrationEngine, MigrationReport};
pub use outbox::PendingWrite;
pub use ports::{AuthEvent, AuthProvider, AuthUser, ConflictResolutionPort, Notifier};
pub use report::{Bootstrap, PassKind, SyncReport, SyncStats, SyncStatus, WriteOutcome};
pub use state::{SyncEvent, SyncState};
pub use tables::{TableRecord, Tables};
