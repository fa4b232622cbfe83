//! # Fieldbook Model
//!
//! Data model and conflict resolution for the Fieldbook sync core.
//!
//! This crate provides:
//! - [`Entry`] daily records keyed by calendar date, and the [`Settings`] singleton
//! - [`SyncRecord`], the contract every synchronized record type satisfies
//! - [`OutboxItem`] for writes that failed to reach the remote store
//! - [`DeviceRegistryEntry`] for per-device migration tracking
//! - [`resolve`], the pure conflict resolver
//! - [`Clock`] so every timestamp source can be injected
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod conflict;
mod device;
mod entry;
mod error;
mod outbox;
mod record;
mod settings;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use conflict::{
    resolve, ConflictChoice, ConflictOrigin, ConflictPair, ConflictPrompt, ConflictSubject,
    RemoteCopy, Resolution,
};
pub use device::{DeviceId, DeviceRegistryEntry, MigrationResults, MigrationStatus};
pub use entry::{Entry, EntryDate, Expenses};
pub use error::{ModelError, ModelResult};
pub use outbox::{OfflineAction, OutboxItem};
pub use record::{RecordKind, SyncRecord};
pub use settings::{Settings, SETTINGS_KEY};
