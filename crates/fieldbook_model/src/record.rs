//! The contract shared by every synchronized record type.

use crate::clock::Timestamp;
use crate::conflict::{ConflictPair, ConflictSubject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Which logical table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Daily entries, keyed by date.
    Entry,
    /// The per-user settings singleton.
    Settings,
}

impl RecordKind {
    /// Stable lowercase name used in logs and paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entry => "entries",
            RecordKind::Settings => "settings",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can be mirrored locally, queued in the outbox and
/// reconciled against the remote store.
///
/// # Invariants
///
/// - `key()` is unique per user within `KIND`
/// - `created_at()` never changes after the first write
/// - `modified_at()` is refreshed by every write and orders versions
/// - `differing_fields()` only inspects business fields, never timestamps
pub trait SyncRecord:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The table this record type lives in.
    const KIND: RecordKind;

    /// Natural key of the record.
    fn key(&self) -> String;

    /// First-write timestamp.
    fn created_at(&self) -> Timestamp;

    /// Restores the first-write timestamp when a write replaces a record.
    fn set_created_at(&mut self, at: Timestamp);

    /// Last-write timestamp, the sync ordering key.
    fn modified_at(&self) -> Timestamp;

    /// Sets the last-write timestamp.
    fn set_modified_at(&mut self, at: Timestamp);

    /// Names of the business fields whose values differ from `other`.
    fn differing_fields(&self, other: &Self) -> Vec<&'static str>;

    /// Wraps a local/remote pair into the prompt subject for this type.
    fn conflict_subject(pair: ConflictPair<Self>) -> ConflictSubject;

    /// Returns true when every business field equals the other version's.
    fn same_content(&self, other: &Self) -> bool {
        self.differing_fields(other).is_empty()
    }
}
