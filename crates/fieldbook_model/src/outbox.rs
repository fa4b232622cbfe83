//! Queued writes that did not reach the remote store.

use crate::clock::Timestamp;
use crate::record::SyncRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a queued write does when replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineAction {
    /// Upsert the record remotely.
    Save,
    /// Delete the record remotely.
    Delete,
}

impl fmt::Display for OfflineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineAction::Save => write!(f, "save"),
            OfflineAction::Delete => write!(f, "delete"),
        }
    }
}

/// A record waiting to be replayed against the remote store.
///
/// Items are replayed in `offline_timestamp` order and removed only after
/// the replay succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxItem<R> {
    /// The record as it was when queued.
    pub record: R,
    /// Save or delete.
    pub offline_action: OfflineAction,
    /// When the item was queued.
    pub offline_timestamp: Timestamp,
}

impl<R: SyncRecord> OutboxItem<R> {
    /// Queues a save of `record`.
    pub fn save(record: R, queued_at: Timestamp) -> Self {
        Self {
            record,
            offline_action: OfflineAction::Save,
            offline_timestamp: queued_at,
        }
    }

    /// Queues a delete of `record`.
    pub fn delete(record: R, queued_at: Timestamp) -> Self {
        Self {
            record,
            offline_action: OfflineAction::Delete,
            offline_timestamp: queued_at,
        }
    }

    /// Key of the queued record.
    pub fn key(&self) -> String {
        self.record.key()
    }

    /// Returns true for queued deletes.
    pub fn is_delete(&self) -> bool {
        self.offline_action == OfflineAction::Delete
    }
}
