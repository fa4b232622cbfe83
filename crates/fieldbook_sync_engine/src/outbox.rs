//! The outbox as one FIFO queue across record types.

use crate::error::SyncResult;
use crate::tables::Tables;
use fieldbook_model::{Entry, OfflineAction, OutboxItem, RecordKind, Settings, Timestamp};

/// A queued write as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Record type.
    pub kind: RecordKind,
    /// Record key.
    pub key: String,
    /// Save or delete.
    pub action: OfflineAction,
    /// When the write was queued.
    pub offline_timestamp: Timestamp,
}

pub(crate) enum QueuedWrite {
    Entry(OutboxItem<Entry>),
    Settings(OutboxItem<Settings>),
}

impl QueuedWrite {
    fn kind(&self) -> RecordKind {
        match self {
            QueuedWrite::Entry(_) => RecordKind::Entry,
            QueuedWrite::Settings(_) => RecordKind::Settings,
        }
    }

    pub(crate) fn key(&self) -> String {
        match self {
            QueuedWrite::Entry(item) => item.key(),
            QueuedWrite::Settings(item) => item.key(),
        }
    }

    fn action(&self) -> OfflineAction {
        match self {
            QueuedWrite::Entry(item) => item.offline_action,
            QueuedWrite::Settings(item) => item.offline_action,
        }
    }

    fn offline_timestamp(&self) -> Timestamp {
        match self {
            QueuedWrite::Entry(item) => item.offline_timestamp,
            QueuedWrite::Settings(item) => item.offline_timestamp,
        }
    }

    fn describe(&self) -> PendingWrite {
        PendingWrite {
            kind: self.kind(),
            key: self.key(),
            action: self.action(),
            offline_timestamp: self.offline_timestamp(),
        }
    }
}

/// Every queued write, oldest first. Ties break on record type, then key.
pub(crate) async fn queued_writes(tables: &Tables) -> SyncResult<Vec<QueuedWrite>> {
    let mut queue: Vec<QueuedWrite> = tables
        .outbox_items::<Entry>()
        .await?
        .into_iter()
        .map(QueuedWrite::Entry)
        .collect();
    queue.extend(
        tables
            .outbox_items::<Settings>()
            .await?
            .into_iter()
            .map(QueuedWrite::Settings),
    );
    queue.sort_by(|a, b| {
        a.offline_timestamp()
            .cmp(&b.offline_timestamp())
            .then_with(|| a.kind().as_str().cmp(b.kind().as_str()))
            .then_with(|| a.key().cmp(&b.key()))
    });
    Ok(queue)
}

/// Descriptions of every queued write, oldest first.
pub(crate) async fn pending_writes(tables: &Tables) -> SyncResult<Vec<PendingWrite>> {
    Ok(queued_writes(tables)
        .await?
        .iter()
        .map(QueuedWrite::describe)
        .collect())
}
