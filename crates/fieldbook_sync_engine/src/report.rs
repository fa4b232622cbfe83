//! Results of sync passes and cumulative statistics.

use crate::state::SyncState;
use fieldbook_model::{RecordKind, Timestamp};

/// Which kind of pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Outbox replay plus a full reconciliation of both collections.
    Full,
    /// Outbox replay plus a push of records changed since the watermark.
    Incremental,
}

/// A one-sided initial copy of a whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bootstrap {
    /// The remote collection was empty; every local record was uploaded.
    Uploaded {
        /// Record type copied.
        kind: RecordKind,
        /// Number of records.
        count: usize,
    },
    /// The local collection was empty; every remote record was downloaded.
    Downloaded {
        /// Record type copied.
        kind: RecordKind,
        /// Number of records.
        count: usize,
    },
}

impl Bootstrap {
    /// The one-line notification for this bootstrap.
    pub fn message(&self) -> String {
        match self {
            Bootstrap::Uploaded { kind, count } => {
                format!("Uploaded {count} {} to the cloud", plural(*kind, *count))
            }
            Bootstrap::Downloaded { kind, count } => {
                format!("Downloaded {count} {} from the cloud", plural(*kind, *count))
            }
        }
    }
}

fn plural(kind: RecordKind, count: usize) -> &'static str {
    match (kind, count) {
        (RecordKind::Entry, 1) => "entry",
        (RecordKind::Entry, _) => "entries",
        (RecordKind::Settings, _) => "settings",
    }
}

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Kind of pass.
    pub kind: PassKind,
    /// Records written to the remote store outside outbox replay.
    pub uploaded: usize,
    /// Records written to the local store from the remote store.
    pub downloaded: usize,
    /// Records found identical on both sides.
    pub in_sync: usize,
    /// Conflicts settled through the resolution port.
    pub conflicts: usize,
    /// Outbox items drained.
    pub replayed: usize,
    /// Records moved into the outbox because their upload failed.
    pub queued: usize,
    /// Records skipped because of a per-record failure.
    pub failed: usize,
    /// Remote calls that failed with a network error. Their work stays
    /// in the outbox.
    pub unreachable: usize,
    /// Replay rounds beyond the first.
    pub retries: u32,
    /// Collections copied in one direction.
    pub bootstraps: Vec<Bootstrap>,
    /// Watermark after the pass.
    pub watermark: Option<Timestamp>,
}

impl SyncReport {
    pub(crate) fn new(kind: PassKind) -> Self {
        Self {
            kind,
            uploaded: 0,
            downloaded: 0,
            in_sync: 0,
            conflicts: 0,
            replayed: 0,
            queued: 0,
            failed: 0,
            unreachable: 0,
            retries: 0,
            bootstraps: Vec::new(),
            watermark: None,
        }
    }

    /// Returns true if the pass left nothing behind in the outbox.
    pub fn is_clean(&self) -> bool {
        self.queued == 0 && self.failed == 0
    }

    /// Returns true if the remote store stopped answering during the pass.
    pub fn was_interrupted(&self) -> bool {
        self.unreachable > 0
    }

    /// A one-line summary for notifications and logs.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Sync complete: {} uploaded, {} downloaded",
            self.uploaded + self.replayed,
            self.downloaded
        );
        if self.conflicts > 0 {
            line.push_str(&format!(", {} conflicts resolved", self.conflicts));
        }
        if self.queued + self.failed > 0 {
            line.push_str(&format!(", {} pending", self.queued + self.failed));
        }
        line
    }
}

/// Cumulative counters over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Passes completed.
    pub passes: u64,
    /// Full passes completed.
    pub full_passes: u64,
    /// Records uploaded, including outbox replay.
    pub uploaded: u64,
    /// Records downloaded, including pushed remote changes.
    pub downloaded: u64,
    /// Conflicts settled.
    pub conflicts: u64,
    /// Writes that ended up in the outbox.
    pub queued: u64,
    /// Replay retries.
    pub retries: u64,
    /// Message of the last failed pass or write.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, report: &SyncReport) {
        self.passes += 1;
        if report.kind == PassKind::Full {
            self.full_passes += 1;
        }
        self.uploaded += (report.uploaded + report.replayed) as u64;
        self.downloaded += report.downloaded as u64;
        self.conflicts += report.conflicts as u64;
        self.queued += report.queued as u64;
        self.retries += u64::from(report.retries);
        self.last_error = None;
    }
}

/// Snapshot of the engine for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// A pass is running.
    pub is_syncing: bool,
    /// The remote store was last seen reachable.
    pub is_online: bool,
    /// Boundary of the last successful pass.
    pub last_sync_time: Option<Timestamp>,
    /// A user is signed in.
    pub is_signed_in: bool,
    /// Remote work is blocked until the next sign-in.
    pub has_permission_error: bool,
    /// Current state machine state.
    pub state: SyncState,
    /// Writes waiting in the outbox.
    pub pending_outbox: usize,
}

/// Where a local write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    /// The remote store accepted the write.
    Synced,
    /// The write waits in the outbox.
    Queued,
}
