//! Conflict detection and resolution.
//!
//! [`resolve`] is a pure function of the two versions' timestamps and
//! business fields. The interactive half of the policy, choosing a side
//! when the resolver answers [`Resolution::AskUser`], lives behind a port
//! in the sync engine; this module only describes the question.

use crate::clock::Timestamp;
use crate::entry::Entry;
use crate::record::SyncRecord;
use crate::settings::Settings;
use std::fmt;

/// A record as held by the remote store, with the server-observed stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCopy<R> {
    /// The decoded record.
    pub record: R,
    /// When the remote store last accepted a write for this key.
    pub remote_updated_at: Timestamp,
}

impl<R> RemoteCopy<R> {
    /// Pairs a record with its remote stamp.
    pub fn new(record: R, remote_updated_at: Timestamp) -> Self {
        Self {
            record,
            remote_updated_at,
        }
    }
}

/// Outcome of comparing a local and a remote version of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// The local version wins and must be written remotely.
    UploadLocal,
    /// The remote version wins and must be written locally.
    DownloadRemote,
    /// Same timestamp, different content: a person has to choose.
    AskUser,
    /// Nothing to do.
    InSync,
}

impl Resolution {
    /// Returns true when the resolution leads to a write on either side.
    pub fn needs_write(&self) -> bool {
        !matches!(self, Resolution::InSync)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::UploadLocal => "upload",
            Resolution::DownloadRemote => "download",
            Resolution::AskUser => "ask",
            Resolution::InSync => "in-sync",
        };
        f.write_str(s)
    }
}

/// Decides which version of a key wins.
///
/// - remote absent: upload the local version
/// - local absent: download the remote version
/// - otherwise the newer of `modified_at` and `remote_updated_at` wins
/// - on equal timestamps, equal business fields are in sync and
///   different business fields need a decision
///
/// Both sides absent is in sync.
pub fn resolve<R: SyncRecord>(local: Option<&R>, remote: Option<&RemoteCopy<R>>) -> Resolution {
    match (local, remote) {
        (None, None) => Resolution::InSync,
        (Some(_), None) => Resolution::UploadLocal,
        (None, Some(_)) => Resolution::DownloadRemote,
        (Some(local), Some(remote)) => {
            let local_at = local.modified_at();
            if local_at > remote.remote_updated_at {
                Resolution::UploadLocal
            } else if local_at < remote.remote_updated_at {
                Resolution::DownloadRemote
            } else if local.same_content(&remote.record) {
                Resolution::InSync
            } else {
                Resolution::AskUser
            }
        }
    }
}

/// The side a person picked for a conflicting key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictChoice {
    /// Keep the version on this device and overwrite the cloud copy.
    KeepLocal,
    /// Keep the cloud copy and overwrite the version on this device.
    KeepRemote,
}

/// Where a conflict was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictOrigin {
    /// A sync pass or a pushed remote change.
    Sync,
    /// The one-time legacy migration.
    Migration,
}

/// Both versions of one conflicting record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictPair<R> {
    /// Version on this device.
    pub local: R,
    /// Version in the remote store.
    pub remote: R,
    /// Remote stamp of `remote`.
    pub remote_updated_at: Timestamp,
}

impl<R: SyncRecord> ConflictPair<R> {
    /// Business fields that differ between the two versions.
    pub fn differing_fields(&self) -> Vec<&'static str> {
        self.local.differing_fields(&self.remote)
    }
}

/// The typed payload of a conflict prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictSubject {
    /// Two versions of a daily entry.
    Entry(ConflictPair<Entry>),
    /// Two versions of the settings singleton.
    Settings(ConflictPair<Settings>),
}

impl ConflictSubject {
    /// Business fields that differ between the two versions.
    pub fn differing_fields(&self) -> Vec<&'static str> {
        match self {
            ConflictSubject::Entry(pair) => pair.differing_fields(),
            ConflictSubject::Settings(pair) => pair.differing_fields(),
        }
    }
}

/// A request for a person to choose between two versions of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictPrompt {
    /// Key of the conflicting record.
    pub key: String,
    /// What raised the conflict.
    pub origin: ConflictOrigin,
    /// Both versions.
    pub subject: ConflictSubject,
}

impl ConflictPrompt {
    /// Builds a prompt for any record type.
    pub fn new<R: SyncRecord>(origin: ConflictOrigin, local: R, remote: RemoteCopy<R>) -> Self {
        Self {
            key: local.key(),
            origin,
            subject: R::conflict_subject(ConflictPair {
                local,
                remote: remote.record,
                remote_updated_at: remote.remote_updated_at,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryDate;
    use proptest::prelude::*;

    fn entry(points: i64, at: Timestamp) -> Entry {
        let mut entry = Entry::new(EntryDate::parse("2025-07-10").unwrap(), at).with_points(points);
        entry.modified_at = at;
        entry
    }

    fn remote(points: i64, at: Timestamp) -> RemoteCopy<Entry> {
        RemoteCopy::new(entry(points, at), at)
    }

    #[test]
    fn missing_sides() {
        assert_eq!(resolve::<Entry>(None, None), Resolution::InSync);
        assert_eq!(resolve(Some(&entry(5, 1)), None), Resolution::UploadLocal);
        assert_eq!(resolve(None, Some(&remote(5, 1))), Resolution::DownloadRemote);
    }

    #[test]
    fn newer_local_wins() {
        assert_eq!(
            resolve(Some(&entry(5, 20)), Some(&remote(8, 10))),
            Resolution::UploadLocal
        );
    }

    #[test]
    fn newer_remote_wins() {
        assert_eq!(
            resolve(Some(&entry(5, 10)), Some(&remote(8, 20))),
            Resolution::DownloadRemote
        );
    }

    #[test]
    fn equal_stamp_compares_content() {
        assert_eq!(
            resolve(Some(&entry(5, 10)), Some(&remote(5, 10))),
            Resolution::InSync
        );
        assert_eq!(
            resolve(Some(&entry(5, 10)), Some(&remote(8, 10))),
            Resolution::AskUser
        );
    }

    #[test]
    fn remote_stamp_is_used_instead_of_remote_modified_at() {
        // The record's own modified_at is ignored on the remote side.
        let mut copy = remote(8, 10);
        copy.record.modified_at = 99;
        assert_eq!(
            resolve(Some(&entry(5, 20)), Some(&copy)),
            Resolution::UploadLocal
        );
    }

    #[test]
    fn prompt_carries_both_versions() {
        let prompt = ConflictPrompt::new(ConflictOrigin::Sync, entry(5, 10), remote(8, 10));
        assert_eq!(prompt.key, "2025-07-10");
        assert_eq!(prompt.subject.differing_fields(), vec!["points"]);
        match prompt.subject {
            ConflictSubject::Entry(pair) => {
                assert_eq!(pair.local.points, 5);
                assert_eq!(pair.remote.points, 8);
                assert_eq!(pair.remote_updated_at, 10);
            }
            ConflictSubject::Settings(_) => panic!("expected an entry subject"),
        }
    }

    #[test]
    fn settings_prompt_subject() {
        let local = Settings::new(10).with_rates(1.0, 2.0, 3.0);
        let remote = RemoteCopy::new(Settings::new(10).with_rates(1.0, 2.5, 3.0), 10);
        let prompt = ConflictPrompt::new(ConflictOrigin::Migration, local, remote);
        assert_eq!(prompt.key, crate::SETTINGS_KEY);
        assert!(matches!(prompt.subject, ConflictSubject::Settings(_)));
    }

    proptest! {
        #[test]
        fn resolve_is_deterministic(
            local_points in -100i64..100,
            remote_points in -100i64..100,
            local_at in 0i64..50,
            remote_at in 0i64..50,
        ) {
            let local = entry(local_points, local_at);
            let copy = remote(remote_points, remote_at);
            let first = resolve(Some(&local), Some(&copy));
            let second = resolve(Some(&local.clone()), Some(&copy.clone()));
            prop_assert_eq!(first, second);

            if local_at == remote_at && local_points == remote_points {
                prop_assert_eq!(first, Resolution::InSync);
            }
            if first == Resolution::AskUser {
                prop_assert_eq!(local_at, remote_at);
                prop_assert_ne!(local_points, remote_points);
            }
        }
    }
}
