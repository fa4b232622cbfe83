//! Sync engine state machine.
//!
//! Transitions are a pure function of the current state and an event, so
//! every edge can be tested without I/O.

use std::fmt;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncState {
    /// Not syncing. Writes go to the remote store directly.
    #[default]
    Idle,
    /// A sync pass is running.
    Syncing,
    /// The remote store is unreachable. Writes are queued.
    Offline,
    /// The remote store refused this user. Remote work stops until the
    /// next sign-in.
    PermissionBlocked,
}

/// Something that happened to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// A user signed in.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// Someone asked for a sync pass.
    SyncRequested,
    /// Connectivity was lost.
    WentOffline,
    /// Connectivity came back.
    WentOnline {
        /// Whether a verified user is signed in.
        signed_in: bool,
    },
    /// A pass finished.
    PassSucceeded,
    /// A pass stopped on a local failure.
    PassFailed,
    /// The remote store could not be reached.
    NetworkFailed,
    /// The remote store refused the user.
    PermissionDenied,
}

impl SyncState {
    /// Returns the state after `event`.
    ///
    /// - permission denial wins from any state
    /// - a blocked engine only leaves the block on sign-in
    /// - sign-in and explicit requests start a pass even when offline
    /// - triggers that arrive while syncing leave the state unchanged
    #[must_use]
    pub fn transition(self, event: SyncEvent) -> SyncState {
        use SyncEvent as E;
        use SyncState as S;

        match (self, event) {
            (_, E::PermissionDenied) => S::PermissionBlocked,
            (S::PermissionBlocked, E::SignedIn) => S::Syncing,
            (S::PermissionBlocked, _) => S::PermissionBlocked,

            (S::Idle | S::Offline, E::SignedIn | E::SyncRequested) => S::Syncing,
            (S::Syncing, E::SignedIn | E::SyncRequested) => S::Syncing,

            (S::Offline, E::SignedOut) => S::Offline,
            (_, E::SignedOut) => S::Idle,

            (_, E::WentOffline) => S::Offline,
            (S::Offline, E::WentOnline { signed_in: true }) => S::Syncing,
            (S::Offline, E::WentOnline { signed_in: false }) => S::Idle,
            (state, E::WentOnline { .. }) => state,

            (S::Syncing, E::PassSucceeded | E::PassFailed) => S::Idle,
            (state, E::PassSucceeded | E::PassFailed) => state,

            (_, E::NetworkFailed) => S::Offline,
        }
    }

    /// Returns true while a pass runs.
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if remote operations may be attempted.
    pub fn allows_remote(&self) -> bool {
        !matches!(self, SyncState::PermissionBlocked)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Offline => "offline",
            SyncState::PermissionBlocked => "permission-blocked",
        };
        f.write_str(s)
    }
}
