//! The sync engine: state, triggers and the local write path.

use crate::config::SyncConfig;
use crate::context::Context;
use crate::error::{SyncError, SyncResult};
use crate::migration::{MigrationEngine, MigrationReport};
use crate::outbox::{pending_writes, PendingWrite};
use crate::ports::{AuthEvent, AuthProvider, AuthUser, ConflictResolutionPort, Notifier};
use crate::report::{PassKind, SyncReport, SyncStats, SyncStatus, WriteOutcome};
use crate::state::{SyncEvent, SyncState};
use crate::tables::{TableRecord, Tables};
use fieldbook_model::{
    Clock, Entry, EntryDate, OfflineAction, OutboxItem, Resolution, Settings, SystemClock,
    SETTINGS_KEY,
};
use fieldbook_remote::{Collection, RemoteChange, RemoteStore, Subscription};
use fieldbook_storage::LocalStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const VERIFY_EMAIL_MESSAGE: &str = "Verify your email address to turn on cloud sync.";
const PERMISSION_MESSAGE: &str =
    "Cloud sync stopped: permission denied. Changes stay on this device until you sign in again.";

/// Builder for [`SyncEngine`].
///
/// Every collaborator except the clock and the configuration must be
/// supplied; `build` fails otherwise.
#[derive(Default)]
pub struct SyncEngineBuilder {
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    auth: Option<Arc<dyn AuthProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    resolver: Option<Arc<dyn ConflictResolutionPort>>,
    clock: Option<Arc<dyn Clock>>,
    config: SyncConfig,
}

impl SyncEngineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local durable store.
    pub fn with_local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local = Some(store);
        self
    }

    /// Sets the remote document store.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the identity source.
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the conflict resolution port.
    pub fn with_conflict_port(mut self, resolver: Arc<dyn ConflictResolutionPort>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the clock. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> SyncResult<SyncEngine> {
        let ctx = Context {
            tables: Tables::new(self.local.ok_or(SyncError::MissingCollaborator("local store"))?),
            remote: self
                .remote
                .ok_or(SyncError::MissingCollaborator("remote store"))?,
            auth: self
                .auth
                .ok_or(SyncError::MissingCollaborator("auth provider"))?,
            notifier: self
                .notifier
                .ok_or(SyncError::MissingCollaborator("notifier"))?,
            resolver: self
                .resolver
                .ok_or(SyncError::MissingCollaborator("conflict resolution port"))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
        };
        Ok(SyncEngine::from_context(ctx))
    }
}

/// Resets the busy flag when a pass ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Offline-first sync engine.
///
/// Local writes always land in the local store first. They go to the
/// remote store right away when possible and wait in the outbox
/// otherwise. Sync passes drain the outbox and reconcile both stores.
///
/// At most one pass runs at a time. A trigger that arrives while a pass
/// runs is dropped.
pub struct SyncEngine {
    ctx: Arc<Context>,
    state: RwLock<SyncState>,
    busy: AtomicBool,
    online: AtomicBool,
    user: RwLock<Option<AuthUser>>,
    stats: RwLock<SyncStats>,
    permission_notified: AtomicBool,
}

impl SyncEngine {
    /// Returns a builder.
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::new()
    }

    fn from_context(ctx: Context) -> Self {
        let user = ctx.auth.current_user();
        Self {
            ctx: Arc::new(ctx),
            state: RwLock::new(SyncState::Idle),
            busy: AtomicBool::new(false),
            online: AtomicBool::new(true),
            user: RwLock::new(user),
            stats: RwLock::new(SyncStats::default()),
            permission_notified: AtomicBool::new(false),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.ctx.config
    }

    /// Typed access to the local store.
    pub fn tables(&self) -> &Tables {
        &self.ctx.tables
    }

    /// The user the engine currently works for.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.read().clone()
    }

    /// The user the auth provider reports right now.
    pub(crate) fn session_user(&self) -> Option<AuthUser> {
        self.ctx.auth.current_user()
    }

    /// A stream of sign-in and sign-out events from the auth provider.
    pub fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.ctx.auth.subscribe()
    }

    /// The migration engine sharing this engine's collaborators.
    pub fn migration(&self) -> MigrationEngine {
        MigrationEngine::new(Arc::clone(&self.ctx))
    }

    /// A snapshot for status displays.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let state = self.state();
        let is_signed_in = self.user.read().is_some();
        let pending_outbox = self.ctx.tables.count(Entry::OUTBOX).await?
            + self.ctx.tables.count(Settings::OUTBOX).await?;
        Ok(SyncStatus {
            is_syncing: self.busy.load(Ordering::SeqCst) || state.is_syncing(),
            is_online: self.online.load(Ordering::SeqCst),
            last_sync_time: self.ctx.tables.watermark().await?,
            is_signed_in,
            has_permission_error: state == SyncState::PermissionBlocked,
            state,
            pending_outbox,
        })
    }

    /// Every queued write, oldest first.
    pub async fn pending_writes(&self) -> SyncResult<Vec<PendingWrite>> {
        pending_writes(&self.ctx.tables).await
    }

    /// Runs a full pass on request.
    ///
    /// Returns `Ok(None)` when a pass is already running.
    pub async fn perform_manual_sync_all(&self) -> SyncResult<Option<SyncReport>> {
        self.require_remote()?;
        self.trigger(SyncEvent::SyncRequested, PassKind::Full).await
    }

    /// Runs an incremental pass on request.
    pub async fn perform_incremental_sync(&self) -> SyncResult<Option<SyncReport>> {
        self.require_remote()?;
        self.trigger(SyncEvent::SyncRequested, PassKind::Incremental)
            .await
    }

    /// Starts the signed-in session of `user`.
    ///
    /// Clears a permission block, runs the one-time migration and then a
    /// pass. Users who still have to verify their email are told so and
    /// nothing touches the remote store.
    pub async fn on_user_sign_in(&self, user: AuthUser) -> SyncResult<Option<SyncReport>> {
        info!(uid = %user.uid, "user signed in");
        *self.user.write() = Some(user);
        self.permission_notified.store(false, Ordering::SeqCst);

        if self.active_user().is_none() {
            self.ctx.notifier.notify(VERIFY_EMAIL_MESSAGE, false);
            return Ok(None);
        }

        if self.state() == SyncState::PermissionBlocked {
            self.apply(SyncEvent::SignedIn);
            self.apply(SyncEvent::PassSucceeded);
        }
        if let Err(err) = self.run_migration().await {
            warn!(error = %err, "migration did not finish");
        }

        let kind = if self.ctx.config.full_sync_on_sign_in {
            PassKind::Full
        } else {
            PassKind::Incremental
        };
        self.trigger(SyncEvent::SignedIn, kind).await
    }

    /// Ends the signed-in session. Local data and the outbox are kept.
    pub fn on_user_sign_out(&self) {
        info!("user signed out");
        *self.user.write() = None;
        self.apply(SyncEvent::SignedOut);
    }

    /// Reports a connectivity change. Coming back online runs an
    /// incremental pass when a user is signed in.
    pub async fn set_online(&self, online: bool) -> SyncResult<Option<SyncReport>> {
        self.online.store(online, Ordering::SeqCst);
        if !online {
            self.apply(SyncEvent::WentOffline);
            return Ok(None);
        }
        if self.state() != SyncState::Offline {
            return Ok(None);
        }
        let signed_in = self.active_user().is_some();
        self.trigger(SyncEvent::WentOnline { signed_in }, PassKind::Incremental)
            .await
    }

    /// Runs the one-time migration for the signed-in user.
    pub async fn run_migration(&self) -> SyncResult<MigrationReport> {
        let user = self.require_remote()?;
        let result = self.migration().run(&user).await;
        if let Err(err) = &result {
            self.note_failure(err);
        }
        result
    }

    /// Subscribes to pushed changes of one collection for the signed-in
    /// user.
    pub async fn subscribe(&self, collection: Collection) -> SyncResult<Subscription> {
        let user = self.require_remote()?;
        Ok(self.ctx.remote.subscribe(collection, &user.uid).await?)
    }

    /// Applies a change pushed by a remote subscription.
    ///
    /// Returns `Ok(None)` when no user is signed in, remote work is
    /// blocked, or the collection is not mirrored locally.
    pub async fn handle_remote_change(
        &self,
        collection: Collection,
        change: RemoteChange,
    ) -> SyncResult<Option<Resolution>> {
        let Some(user) = self.active_user() else {
            return Ok(None);
        };
        if !self.state().allows_remote() {
            return Ok(None);
        }
        let result = match collection {
            Collection::Entries => self.ctx.apply_remote_change::<Entry>(&user, change).await,
            Collection::Settings => {
                self.ctx
                    .apply_remote_change::<Settings>(&user, change)
                    .await
            }
            Collection::Devices => return Ok(None),
        };
        match result {
            Ok(resolution) => {
                let mut stats = self.stats.write();
                match resolution {
                    Resolution::DownloadRemote => stats.downloaded += 1,
                    Resolution::AskUser => stats.conflicts += 1,
                    Resolution::UploadLocal | Resolution::InSync => {}
                }
                Ok(Some(resolution))
            }
            Err(err) => {
                self.note_failure(&err);
                Err(err)
            }
        }
    }

    async fn trigger(&self, event: SyncEvent, kind: PassKind) -> SyncResult<Option<SyncReport>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!(?event, "pass already running; trigger dropped");
            return Ok(None);
        }
        let _busy = BusyGuard(&self.busy);

        if self.apply(event) != SyncState::Syncing {
            return Ok(None);
        }
        let Some(user) = self.active_user() else {
            self.apply(SyncEvent::PassFailed);
            return Err(SyncError::NotSignedIn);
        };

        let started = self.ctx.now();
        let result = match kind {
            PassKind::Full => self.ctx.full_pass(&user, started).await,
            PassKind::Incremental => self.ctx.incremental_pass(&user, started).await,
        };
        match result {
            Ok(report) if report.was_interrupted() => {
                warn!(
                    ?kind,
                    unreachable = report.unreachable,
                    queued = report.queued,
                    "remote store unreachable during pass; work left queued"
                );
                self.online.store(false, Ordering::SeqCst);
                self.apply(SyncEvent::NetworkFailed);
                let mut stats = self.stats.write();
                stats.record(&report);
                stats.last_error = Some(format!(
                    "{} remote calls failed with a network error",
                    report.unreachable
                ));
                drop(stats);
                self.announce(&report);
                Ok(Some(report))
            }
            Ok(report) => {
                self.online.store(true, Ordering::SeqCst);
                self.apply(SyncEvent::PassSucceeded);
                self.stats.write().record(&report);
                self.announce(&report);
                Ok(Some(report))
            }
            Err(err) => {
                warn!(error = %err, ?kind, "sync pass failed");
                if !self.note_failure(&err) {
                    self.apply(SyncEvent::PassFailed);
                }
                Err(err)
            }
        }
    }

    fn announce(&self, report: &SyncReport) {
        if !self.ctx.config.notify_on_bootstrap {
            return;
        }
        for bootstrap in &report.bootstraps {
            self.ctx.notifier.notify(&bootstrap.message(), false);
        }
        if report.kind == PassKind::Full && report.bootstraps.is_empty() {
            self.ctx.notifier.notify(&report.summary(), false);
        }
    }

    /// Moves the state machine for a remote failure. Returns true if the
    /// error was a permission or network failure.
    fn note_failure(&self, err: &SyncError) -> bool {
        self.stats.write().last_error = Some(err.to_string());
        if err.is_permission_denied() {
            self.block();
            true
        } else if err.is_retryable() {
            self.online.store(false, Ordering::SeqCst);
            self.apply(SyncEvent::NetworkFailed);
            true
        } else {
            false
        }
    }

    fn block(&self) {
        self.apply(SyncEvent::PermissionDenied);
        if !self.permission_notified.swap(true, Ordering::SeqCst) {
            warn!("remote store denied access; remote work disabled until next sign-in");
            self.ctx.notifier.notify(PERMISSION_MESSAGE, true);
        }
    }

    fn apply(&self, event: SyncEvent) -> SyncState {
        let mut state = self.state.write();
        let next = state.transition(event);
        if next != *state {
            debug!(from = %*state, to = %next, ?event, "sync state changed");
        }
        *state = next;
        next
    }

    /// The signed-in user, if remote work is allowed for them.
    fn active_user(&self) -> Option<AuthUser> {
        let user = self.user.read().clone()?;
        if self.ctx.config.require_verified_email && !self.ctx.auth.is_email_verified() {
            return None;
        }
        Some(user)
    }

    fn require_remote(&self) -> SyncResult<AuthUser> {
        let user = self.active_user().ok_or(SyncError::NotSignedIn)?;
        if !self.state().allows_remote() {
            return Err(SyncError::PermissionBlocked);
        }
        Ok(user)
    }

    /// The user to write through for, when a direct remote write is worth
    /// trying.
    fn write_through_user(&self) -> Option<AuthUser> {
        let state = self.state();
        if !state.allows_remote()
            || state == SyncState::Offline
            || !self.online.load(Ordering::SeqCst)
        {
            return None;
        }
        self.active_user()
    }

    /// Every local entry, ordered by date.
    pub async fn entries(&self) -> SyncResult<Vec<Entry>> {
        self.ctx.tables.load_all(Entry::PRIMARY).await
    }

    /// One local entry.
    pub async fn entry(&self, date: &EntryDate) -> SyncResult<Option<Entry>> {
        self.ctx.tables.load(Entry::PRIMARY, date.as_str()).await
    }

    /// The local settings, if any were saved.
    pub async fn settings(&self) -> SyncResult<Option<Settings>> {
        self.ctx.tables.load(Settings::PRIMARY, SETTINGS_KEY).await
    }

    /// Saves an entry locally, then writes it through or queues it.
    pub async fn save_entry(&self, entry: Entry) -> SyncResult<WriteOutcome> {
        entry.validate()?;
        self.save_record(entry).await
    }

    /// Saves the settings locally, then writes them through or queues
    /// them. The whole document is replaced.
    pub async fn save_settings(&self, settings: Settings) -> SyncResult<WriteOutcome> {
        settings.validate()?;
        self.save_record(settings).await
    }

    /// Deletes an entry locally, then deletes it remotely or queues the
    /// delete.
    pub async fn delete_entry(&self, date: &EntryDate) -> SyncResult<WriteOutcome> {
        let now = self.ctx.now();
        let key = date.as_str();
        let record = self
            .ctx
            .tables
            .load::<Entry>(Entry::PRIMARY, key)
            .await?
            .unwrap_or_else(|| Entry::new(date.clone(), now));
        self.ctx.tables.remove(Entry::PRIMARY, key).await?;
        self.write_through(OutboxItem::delete(record, now)).await
    }

    async fn save_record<R: TableRecord>(&self, mut record: R) -> SyncResult<WriteOutcome> {
        let now = self.ctx.now();
        let previous = self
            .ctx
            .tables
            .load::<R>(R::PRIMARY, &record.key())
            .await?;
        match previous {
            Some(prev) => {
                record.set_created_at(prev.created_at());
                record.set_modified_at(now.max(prev.modified_at() + 1));
            }
            None => record.set_modified_at(now.max(record.created_at())),
        }
        self.ctx.tables.save(R::PRIMARY, &record).await?;
        self.write_through(OutboxItem::save(record, now)).await
    }

    async fn write_through<R: TableRecord>(&self, item: OutboxItem<R>) -> SyncResult<WriteOutcome> {
        let key = item.key();
        let Some(user) = self.write_through_user() else {
            self.ctx.tables.put_outbox_item(&item).await?;
            self.stats.write().queued += 1;
            debug!(collection = %R::COLLECTION, key, action = %item.offline_action, "write queued");
            return Ok(WriteOutcome::Queued);
        };

        let result = match item.offline_action {
            OfflineAction::Save => self.ctx.push(&user, &item.record).await.map(Some),
            OfflineAction::Delete => self
                .ctx
                .remote
                .delete(R::COLLECTION, &user.uid, &key)
                .await
                .map(|_| None)
                .map_err(SyncError::from),
        };

        match result {
            Ok(Some(stamp)) => {
                self.ctx.store_synced(item.record, stamp).await?;
                self.stats.write().uploaded += 1;
                Ok(WriteOutcome::Synced)
            }
            Ok(None) => {
                self.ctx.tables.remove(R::OUTBOX, &key).await?;
                self.stats.write().uploaded += 1;
                Ok(WriteOutcome::Synced)
            }
            Err(err) if err.is_retryable() || err.is_permission_denied() => {
                warn!(
                    collection = %R::COLLECTION,
                    key,
                    error = %err,
                    "remote write failed; queued"
                );
                self.ctx.tables.put_outbox_item(&item).await?;
                self.stats.write().queued += 1;
                self.note_failure(&err);
                Ok(WriteOutcome::Queued)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state())
            .field("online", &self.online.load(Ordering::SeqCst))
            .field("signed_in", &self.user.read().is_some())
            .finish_non_exhaustive()
    }
}
