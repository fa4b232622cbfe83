//! Record fixtures and wired-up test devices.
//!
//! A [`TestCloud`] is one shared remote store with a manual clock. Every
//! [`TestDevice`] built on it has its own local store and ports, so
//! multi-device scenarios only need two devices on one cloud.

use crate::ports::{RecordingNotifier, ScriptedResolver, TestAuth};
use fieldbook_model::{
    ConflictChoice, Entry, EntryDate, ManualClock, RemoteCopy, Settings, Timestamp, SETTINGS_KEY,
};
use fieldbook_remote::{Collection, InMemoryRemote};
use fieldbook_storage::InMemoryStore;
use fieldbook_sync_engine::{
    AuthUser, RetryConfig, SyncConfig, SyncEngine, SyncReport, SyncResult, TableRecord,
};
use std::sync::Arc;

/// User id used by the fixtures.
pub const TEST_USER: &str = "user-1";

/// Parses a date, panicking on malformed input.
pub fn date(value: &str) -> EntryDate {
    EntryDate::parse(value).expect("valid fixture date")
}

/// An entry with `points`, created and modified at `at`.
pub fn entry(day: &str, points: i64, at: Timestamp) -> Entry {
    Entry::new(date(day), at).with_points(points)
}

/// Settings with the given rates, created and modified at `at`.
pub fn settings(point: f64, hourly: f64, mileage: f64, at: Timestamp) -> Settings {
    Settings::new(at).with_rates(point, hourly, mileage)
}

/// A test configuration: no replay retries, so failures surface at once.
pub fn test_config() -> SyncConfig {
    SyncConfig::new().with_retry(RetryConfig::no_retry())
}

/// One remote store shared by every device of a test.
pub struct TestCloud {
    /// The remote store.
    pub remote: Arc<InMemoryRemote>,
    /// Clock shared by the remote store and every device.
    pub clock: Arc<ManualClock>,
}

impl TestCloud {
    /// Creates an empty cloud whose clock starts at `start`.
    pub fn new(start: Timestamp) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let remote = Arc::new(InMemoryRemote::with_clock(clock.clone()));
        Self { remote, clock }
    }

    /// Stores a record remotely for [`TEST_USER`] with an explicit stamp.
    pub fn seed<R: TableRecord>(&self, record: &R, stamp: Timestamp) {
        self.remote.seed(
            R::COLLECTION,
            TEST_USER,
            &record.key(),
            serde_json::to_value(record).expect("fixture record encodes"),
            stamp,
        );
    }

    /// The remote copy of a record of [`TEST_USER`].
    pub fn remote_record<R: TableRecord>(&self, key: &str) -> Option<RemoteCopy<R>> {
        self.remote.peek(R::COLLECTION, TEST_USER, key).map(|doc| {
            let record = doc.decode().expect("remote record decodes");
            RemoteCopy::new(record, doc.remote_updated_at)
        })
    }

    /// The remote copy of an entry of [`TEST_USER`].
    pub fn remote_entry(&self, day: &str) -> Option<RemoteCopy<Entry>> {
        self.remote_record(day)
    }

    /// The remote settings of [`TEST_USER`].
    pub fn remote_settings(&self) -> Option<RemoteCopy<Settings>> {
        self.remote_record(SETTINGS_KEY)
    }

    /// Number of remote entries of [`TEST_USER`].
    pub fn entry_count(&self) -> usize {
        self.remote.document_count(Collection::Entries, TEST_USER)
    }

    /// Number of remote registry rows of [`TEST_USER`].
    pub fn device_count(&self) -> usize {
        self.remote.document_count(Collection::Devices, TEST_USER)
    }
}

/// A fully wired engine with inspectable collaborators.
pub struct TestDevice {
    /// The engine under test.
    pub engine: Arc<SyncEngine>,
    /// This device's local store.
    pub local: Arc<InMemoryStore>,
    /// The shared remote store.
    pub remote: Arc<InMemoryRemote>,
    /// The shared clock.
    pub clock: Arc<ManualClock>,
    /// This device's auth provider.
    pub auth: Arc<TestAuth>,
    /// Notifications sent by the engine.
    pub notifier: Arc<RecordingNotifier>,
    /// The scripted conflict port. Keeps the cloud copy by default.
    pub resolver: Arc<ScriptedResolver>,
}

impl TestDevice {
    /// A device on `cloud` with an empty local store.
    pub fn new(cloud: &TestCloud) -> Self {
        Self::with_config(cloud, test_config())
    }

    /// A device on `cloud` with a custom configuration.
    pub fn with_config(cloud: &TestCloud, config: SyncConfig) -> Self {
        Self::with_store(cloud, Arc::new(InMemoryStore::new()), config)
    }

    /// A device on `cloud` reusing an existing local store, as after an
    /// app restart.
    pub fn with_store(cloud: &TestCloud, local: Arc<InMemoryStore>, config: SyncConfig) -> Self {
        let auth = Arc::new(TestAuth::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let resolver = Arc::new(ScriptedResolver::always(ConflictChoice::KeepRemote));
        let engine = SyncEngine::builder()
            .with_local_store(local.clone())
            .with_remote(cloud.remote.clone())
            .with_auth(auth.clone())
            .with_notifier(notifier.clone())
            .with_conflict_port(resolver.clone())
            .with_clock(cloud.clock.clone())
            .with_config(config)
            .build()
            .expect("all collaborators supplied");
        Self {
            engine: Arc::new(engine),
            local,
            remote: cloud.remote.clone(),
            clock: cloud.clock.clone(),
            auth,
            notifier,
            resolver,
        }
    }

    /// Signs [`TEST_USER`] in through the auth provider and the engine.
    pub async fn sign_in(&self) -> SyncResult<Option<SyncReport>> {
        let user = AuthUser::new(TEST_USER).with_email("field@example.com");
        self.auth.sign_in(user.clone());
        self.engine.on_user_sign_in(user).await
    }

    /// Signs out through the auth provider and the engine.
    pub fn sign_out(&self) {
        self.auth.sign_out();
        self.engine.on_user_sign_out();
    }

    /// The local copy of an entry.
    pub async fn local_entry(&self, day: &str) -> Option<Entry> {
        self.engine
            .entry(&date(day))
            .await
            .expect("local store readable")
    }

    /// Writes records straight into the local mirror, bypassing the
    /// engine's write path.
    pub async fn put_local<R: TableRecord>(&self, records: &[R]) {
        for record in records {
            self.engine
                .tables()
                .save(R::PRIMARY, record)
                .await
                .expect("local store writable");
        }
    }

    /// Number of queued writes.
    pub async fn outbox_len(&self) -> usize {
        self.engine
            .pending_writes()
            .await
            .expect("outbox readable")
            .len()
    }
}
