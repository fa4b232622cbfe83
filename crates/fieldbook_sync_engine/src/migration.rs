//! One-time migration of pre-cloud local data.
//!
//! Each device registers itself in the remote device registry. Until its
//! row says `completed`, every authenticated start moves the legacy
//! namespaces into the remote store and the local mirror. A completed
//! device never migrates again, even offline, thanks to the cached row.

use crate::context::Context;
use crate::error::SyncResult;
use crate::ports::AuthUser;
use crate::tables::TableRecord;
use fieldbook_model::{
    ConflictOrigin, DeviceId, DeviceRegistryEntry, Entry, MigrationResults, MigrationStatus,
    Settings,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// This device.
    pub device_id: DeviceId,
    /// Registry status after the run.
    pub status: MigrationStatus,
    /// Counters of the attempt that just ran, or of the completed one.
    pub results: MigrationResults,
    /// Finished attempts, including this one.
    pub attempts: u32,
    /// True when the device had already completed and nothing ran.
    pub skipped: bool,
}

impl MigrationReport {
    fn from_entry(entry: &DeviceRegistryEntry, skipped: bool) -> Self {
        Self {
            device_id: entry.device_id.clone(),
            status: entry.migration_status,
            results: entry.migration_results,
            attempts: entry.migration_attempts,
            skipped,
        }
    }

    /// A one-line summary for notifications.
    pub fn summary(&self) -> String {
        match self.status {
            MigrationStatus::Completed => format!(
                "Moved {} local records to the cloud ({} needed your choice)",
                self.results.migrated, self.results.conflicted
            ),
            _ => format!(
                "Moved {} local records to the cloud; {} will be retried next time",
                self.results.migrated, self.results.failed
            ),
        }
    }
}

/// Moves legacy local records into cloud storage once per device.
#[derive(Clone)]
pub struct MigrationEngine {
    ctx: Arc<Context>,
}

impl MigrationEngine {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// This device's id, generated and persisted on first use.
    pub async fn device_id(&self) -> SyncResult<DeviceId> {
        self.ctx.device_id().await
    }

    /// The locally cached registry row of this device.
    pub async fn cached_status(&self) -> SyncResult<Option<DeviceRegistryEntry>> {
        let device_id = self.ctx.device_id().await?;
        self.ctx.tables.cached_registry(&device_id).await
    }

    /// Number of records still waiting in the legacy namespaces.
    pub async fn legacy_count(&self) -> SyncResult<usize> {
        Ok(self.ctx.tables.count(Entry::LEGACY).await?
            + self.ctx.tables.count(Settings::LEGACY).await?)
    }

    /// Writes records into the legacy namespace of their type, as a
    /// pre-cloud build of the app would have.
    pub async fn stage_legacy<R: TableRecord>(&self, records: &[R]) -> SyncResult<usize> {
        for record in records {
            self.ctx.tables.save(R::LEGACY, record).await?;
        }
        Ok(records.len())
    }

    /// Runs the migration for `user` unless this device already completed.
    ///
    /// Per-record network failures are counted and leave the registry row
    /// `failed`, so the next run retries. A permission error aborts the
    /// run with the row left as it was.
    pub async fn run(&self, user: &AuthUser) -> SyncResult<MigrationReport> {
        let ctx = &self.ctx;
        let device_id = ctx.device_id().await?;

        let mut registry = match ctx.fetch_registry(user, &device_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                let entry = DeviceRegistryEntry::pending(&user.uid, device_id.clone(), ctx.now());
                ctx.put_registry(user, &entry).await?;
                info!(device_id = %device_id, "device registered");
                entry
            }
            Err(err) if err.is_retryable() => {
                let cached = ctx.tables.cached_registry(&device_id).await?;
                return match cached {
                    Some(entry) if entry.is_completed() && entry.user_id == user.uid => {
                        debug!(
                            device_id = %device_id,
                            "registry unreachable; cached row is completed"
                        );
                        Ok(MigrationReport::from_entry(&entry, true))
                    }
                    _ => Err(err),
                };
            }
            Err(err) => return Err(err),
        };
        ctx.tables.cache_registry(&registry).await?;

        if registry.is_completed() {
            debug!(device_id = %device_id, "migration already completed");
            return Ok(MigrationReport::from_entry(&registry, true));
        }

        let mut results = MigrationResults::default();
        self.migrate_all::<Entry>(user, &mut results).await?;
        self.migrate_all::<Settings>(user, &mut results).await?;

        registry.finish_attempt(results, ctx.now());
        ctx.put_registry(user, &registry).await?;

        let report = MigrationReport::from_entry(&registry, false);
        info!(
            device_id = %device_id,
            status = %report.status,
            migrated = results.migrated,
            conflicted = results.conflicted,
            failed = results.failed,
            "migration attempt finished"
        );
        if results.total() > 0 {
            ctx.notifier
                .notify(&report.summary(), report.status != MigrationStatus::Completed);
        }
        Ok(report)
    }

    async fn migrate_all<R: TableRecord>(
        &self,
        user: &AuthUser,
        results: &mut MigrationResults,
    ) -> SyncResult<()> {
        let legacy = self.ctx.tables.load_all::<R>(R::LEGACY).await?;
        for record in legacy {
            let key = record.key();
            match self.migrate_one(user, record, results).await {
                Ok(()) => results.migrated += 1,
                Err(err) if err.is_permission_denied() => return Err(err),
                Err(err) => {
                    warn!(
                        collection = %R::COLLECTION,
                        key,
                        error = %err,
                        "legacy record not migrated"
                    );
                    results.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn migrate_one<R: TableRecord>(
        &self,
        user: &AuthUser,
        record: R,
        results: &mut MigrationResults,
    ) -> SyncResult<()> {
        let ctx = &self.ctx;
        let key = record.key();
        match ctx.fetch::<R>(user, &key).await? {
            None => {
                let stamp = ctx.push(user, &record).await?;
                ctx.store_synced(record, stamp).await?;
            }
            Some(copy) if copy.record.same_content(&record) => {
                ctx.store_synced(copy.record, copy.remote_updated_at)
                    .await?;
            }
            Some(copy) => {
                results.conflicted += 1;
                ctx.settle(user, ConflictOrigin::Migration, record, copy)
                    .await?;
            }
        }
        ctx.tables.remove(R::LEGACY, &key).await?;
        Ok(())
    }
}

impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine").finish_non_exhaustive()
    }
}
