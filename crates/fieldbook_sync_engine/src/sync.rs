//! Sync passes: outbox replay, full reconciliation, incremental push and
//! handling of pushed remote changes.
//!
//! Every pass starts by draining the outbox, so writes made offline reach
//! the remote store before anything is compared against it.

use crate::context::Context;
use crate::error::{SyncError, SyncResult};
use crate::outbox::{queued_writes, QueuedWrite};
use crate::ports::AuthUser;
use crate::report::{Bootstrap, PassKind, SyncReport};
use crate::tables::{from_document, to_document, TableRecord};
use fieldbook_model::{
    resolve, ConflictOrigin, Entry, OfflineAction, OutboxItem, RemoteCopy, Resolution, Settings,
    Timestamp,
};
use fieldbook_remote::{RemoteChange, RemoteError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

impl Context {
    /// Replays the outbox, then reconciles every record of both
    /// collections.
    pub(crate) async fn full_pass(
        &self,
        user: &AuthUser,
        started: Timestamp,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(PassKind::Full);
        self.replay_outbox(user, &mut report).await?;
        self.reconcile::<Entry>(user, &mut report).await?;
        self.reconcile::<Settings>(user, &mut report).await?;
        report.watermark = Some(self.advance_watermark(started).await?);
        info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            replayed = report.replayed,
            conflicts = report.conflicts,
            queued = report.queued,
            unreachable = report.unreachable,
            "full sync finished"
        );
        Ok(report)
    }

    /// Replays the outbox, then pushes records changed since the last
    /// successful pass.
    pub(crate) async fn incremental_pass(
        &self,
        user: &AuthUser,
        started: Timestamp,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new(PassKind::Incremental);
        let since = self.tables.watermark().await?.unwrap_or(Timestamp::MIN);
        self.replay_outbox(user, &mut report).await?;
        self.push_changed::<Entry>(user, since, &mut report).await?;
        self.push_changed::<Settings>(user, since, &mut report).await?;
        report.watermark = Some(self.advance_watermark(started).await?);
        debug!(
            since,
            uploaded = report.uploaded,
            replayed = report.replayed,
            "incremental sync finished"
        );
        Ok(report)
    }

    async fn advance_watermark(&self, started: Timestamp) -> SyncResult<Timestamp> {
        let current = self.tables.watermark().await?;
        match current {
            Some(at) if at >= started => Ok(at),
            _ => {
                self.tables.set_watermark(started).await?;
                Ok(started)
            }
        }
    }

    /// Drains the outbox, retrying rounds with backoff while items fail.
    ///
    /// Items that still fail after the last round stay queued and their
    /// network failures are counted as unreachable. A permission error
    /// stops the replay at once.
    pub(crate) async fn replay_outbox(
        &self,
        user: &AuthUser,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let retry = &self.config.retry;
        let rounds = retry.max_attempts.max(1);
        let mut unreachable = 0;
        for round in 0..rounds {
            if round > 0 {
                let delay = retry.delay_for_attempt(round);
                debug!(round, ?delay, "retrying outbox replay");
                tokio::time::sleep(delay).await;
                report.retries += 1;
            }
            let failures = self.replay_round(user, report).await?;
            if failures.is_empty() {
                return Ok(());
            }
            unreachable = failures.iter().filter(|err| err.is_retryable()).count();
            warn!(failed = failures.len(), round, "outbox items failed to replay");
        }
        report.unreachable += unreachable;
        Ok(())
    }

    async fn replay_round(
        &self,
        user: &AuthUser,
        report: &mut SyncReport,
    ) -> SyncResult<Vec<SyncError>> {
        let queue = queued_writes(&self.tables).await?;
        if queue.is_empty() {
            return Ok(Vec::new());
        }
        debug!(items = queue.len(), "replaying outbox");

        let mut failures = Vec::new();
        for write in queue {
            let key = write.key();
            let outcome = match write {
                QueuedWrite::Entry(item) => self.replay_item(user, item, report).await,
                QueuedWrite::Settings(item) => self.replay_item(user, item, report).await,
            };
            match outcome {
                Ok(()) => {}
                Err(err) if err.is_permission_denied() => return Err(err),
                Err(err) => {
                    warn!(key, error = %err, "outbox item not replayed");
                    failures.push(err);
                }
            }
        }
        Ok(failures)
    }

    async fn replay_item<R: TableRecord>(
        &self,
        user: &AuthUser,
        item: OutboxItem<R>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let key = item.key();
        if item.offline_action == OfflineAction::Delete {
            self.remote.delete(R::COLLECTION, &user.uid, &key).await?;
            self.tables.remove(R::OUTBOX, &key).await?;
            report.replayed += 1;
            return Ok(());
        }

        let remote = self.fetch::<R>(user, &key).await?;
        match (resolve(Some(&item.record), remote.as_ref()), remote) {
            (Resolution::InSync, _) => {
                self.tables.remove(R::OUTBOX, &key).await?;
                report.replayed += 1;
            }
            (Resolution::DownloadRemote, Some(copy)) => {
                self.store_synced(copy.record, copy.remote_updated_at)
                    .await?;
                report.downloaded += 1;
            }
            (Resolution::AskUser, Some(copy)) => {
                report.conflicts += 1;
                self.settle(user, ConflictOrigin::Sync, item.record, copy)
                    .await?;
            }
            _ => {
                let stamp = self.push(user, &item.record).await?;
                self.store_synced(item.record, stamp).await?;
                report.replayed += 1;
            }
        }
        Ok(())
    }

    /// Reconciles one collection record by record.
    ///
    /// When exactly one side is empty the whole collection is copied to
    /// the other side instead.
    async fn reconcile<R: TableRecord>(
        &self,
        user: &AuthUser,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let docs = self.remote.get_all(R::COLLECTION, &user.uid).await?;
        let mut remote: BTreeMap<String, RemoteCopy<R>> = BTreeMap::new();
        for doc in &docs {
            match from_document::<R>(doc) {
                Ok(copy) => {
                    remote.insert(doc.key.clone(), copy);
                }
                Err(err) => {
                    warn!(
                        collection = %R::COLLECTION,
                        key = %doc.key,
                        error = %err,
                        "skipping undecodable remote document"
                    );
                    report.failed += 1;
                }
            }
        }

        let mut local: BTreeMap<String, R> = self
            .tables
            .load_all::<R>(R::PRIMARY)
            .await?
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();

        let pending_deletes: HashSet<String> = self
            .tables
            .outbox_items::<R>()
            .await?
            .into_iter()
            .filter(OutboxItem::is_delete)
            .map(|item| item.key())
            .collect();
        remote.retain(|key, _| !pending_deletes.contains(key));
        local.retain(|key, _| !pending_deletes.contains(key));

        if remote.is_empty() && local.is_empty() {
            return Ok(());
        }

        if remote.is_empty() {
            let count = local.len();
            info!(
                collection = %R::COLLECTION,
                count,
                "remote collection empty; uploading local records"
            );
            report.bootstraps.push(Bootstrap::Uploaded {
                kind: R::KIND,
                count,
            });
            return self
                .upload_batch(user, local.into_values().collect(), report)
                .await;
        }

        if local.is_empty() {
            let count = remote.len();
            info!(
                collection = %R::COLLECTION,
                count,
                "local collection empty; downloading remote records"
            );
            self.tables.clear(R::PRIMARY).await?;
            for copy in remote.into_values() {
                self.apply_download(copy, report).await;
            }
            report.bootstraps.push(Bootstrap::Downloaded {
                kind: R::KIND,
                count,
            });
            return Ok(());
        }

        let keys: BTreeSet<String> = local.keys().chain(remote.keys()).cloned().collect();
        let mut uploads = Vec::new();
        let mut downloads = Vec::new();
        let mut asks = Vec::new();
        for key in keys {
            let mine = local.remove(&key);
            let theirs = remote.remove(&key);
            match (resolve(mine.as_ref(), theirs.as_ref()), mine, theirs) {
                (Resolution::UploadLocal, Some(record), _) => uploads.push(record),
                (Resolution::DownloadRemote, _, Some(copy)) => downloads.push(copy),
                (Resolution::AskUser, Some(record), Some(copy)) => asks.push((record, copy)),
                _ => report.in_sync += 1,
            }
        }
        debug!(
            collection = %R::COLLECTION,
            uploads = uploads.len(),
            downloads = downloads.len(),
            conflicts = asks.len(),
            "reconciling"
        );

        self.upload_batch(user, uploads, report).await?;
        for copy in downloads {
            self.apply_download(copy, report).await;
        }
        for (record, copy) in asks {
            self.settle_in_pass(user, record, copy, report).await?;
        }
        Ok(())
    }

    /// Pushes local records modified at or after `since`, comparing each
    /// against its remote copy first.
    async fn push_changed<R: TableRecord>(
        &self,
        user: &AuthUser,
        since: Timestamp,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let changed: Vec<R> = self
            .tables
            .load_all::<R>(R::PRIMARY)
            .await?
            .into_iter()
            .filter(|record| record.modified_at() >= since)
            .collect();

        let mut uploads = Vec::new();
        for record in changed {
            let key = record.key();
            if self.tables.outbox_item::<R>(&key).await?.is_some() {
                continue;
            }
            let remote = match self.fetch::<R>(user, &key).await {
                Ok(remote) => remote,
                Err(err) if err.is_permission_denied() => return Err(err),
                Err(err) => {
                    warn!(
                        collection = %R::COLLECTION,
                        key,
                        error = %err,
                        "remote read failed; queued"
                    );
                    if err.is_retryable() {
                        report.unreachable += 1;
                    }
                    self.queue_save(record).await?;
                    report.queued += 1;
                    continue;
                }
            };
            match (resolve(Some(&record), remote.as_ref()), remote) {
                (Resolution::UploadLocal, _) => uploads.push(record),
                (Resolution::DownloadRemote, Some(copy)) => {
                    self.apply_download(copy, report).await;
                }
                (Resolution::AskUser, Some(copy)) => {
                    self.settle_in_pass(user, record, copy, report).await?;
                }
                _ => report.in_sync += 1,
            }
        }
        self.upload_batch(user, uploads, report).await
    }

    async fn apply_download<R: TableRecord>(&self, copy: RemoteCopy<R>, report: &mut SyncReport) {
        let key = copy.record.key();
        match self.store_synced(copy.record, copy.remote_updated_at).await {
            Ok(_) => report.downloaded += 1,
            Err(err) => {
                warn!(collection = %R::COLLECTION, key, error = %err, "download not applied");
                report.failed += 1;
            }
        }
    }

    async fn settle_in_pass<R: TableRecord>(
        &self,
        user: &AuthUser,
        record: R,
        copy: RemoteCopy<R>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let key = record.key();
        report.conflicts += 1;
        match self.settle(user, ConflictOrigin::Sync, record, copy).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_permission_denied() => Err(err),
            Err(err) => {
                warn!(
                    collection = %R::COLLECTION,
                    key,
                    error = %err,
                    "conflict choice not applied"
                );
                if err.is_retryable() {
                    report.queued += 1;
                    report.unreachable += 1;
                } else {
                    report.failed += 1;
                }
                Ok(())
            }
        }
    }

    /// Uploads records concurrently, bounded by the configured limit.
    ///
    /// Tasks only talk to the remote store; their results are applied to
    /// the local store one at a time. Failed uploads are queued. A
    /// permission error is returned after the batch settles.
    async fn upload_batch<R: TableRecord>(
        &self,
        user: &AuthUser,
        records: Vec<R>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.upload_concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<String, R> = HashMap::new();
        for record in records {
            let key = record.key();
            let data = match to_document(&record) {
                Ok(data) => data,
                Err(err) => {
                    warn!(collection = %R::COLLECTION, key, error = %err, "record not encodable");
                    report.failed += 1;
                    continue;
                }
            };
            pending.insert(key.clone(), record);

            let remote = Arc::clone(&self.remote);
            let semaphore = Arc::clone(&semaphore);
            let uid = user.uid.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = remote.put(R::COLLECTION, &uid, &key, data).await;
                (key, result)
            });
        }

        let mut denied: Option<RemoteError> = None;
        while let Some(joined) = tasks.join_next().await {
            let (key, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    warn!(error = %err, "upload task did not finish");
                    continue;
                }
            };
            let Some(record) = pending.remove(&key) else {
                continue;
            };
            match result {
                Ok(doc) => match self.store_synced(record, doc.remote_updated_at).await {
                    Ok(_) => report.uploaded += 1,
                    Err(err) => {
                        warn!(
                            collection = %R::COLLECTION,
                            key,
                            error = %err,
                            "uploaded record not mirrored"
                        );
                        report.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(collection = %R::COLLECTION, key, error = %err, "upload failed; queued");
                    if err.is_retryable() {
                        report.unreachable += 1;
                    } else if err.is_permission_denied() && denied.is_none() {
                        denied = Some(err);
                    }
                    self.queue_save(record).await?;
                    report.queued += 1;
                }
            }
        }

        for record in pending.into_values() {
            self.queue_save(record).await?;
            report.queued += 1;
        }

        match denied {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Applies one change pushed by a remote subscription.
    pub(crate) async fn apply_remote_change<R: TableRecord>(
        &self,
        user: &AuthUser,
        change: RemoteChange,
    ) -> SyncResult<Resolution> {
        let key = change.key().to_string();
        let queued = self.tables.outbox_item::<R>(&key).await?;
        if queued.as_ref().is_some_and(OutboxItem::is_delete) {
            debug!(collection = %R::COLLECTION, key, "pushed change ignored; local delete queued");
            return Ok(Resolution::UploadLocal);
        }
        let local = self.tables.load::<R>(R::PRIMARY, &key).await?;

        match change {
            RemoteChange::Upserted(doc) => {
                let copy = from_document::<R>(&doc)?;
                let resolution = resolve(local.as_ref(), Some(&copy));
                match (resolution, local) {
                    (Resolution::DownloadRemote, _) => {
                        self.store_synced(copy.record, copy.remote_updated_at)
                            .await?;
                    }
                    (Resolution::AskUser, Some(record)) => {
                        self.settle(user, ConflictOrigin::Sync, record, copy)
                            .await?;
                    }
                    _ => {}
                }
                debug!(collection = %R::COLLECTION, key, ?resolution, "applied pushed change");
                Ok(resolution)
            }
            RemoteChange::Deleted {
                remote_updated_at, ..
            } => match local {
                Some(record) if record.modified_at() <= remote_updated_at && queued.is_none() => {
                    self.tables.remove(R::PRIMARY, &key).await?;
                    debug!(collection = %R::COLLECTION, key, "applied pushed delete");
                    Ok(Resolution::DownloadRemote)
                }
                Some(_) => Ok(Resolution::UploadLocal),
                None => Ok(Resolution::InSync),
            },
        }
    }
}
