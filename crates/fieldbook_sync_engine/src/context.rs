//! Collaborators shared by the sync and migration engines, plus the
//! record-level remote operations both of them build on.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::ports::{AuthProvider, AuthUser, ConflictResolutionPort, Notifier};
use crate::tables::{from_document, to_document, TableRecord, Tables};
use fieldbook_model::{
    Clock, ConflictChoice, ConflictOrigin, ConflictPrompt, OutboxItem, RemoteCopy, Timestamp,
};
use fieldbook_remote::RemoteStore;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct Context {
    pub(crate) tables: Tables,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) resolver: Arc<dyn ConflictResolutionPort>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: SyncConfig,
}

impl Context {
    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    /// Uploads a record and returns the stamp the remote store assigned.
    pub(crate) async fn push<R: TableRecord>(
        &self,
        user: &AuthUser,
        record: &R,
    ) -> SyncResult<Timestamp> {
        let doc = self
            .remote
            .put(R::COLLECTION, &user.uid, &record.key(), to_document(record)?)
            .await?;
        debug!(
            collection = %R::COLLECTION,
            key = %doc.key,
            stamp = doc.remote_updated_at,
            "uploaded"
        );
        Ok(doc.remote_updated_at)
    }

    /// Reads the remote copy of one record.
    pub(crate) async fn fetch<R: TableRecord>(
        &self,
        user: &AuthUser,
        key: &str,
    ) -> SyncResult<Option<RemoteCopy<R>>> {
        match self.remote.get(R::COLLECTION, &user.uid, key).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Writes a version both sides now agree on into the local mirror,
    /// stamped with the remote time, and drops any queued write for it.
    pub(crate) async fn store_synced<R: TableRecord>(
        &self,
        mut record: R,
        stamp: Timestamp,
    ) -> SyncResult<R> {
        record.set_modified_at(stamp);
        self.tables.save(R::PRIMARY, &record).await?;
        self.tables.remove(R::OUTBOX, &record.key()).await?;
        Ok(record)
    }

    /// Queues a save of `record` for the next replay.
    pub(crate) async fn queue_save<R: TableRecord>(&self, record: R) -> SyncResult<()> {
        let item = OutboxItem::save(record, self.now());
        self.tables.put_outbox_item(&item).await
    }

    /// Puts a conflict in front of the user and applies the answer.
    ///
    /// A kept local version is restamped past the remote one first, so a
    /// queued retry wins the next comparison instead of asking again. If
    /// its upload fails it is queued before the error is returned.
    pub(crate) async fn settle<R: TableRecord>(
        &self,
        user: &AuthUser,
        origin: ConflictOrigin,
        mut local: R,
        remote: RemoteCopy<R>,
    ) -> SyncResult<ConflictChoice> {
        let key = local.key();
        let remote_stamp = remote.remote_updated_at;
        let prompt = ConflictPrompt::new(origin, local.clone(), remote.clone());
        let choice = self.resolver.choose(prompt).await;
        info!(collection = %R::COLLECTION, key, ?origin, ?choice, "conflict settled");

        match choice {
            ConflictChoice::KeepLocal => {
                local.set_modified_at(self.now().max(remote_stamp + 1));
                self.tables.save(R::PRIMARY, &local).await?;
                match self.push(user, &local).await {
                    Ok(stamp) => {
                        self.store_synced(local, stamp).await?;
                    }
                    Err(err) => {
                        self.queue_save(local).await?;
                        return Err(err);
                    }
                }
            }
            ConflictChoice::KeepRemote => {
                self.store_synced(remote.record, remote_stamp).await?;
            }
        }
        Ok(choice)
    }
}
