//! In-memory remote store with fault injection.

use crate::collection::Collection;
use crate::document::{RemoteChange, RemoteDocument};
use crate::error::{RemoteError, RemoteResult};
use crate::stamp::Stamper;
use crate::store::RemoteStore;
use crate::subscription::{SubscriberRegistry, Subscription};
use async_trait::async_trait;
use fieldbook_model::{Clock, SystemClock, Timestamp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type Table = BTreeMap<String, RemoteDocument>;

/// An in-memory remote document store.
///
/// One instance can be shared (via `Arc`) by several simulated devices.
/// Faults are injected with:
/// - [`set_online`](Self::set_online): every call fails with a network error
/// - [`set_permission_denied`](Self::set_permission_denied): every call is refused
/// - [`fail_key`](Self::fail_key): writes to one key fail with a network error
/// - [`fail_next_writes`](Self::fail_next_writes): the next `n` writes fail
///
/// [`write_count`](Self::write_count) counts accepted `put` and `delete`
/// calls.
pub struct InMemoryRemote {
    tables: RwLock<HashMap<(Collection, String), Table>>,
    stamper: Stamper,
    subscribers: Arc<SubscriberRegistry>,
    online: AtomicBool,
    permission_denied: AtomicBool,
    failing_keys: RwLock<HashSet<String>>,
    failure_budget: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryRemote {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            stamper: Stamper::new(clock),
            subscribers: SubscriberRegistry::new(),
            online: AtomicBool::new(true),
            permission_denied: AtomicBool::new(false),
            failing_keys: RwLock::new(HashSet::new()),
            failure_budget: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Sets whether the store is reachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Sets whether every call is refused as unauthorized.
    pub fn set_permission_denied(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    /// Makes writes to `key` fail with a network error.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.write().insert(key.into());
    }

    /// Makes the next `count` writes fail with a network error.
    pub fn fail_next_writes(&self, count: usize) {
        self.failure_budget.store(count, Ordering::SeqCst);
    }

    /// Removes every injected write failure.
    pub fn clear_failures(&self) {
        self.failing_keys.write().clear();
        self.failure_budget.store(0, Ordering::SeqCst);
    }

    /// Number of accepted writes since creation or the last reset.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Resets the write counter.
    pub fn reset_write_count(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Stores a document with an explicit stamp, bypassing faults,
    /// counters and subscribers.
    pub fn seed(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
        data: serde_json::Value,
        remote_updated_at: Timestamp,
    ) {
        self.stamper.observe(remote_updated_at);
        self.tables
            .write()
            .entry((collection, user_id.to_string()))
            .or_default()
            .insert(
                key.to_string(),
                RemoteDocument {
                    key: key.to_string(),
                    data,
                    remote_updated_at,
                },
            );
    }

    /// Reads a document, bypassing faults.
    pub fn peek(&self, collection: Collection, user_id: &str, key: &str) -> Option<RemoteDocument> {
        self.tables
            .read()
            .get(&(collection, user_id.to_string()))
            .and_then(|table| table.get(key).cloned())
    }

    /// Number of documents in a collection, bypassing faults.
    pub fn document_count(&self, collection: Collection, user_id: &str) -> usize {
        self.tables
            .read()
            .get(&(collection, user_id.to_string()))
            .map_or(0, BTreeMap::len)
    }

    /// Number of live subscriptions to a collection.
    pub fn subscriber_count(&self, collection: Collection, user_id: &str) -> usize {
        self.subscribers.subscriber_count(collection, user_id)
    }

    fn check_reachable(&self) -> RemoteResult<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("remote store unreachable".into()));
        }
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(RemoteError::PermissionDenied(
                "missing or insufficient permissions".into(),
            ));
        }
        Ok(())
    }

    fn check_writable(&self, key: &str) -> RemoteResult<()> {
        self.check_reachable()?;
        if self.failing_keys.read().contains(key) {
            return Err(RemoteError::Network(format!("write to {key} dropped")));
        }
        let budget = self
            .failure_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_ok() {
            return Err(RemoteError::Network(format!("write to {key} timed out")));
        }
        Ok(())
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRemote")
            .field("online", &self.online.load(Ordering::SeqCst))
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn put(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
        data: serde_json::Value,
    ) -> RemoteResult<RemoteDocument> {
        self.check_writable(key)?;
        let doc = RemoteDocument {
            key: key.to_string(),
            data,
            remote_updated_at: self.stamper.next(),
        };
        self.tables
            .write()
            .entry((collection, user_id.to_string()))
            .or_default()
            .insert(key.to_string(), doc.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .publish(collection, user_id, RemoteChange::Upserted(doc.clone()));
        Ok(doc)
    }

    async fn get(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
    ) -> RemoteResult<Option<RemoteDocument>> {
        self.check_reachable()?;
        Ok(self.peek(collection, user_id, key))
    }

    async fn get_all(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        self.check_reachable()?;
        Ok(self
            .tables
            .read()
            .get(&(collection, user_id.to_string()))
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, user_id: &str, key: &str) -> RemoteResult<bool> {
        self.check_writable(key)?;
        let existed = self
            .tables
            .write()
            .get_mut(&(collection, user_id.to_string()))
            .and_then(|table| table.remove(key))
            .is_some();
        self.writes.fetch_add(1, Ordering::SeqCst);
        if existed {
            let change = RemoteChange::Deleted {
                key: key.to_string(),
                remote_updated_at: self.stamper.next(),
            };
            self.subscribers.publish(collection, user_id, change);
        }
        Ok(existed)
    }

    async fn subscribe(&self, collection: Collection, user_id: &str) -> RemoteResult<Subscription> {
        self.check_reachable()?;
        Ok(self.subscribers.subscribe(collection, user_id))
    }
}
