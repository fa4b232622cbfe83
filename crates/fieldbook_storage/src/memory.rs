//! In-memory local store for tests and ephemeral sessions.

use crate::error::{StorageError, StorageResult};
use crate::namespace::Namespace;
use crate::store::LocalStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory local store.
///
/// This store keeps every namespace in memory and is suitable for:
/// - Unit and integration tests
/// - Sessions where durable storage is not wanted
///
/// Availability can be switched off with [`InMemoryStore::set_available`]
/// to exercise the `StorageUnavailable` paths of callers.
///
/// # Example
///
/// ```rust
/// use fieldbook_storage::{InMemoryStore, LocalStore, Namespace};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let store = InMemoryStore::new();
/// store.upsert(Namespace::Meta, "device_id", b"abc".to_vec()).await.unwrap();
/// assert_eq!(store.get(Namespace::Meta, "device_id").await.unwrap(), Some(b"abc".to_vec()));
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<Namespace, BTreeMap<String, Vec<u8>>>>,
    available: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every subsequent operation succeed (`true`) or fail with
    /// [`StorageError::Unavailable`] (`false`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns a copy of the keys stored in a namespace, bypassing the
    /// availability switch. Useful for test assertions.
    #[must_use]
    pub fn keys(&self, namespace: Namespace) -> Vec<String> {
        self.tables
            .read()
            .get(&namespace)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory store disabled".into()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn upsert(&self, namespace: Namespace, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check_available()?;
        self.tables
            .write()
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .get(&namespace)
            .and_then(|table| table.get(key).cloned()))
    }

    async fn get_all(&self, namespace: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .get(&namespace)
            .map(|table| {
                table
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self
            .tables
            .write()
            .get_mut(&namespace)
            .map(|table| table.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn clear(&self, namespace: Namespace) -> StorageResult<()> {
        self.check_available()?;
        self.tables.write().remove(&namespace);
        Ok(())
    }

    async fn count(&self, namespace: Namespace) -> StorageResult<usize> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .get(&namespace)
            .map(BTreeMap::len)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        for ns in Namespace::ALL {
            assert_eq!(store.count(ns).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_key() {
        let store = InMemoryStore::new();
        store.upsert(Namespace::Entries, "2025-07-10", vec![1]).await.unwrap();
        store.upsert(Namespace::Entries, "2025-07-10", vec![2]).await.unwrap();

        assert_eq!(store.count(Namespace::Entries).await.unwrap(), 1);
        assert_eq!(
            store.get(Namespace::Entries, "2025-07-10").await.unwrap(),
            Some(vec![2])
        );
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = InMemoryStore::new();
        store.upsert(Namespace::Entries, "k", vec![1]).await.unwrap();
        store.upsert(Namespace::OutboxEntries, "k", vec![9]).await.unwrap();

        store.clear(Namespace::Entries).await.unwrap();

        assert_eq!(store.get(Namespace::Entries, "k").await.unwrap(), None);
        assert_eq!(
            store.get(Namespace::OutboxEntries, "k").await.unwrap(),
            Some(vec![9])
        );
    }

    #[tokio::test]
    async fn get_all_is_ordered_by_key() {
        let store = InMemoryStore::new();
        store.upsert(Namespace::Entries, "2025-07-12", vec![3]).await.unwrap();
        store.upsert(Namespace::Entries, "2025-07-10", vec![1]).await.unwrap();
        store.upsert(Namespace::Entries, "2025-07-11", vec![2]).await.unwrap();

        let keys: Vec<String> = store
            .get_all(Namespace::Entries)
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["2025-07-10", "2025-07-11", "2025-07-12"]);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemoryStore::new();
        store.upsert(Namespace::Settings, "rates", vec![1]).await.unwrap();

        assert!(store.delete(Namespace::Settings, "rates").await.unwrap());
        assert!(!store.delete(Namespace::Settings, "rates").await.unwrap());
        assert!(!store.delete(Namespace::Meta, "missing").await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_store_rejects_operations() {
        let store = InMemoryStore::new();
        store.upsert(Namespace::Entries, "k", vec![1]).await.unwrap();
        store.set_available(false);

        let err = store.get(Namespace::Entries, "k").await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.upsert(Namespace::Entries, "j", vec![2]).await.is_err());

        store.set_available(true);
        assert_eq!(store.keys(Namespace::Entries), vec!["k".to_string()]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        proptest! {
            #[test]
            fn repeated_upserts_keep_one_value_per_key(
                writes in prop::collection::vec(("[a-c]{1,2}", any::<u8>()), 0..40)
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let store = InMemoryStore::new();
                runtime.block_on(async {
                    for (key, value) in &writes {
                        store.upsert(Namespace::Entries, key, vec![*value]).await.unwrap();
                    }
                });

                let distinct: BTreeSet<&String> = writes.iter().map(|(key, _)| key).collect();
                let count = runtime.block_on(store.count(Namespace::Entries)).unwrap();
                prop_assert_eq!(count, distinct.len());

                for key in distinct {
                    let last = writes.iter().rev().find(|(k, _)| k == key).map(|(_, v)| vec![*v]);
                    let stored = runtime.block_on(store.get(Namespace::Entries, key)).unwrap();
                    prop_assert_eq!(stored, last);
                }
            }
        }
    }
}
