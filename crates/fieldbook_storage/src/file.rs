//! File-based local store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::namespace::Namespace;
use crate::store::LocalStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Format version written into every namespace file.
const FILE_FORMAT_VERSION: u32 = 1;

/// On-disk layout of one namespace file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct NamespaceFile {
    version: u32,
    records: BTreeMap<String, Vec<u8>>,
}

/// A file-based local store.
///
/// Each namespace is persisted as `<dir>/<namespace>.cbor`. All namespaces
/// are loaded on [`FileStore::open`] and served from memory afterwards.
///
/// # Durability
///
/// Every mutation rewrites the namespace file through a temporary file that
/// is synced and then renamed over the previous version, so a crash leaves
/// either the old or the new table on disk. The in-memory table is only
/// updated after the rename succeeded.
///
/// # Example
///
/// ```no_run
/// use fieldbook_storage::{FileStore, LocalStore, Namespace};
/// use std::path::Path;
///
/// # async fn demo() -> fieldbook_storage::StorageResult<()> {
/// let store = FileStore::open(Path::new("fieldbook-data"))?;
/// store.upsert(Namespace::Entries, "2025-07-10", b"...".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tables: Mutex<HashMap<Namespace, BTreeMap<String, Vec<u8>>>>,
}

impl FileStore {
    /// Opens or creates a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the directory cannot be
    /// created, and [`StorageError::Corrupted`] if a namespace file exists
    /// but cannot be decoded.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            StorageError::Unavailable(format!("cannot create {}: {e}", dir.display()))
        })?;

        let mut tables = HashMap::new();
        for namespace in Namespace::ALL {
            let path = Self::namespace_path(dir, namespace);
            if !path.exists() {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let file: NamespaceFile = ciborium::de::from_reader(bytes.as_slice())
                .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))?;
            if file.version != FILE_FORMAT_VERSION {
                return Err(StorageError::Corrupted(format!(
                    "{}: unsupported format version {}",
                    path.display(),
                    file.version
                )));
            }
            tracing::debug!(
                namespace = %namespace,
                records = file.records.len(),
                "loaded namespace"
            );
            tables.insert(namespace, file.records);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            tables: Mutex::new(tables),
        })
    }

    /// Returns the data directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn namespace_path(dir: &Path, namespace: Namespace) -> PathBuf {
        dir.join(format!("{}.cbor", namespace.as_str()))
    }

    async fn persist(
        &self,
        namespace: Namespace,
        records: &BTreeMap<String, Vec<u8>>,
    ) -> StorageResult<()> {
        let file = NamespaceFile {
            version: FILE_FORMAT_VERSION,
            records: records.clone(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&file, &mut bytes)
            .map_err(|e| StorageError::Corrupted(format!("encode {namespace}: {e}")))?;

        let path = Self::namespace_path(&self.dir, namespace);
        let tmp = path.with_extension("cbor.tmp");

        let mut handle = tokio::fs::File::create(&tmp).await?;
        handle.write_all(&bytes).await?;
        handle.sync_all().await?;
        drop(handle);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Applies `change` to a copy of the namespace, persists the copy and
    /// only then swaps it in.
    async fn mutate<R>(
        &self,
        namespace: Namespace,
        change: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> R,
    ) -> StorageResult<R> {
        let mut tables = self.tables.lock().await;
        let mut table = tables.get(&namespace).cloned().unwrap_or_default();
        let outcome = change(&mut table);
        self.persist(namespace, &table).await?;
        tables.insert(namespace, table);
        Ok(outcome)
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn upsert(&self, namespace: Namespace, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.mutate(namespace, |table| {
            table.insert(key.to_string(), value);
        })
        .await
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let tables = self.tables.lock().await;
        Ok(tables.get(&namespace).and_then(|table| table.get(key).cloned()))
    }

    async fn get_all(&self, namespace: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let tables = self.tables.lock().await;
        Ok(tables
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
        {
            let tables = self.tables.lock().await;
            let present = tables
                .get(&namespace)
                .is_some_and(|table| table.contains_key(key));
            if !present {
                return Ok(false);
            }
        }
        self.mutate(namespace, |table| table.remove(key).is_some())
            .await
    }

    async fn clear(&self, namespace: Namespace) -> StorageResult<()> {
        self.mutate(namespace, BTreeMap::clear).await
    }

    async fn count(&self, namespace: Namespace) -> StorageResult<usize> {
        let tables = self.tables.lock().await;
        Ok(tables.get(&namespace).map(BTreeMap::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data");

        let store = FileStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.dir(), path.as_path());
        assert_eq!(store.count(Namespace::Entries).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.upsert(Namespace::Entries, "2025-07-10", vec![1, 2, 3]).await.unwrap();
            store.upsert(Namespace::Meta, "device_id", b"dev".to_vec()).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(Namespace::Entries, "2025-07-10").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(
            store.get(Namespace::Meta, "device_id").await.unwrap(),
            Some(b"dev".to_vec())
        );
    }

    #[tokio::test]
    async fn file_delete_and_clear_persist() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.upsert(Namespace::OutboxEntries, "a", vec![1]).await.unwrap();
            store.upsert(Namespace::OutboxEntries, "b", vec![2]).await.unwrap();
            store.upsert(Namespace::Settings, "rates", vec![3]).await.unwrap();
            assert!(store.delete(Namespace::OutboxEntries, "a").await.unwrap());
            assert!(!store.delete(Namespace::OutboxEntries, "zzz").await.unwrap());
            store.clear(Namespace::Settings).await.unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.count(Namespace::OutboxEntries).await.unwrap(), 1);
        assert_eq!(store.count(Namespace::Settings).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupted_namespace_file_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("entries.cbor"), b"not cbor at all").unwrap();

        let result = FileStore::open(dir.path());
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.upsert(Namespace::Entries, "k", vec![7]).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
