//! A remote store backed by a directory tree.

use crate::collection::Collection;
use crate::document::{RemoteChange, RemoteDocument};
use crate::error::{RemoteError, RemoteResult};
use crate::stamp::Stamper;
use crate::store::RemoteStore;
use crate::subscription::{SubscriberRegistry, Subscription};
use async_trait::async_trait;
use fieldbook_model::{Clock, SystemClock};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const EXTENSION: &str = "json";

/// A remote store that keeps one JSON file per document.
///
/// Layout: `<root>/<user_id>/<collection>/<key>.json`. Pointing several
/// installations at the same synced or network folder gives them a
/// shared remote. Files are replaced atomically (temp file + rename).
///
/// Subscriptions only observe writes made through this instance.
pub struct DirectoryRemote {
    root: PathBuf,
    stamper: Stamper,
    subscribers: Arc<SubscriberRegistry>,
}

impl DirectoryRemote {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> RemoteResult<Self> {
        Self::open_with_clock(root, Arc::new(SystemClock))
    }

    /// Opens a store whose stamps come from `clock`.
    pub fn open_with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> RemoteResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            stamper: Stamper::new(clock),
            subscribers: SubscriberRegistry::new(),
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection, user_id: &str) -> RemoteResult<PathBuf> {
        validate_segment(user_id)?;
        Ok(self.root.join(user_id).join(collection.as_str()))
    }

    fn document_path(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
    ) -> RemoteResult<PathBuf> {
        validate_segment(key)?;
        Ok(self
            .collection_dir(collection, user_id)?
            .join(format!("{key}.{EXTENSION}")))
    }
}

impl std::fmt::Debug for DirectoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryRemote")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

fn validate_segment(segment: &str) -> RemoteResult<()> {
    let valid = !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidKey(segment.to_string()))
    }
}

async fn read_document(path: &Path) -> RemoteResult<Option<RemoteDocument>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemote {
    async fn put(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
        data: serde_json::Value,
    ) -> RemoteResult<RemoteDocument> {
        let path = self.document_path(collection, user_id, key)?;
        if let Some(previous) = read_document(&path).await? {
            self.stamper.observe(previous.remote_updated_at);
        }
        let doc = RemoteDocument {
            key: key.to_string(),
            data,
            remote_updated_at: self.stamper.next(),
        };

        let dir = self.collection_dir(collection, user_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!("{key}.{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&doc)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(%collection, key, stamp = doc.remote_updated_at, "document written");

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
        read_document(&self.document_path(collection, user_id, key)?).await
    }

    async fn get_all(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        let dir = self.collection_dir(collection, user_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(doc) = read_document(&path).await? {
                docs.push(doc);
            }
        }
        docs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(docs)
    }

    async fn delete(&self, collection: Collection, user_id: &str, key: &str) -> RemoteResult<bool> {
        let path = self.document_path(collection, user_id, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                let change = RemoteChange::Deleted {
                    key: key.to_string(),
                    remote_updated_at: self.stamper.next(),
                };
                self.subscribers.publish(collection, user_id, change);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn subscribe(&self, collection: Collection, user_id: &str) -> RemoteResult<Subscription> {
        validate_segment(user_id)?;
        Ok(self.subscribers.subscribe(collection, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldbook_model::ManualClock;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let remote = DirectoryRemote::open(dir.path()).unwrap();
            remote
                .put(Collection::Entries, "u1", "2025-07-10", json!({"points": 5}))
                .await
                .unwrap();
        }

        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let doc = remote
            .get(Collection::Entries, "u1", "2025-07-10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["points"], 5);
        assert!(dir
            .path()
            .join("u1")
            .join("entries")
            .join("2025-07-10.json")
            .exists());
    }

    #[tokio::test]
    async fn stamps_never_go_backwards_per_key() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let remote = DirectoryRemote::open_with_clock(dir.path(), clock.clone()).unwrap();
        let first = remote
            .put(Collection::Settings, "u1", "rates", json!({}))
            .await
            .unwrap();

        // A second installation with a clock running behind.
        let lagging = DirectoryRemote::open_with_clock(dir.path(), Arc::new(ManualClock::new(5)))
            .unwrap();
        let second = lagging
            .put(Collection::Settings, "u1", "rates", json!({}))
            .await
            .unwrap();
        assert!(second.remote_updated_at > first.remote_updated_at);
    }

    #[tokio::test]
    async fn get_all_and_delete() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        assert!(remote.get_all(Collection::Entries, "u1").await.unwrap().is_empty());

        for key in ["2025-07-11", "2025-07-10"] {
            remote
                .put(Collection::Entries, "u1", key, json!({}))
                .await
                .unwrap();
        }
        let docs = remote.get_all(Collection::Entries, "u1").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].key, "2025-07-10");

        assert!(remote.delete(Collection::Entries, "u1", "2025-07-10").await.unwrap());
        assert!(!remote.delete(Collection::Entries, "u1", "2025-07-10").await.unwrap());
        assert_eq!(remote.get_all(Collection::Entries, "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let err = remote
            .put(Collection::Entries, "..", "k", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidKey(_)));
        assert!(remote.get(Collection::Entries, "u1", "a/b").await.is_err());
    }

    #[tokio::test]
    async fn local_subscribers_see_writes() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let mut sub = remote.subscribe(Collection::Entries, "u1").await.unwrap();
        remote
            .put(Collection::Entries, "u1", "k", json!({"n": 1}))
            .await
            .unwrap();
        assert_eq!(sub.next().await.map(|c| c.key().to_string()), Some("k".into()));
    }
}
