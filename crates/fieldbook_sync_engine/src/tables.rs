//! Typed access to the local store.
//!
//! The local store keeps opaque bytes. This layer encodes records as CBOR
//! and maps each record type onto its namespaces and remote collection.

use crate::error::{SyncError, SyncResult};
use fieldbook_model::{
    DeviceId, DeviceRegistryEntry, Entry, OutboxItem, RemoteCopy, Settings, SyncRecord, Timestamp,
};
use fieldbook_remote::{Collection, RemoteDocument};
use fieldbook_storage::{LocalStore, Namespace};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const DEVICE_ID_KEY: &str = "device_id";
const WATERMARK_KEY: &str = "last_sync_time";

/// Where a record type lives locally and remotely.
pub trait TableRecord: SyncRecord {
    /// Local mirror namespace.
    const PRIMARY: Namespace;
    /// Outbox namespace.
    const OUTBOX: Namespace;
    /// Pre-cloud local-only namespace read by the migration.
    const LEGACY: Namespace;
    /// Remote collection.
    const COLLECTION: Collection;
}

impl TableRecord for Entry {
    const PRIMARY: Namespace = Namespace::Entries;
    const OUTBOX: Namespace = Namespace::OutboxEntries;
    const LEGACY: Namespace = Namespace::LegacyEntries;
    const COLLECTION: Collection = Collection::Entries;
}

impl TableRecord for Settings {
    const PRIMARY: Namespace = Namespace::Settings;
    const OUTBOX: Namespace = Namespace::OutboxSettings;
    const LEGACY: Namespace = Namespace::LegacySettings;
    const COLLECTION: Collection = Collection::Settings;
}

fn encode<T: Serialize>(value: &T) -> SyncResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(SyncError::codec)?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SyncResult<T> {
    ciborium::from_reader(bytes).map_err(SyncError::codec)
}

/// Encodes a record as a remote document body.
pub(crate) fn to_document<R: TableRecord>(record: &R) -> SyncResult<serde_json::Value> {
    Ok(serde_json::to_value(record)?)
}

/// Decodes a remote document into a record paired with its stamp.
pub(crate) fn from_document<R: TableRecord>(doc: &RemoteDocument) -> SyncResult<RemoteCopy<R>> {
    Ok(RemoteCopy::new(doc.decode::<R>()?, doc.remote_updated_at))
}

/// Typed view over a [`LocalStore`].
#[derive(Clone)]
pub struct Tables {
    store: Arc<dyn LocalStore>,
}

impl Tables {
    /// Wraps a local store.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Reads one record from `namespace`.
    pub async fn load<R: TableRecord>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> SyncResult<Option<R>> {
        match self.store.get(namespace, key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads every record of `namespace`, ordered by key.
    pub async fn load_all<R: TableRecord>(&self, namespace: Namespace) -> SyncResult<Vec<R>> {
        self.store
            .get_all(namespace)
            .await?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Writes a record into `namespace` under its own key.
    pub async fn save<R: TableRecord>(&self, namespace: Namespace, record: &R) -> SyncResult<()> {
        self.store
            .upsert(namespace, &record.key(), encode(record)?)
            .await?;
        Ok(())
    }

    /// Removes a key from `namespace`.
    pub async fn remove(&self, namespace: Namespace, key: &str) -> SyncResult<bool> {
        Ok(self.store.delete(namespace, key).await?)
    }

    /// Empties `namespace`.
    pub async fn clear(&self, namespace: Namespace) -> SyncResult<()> {
        Ok(self.store.clear(namespace).await?)
    }

    /// Number of keys in `namespace`.
    pub async fn count(&self, namespace: Namespace) -> SyncResult<usize> {
        Ok(self.store.count(namespace).await?)
    }

    /// Reads a queued write.
    pub async fn outbox_item<R: TableRecord>(
        &self,
        key: &str,
    ) -> SyncResult<Option<OutboxItem<R>>> {
        match self.store.get(R::OUTBOX, key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads every queued write of one record type.
    pub async fn outbox_items<R: TableRecord>(&self) -> SyncResult<Vec<OutboxItem<R>>> {
        self.store
            .get_all(R::OUTBOX)
            .await?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    /// Stores a queued write, replacing any earlier one for the same key.
    pub async fn put_outbox_item<R: TableRecord>(&self, item: &OutboxItem<R>) -> SyncResult<()> {
        self.store
            .upsert(R::OUTBOX, &item.key(), encode(item)?)
            .await?;
        Ok(())
    }

    /// The persisted device id, if one was generated.
    pub async fn device_id(&self) -> SyncResult<Option<DeviceId>> {
        self.meta(DEVICE_ID_KEY).await
    }

    /// Persists the device id.
    pub async fn set_device_id(&self, id: &DeviceId) -> SyncResult<()> {
        self.set_meta(DEVICE_ID_KEY, id).await
    }

    /// The last successful sync boundary.
    pub async fn watermark(&self) -> SyncResult<Option<Timestamp>> {
        self.meta(WATERMARK_KEY).await
    }

    /// Persists the last successful sync boundary.
    pub async fn set_watermark(&self, at: Timestamp) -> SyncResult<()> {
        self.set_meta(WATERMARK_KEY, &at).await
    }

    /// The locally cached registry row of a device.
    pub async fn cached_registry(
        &self,
        device_id: &DeviceId,
    ) -> SyncResult<Option<DeviceRegistryEntry>> {
        match self
            .store
            .get(Namespace::DeviceRegistryCache, device_id.as_str())
            .await?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Caches a registry row locally.
    pub async fn cache_registry(&self, entry: &DeviceRegistryEntry) -> SyncResult<()> {
        self.store
            .upsert(
                Namespace::DeviceRegistryCache,
                entry.device_id.as_str(),
                encode(entry)?,
            )
            .await?;
        Ok(())
    }

    async fn meta<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.store.get(Namespace::Meta, key).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_meta<T: Serialize>(&self, key: &str, value: &T) -> SyncResult<()> {
        self.store
            .upsert(Namespace::Meta, key, encode(value)?)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Tables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tables").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldbook_model::EntryDate;
    use fieldbook_storage::InMemoryStore;

    fn tables() -> Tables {
        Tables::new(Arc::new(InMemoryStore::new()))
    }

    fn entry(date: &str, points: i64) -> Entry {
        Entry::new(EntryDate::parse(date).unwrap(), 10).with_points(points)
    }

    #[tokio::test]
    async fn records_roundtrip_through_cbor() {
        let tables = tables();
        let record = entry("2025-07-10", 5).with_note("north field");
        tables.save(Namespace::Entries, &record).await.unwrap();

        let loaded: Entry = tables
            .load(Namespace::Entries, "2025-07-10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, record);
        assert!(tables
            .load::<Entry>(Namespace::Entries, "2025-07-11")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn outbox_replaces_by_key() {
        let tables = tables();
        tables
            .put_outbox_item(&OutboxItem::save(entry("2025-07-10", 5), 1))
            .await
            .unwrap();
        tables
            .put_outbox_item(&OutboxItem::delete(entry("2025-07-10", 5), 2))
            .await
            .unwrap();

        let items = tables.outbox_items::<Entry>().await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_delete());
    }

    #[tokio::test]
    async fn meta_values() {
        let tables = tables();
        assert!(tables.watermark().await.unwrap().is_none());
        tables.set_watermark(42).await.unwrap();
        assert_eq!(tables.watermark().await.unwrap(), Some(42));

        let id = DeviceId::new("device-1").unwrap();
        tables.set_device_id(&id).await.unwrap();
        assert_eq!(tables.device_id().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_codec_error() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert(Namespace::Entries, "2025-07-10", vec![0xff, 0x00])
            .await
            .unwrap();
        let tables = Tables::new(store);
        let err = tables
            .load::<Entry>(Namespace::Entries, "2025-07-10")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Codec(_)));
    }

    #[test]
    fn documents_roundtrip() {
        let record = entry("2025-07-10", 5);
        let doc = RemoteDocument {
            key: record.key(),
            data: to_document(&record).unwrap(),
            remote_updated_at: 99,
        };
        let copy: RemoteCopy<Entry> = from_document(&doc).unwrap();
        assert_eq!(copy.record, record);
        assert_eq!(copy.remote_updated_at, 99);
    }
}
