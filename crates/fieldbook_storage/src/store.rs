//! Local store trait definition.

use crate::error::StorageResult;
use crate::namespace::Namespace;
use async_trait::async_trait;

/// The local durable store of one device.
///
/// # Invariants
///
/// - `upsert` replaces any existing value for `(namespace, key)`
/// - `get_all` returns entries ordered by key
/// - operations on one namespace never observe another namespace
/// - a failed operation leaves the namespace as it was before the call
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Inserts or replaces the value stored under `key`.
    async fn upsert(&self, namespace: Namespace, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Returns the value stored under `key`, if any.
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns every `(key, value)` pair of the namespace, ordered by key.
    async fn get_all(&self, namespace: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Deletes the value under `key`. Returns true if something was removed.
    async fn delete(&self, namespace: Namespace, key: &str) -> StorageResult<bool>;

    /// Removes every value in the namespace.
    async fn clear(&self, namespace: Namespace) -> StorageResult<()>;

    /// Returns the number of values in the namespace.
    async fn count(&self, namespace: Namespace) -> StorageResult<usize>;
}
