//! The remote document store contract.

use crate::collection::Collection;
use crate::document::RemoteDocument;
use crate::error::RemoteResult;
use crate::subscription::Subscription;
use async_trait::async_trait;

/// A per-user, per-collection document store reachable over a network.
///
/// # Contract
///
/// - `put` is an upsert by key and returns the stored document with its
///   new `remote_updated_at`
/// - `get` returns `Ok(None)` for a missing document
/// - `get_all` returns documents ordered by key
/// - `delete` returns whether a document existed
/// - `subscribe` delivers every later change of the collection until the
///   subscription is dropped
///
/// Implementations must be `Send + Sync` for use from async tasks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates or replaces a document.
    async fn put(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
        data: serde_json::Value,
    ) -> RemoteResult<RemoteDocument>;

    /// Reads one document.
    async fn get(
        &self,
        collection: Collection,
        user_id: &str,
        key: &str,
    ) -> RemoteResult<Option<RemoteDocument>>;

    /// Reads every document of a collection.
    async fn get_all(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> RemoteResult<Vec<RemoteDocument>>;

    /// Deletes one document.
    async fn delete(&self, collection: Collection, user_id: &str, key: &str)
        -> RemoteResult<bool>;

    /// Starts receiving changes of a collection.
    async fn subscribe(&self, collection: Collection, user_id: &str)
        -> RemoteResult<Subscription>;
}
