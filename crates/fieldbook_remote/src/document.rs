//! Remote documents and change notifications.

use fieldbook_model::Timestamp;
use serde::{Deserialize, Serialize};

/// A document as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Document key within its collection.
    pub key: String,
    /// Document body.
    pub data: serde_json::Value,
    /// Server-observed stamp of the last accepted write.
    pub remote_updated_at: Timestamp,
}

impl RemoteDocument {
    /// Decodes the body into a typed record.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// A change pushed to subscribers of a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// A document was created or replaced.
    Upserted(RemoteDocument),
    /// A document was deleted.
    Deleted {
        /// Key of the deleted document.
        key: String,
        /// Stamp of the delete.
        remote_updated_at: Timestamp,
    },
}

impl RemoteChange {
    /// Key the change applies to.
    pub fn key(&self) -> &str {
        match self {
            RemoteChange::Upserted(doc) => &doc.key,
            RemoteChange::Deleted { key, .. } => key,
        }
    }

    /// Stamp of the change.
    pub fn remote_updated_at(&self) -> Timestamp {
        match self {
            RemoteChange::Upserted(doc) => doc.remote_updated_at,
            RemoteChange::Deleted {
                remote_updated_at, ..
            } => *remote_updated_at,
        }
    }
}
