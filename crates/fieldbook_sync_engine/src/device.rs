//! Device identity and the per-device migration registry.

use crate::context::Context;
use crate::error::SyncResult;
use crate::ports::AuthUser;
use fieldbook_model::{DeviceId, DeviceRegistryEntry};
use fieldbook_remote::Collection;
use tracing::info;
use uuid::Uuid;

impl Context {
    /// The persisted device id, generated on first use.
    pub(crate) async fn device_id(&self) -> SyncResult<DeviceId> {
        if let Some(id) = self.tables.device_id().await? {
            return Ok(id);
        }
        let id = DeviceId::new(Uuid::new_v4().to_string())?;
        self.tables.set_device_id(&id).await?;
        info!(device_id = %id, "generated device id");
        Ok(id)
    }

    /// Reads this device's registry row from the remote store.
    pub(crate) async fn fetch_registry(
        &self,
        user: &AuthUser,
        device_id: &DeviceId,
    ) -> SyncResult<Option<DeviceRegistryEntry>> {
        match self
            .remote
            .get(Collection::Devices, &user.uid, device_id.as_str())
            .await?
        {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes this device's registry row remotely and caches it locally.
    pub(crate) async fn put_registry(
        &self,
        user: &AuthUser,
        entry: &DeviceRegistryEntry,
    ) -> SyncResult<()> {
        self.tables.cache_registry(entry).await?;
        self.remote
            .put(
                Collection::Devices,
                &user.uid,
                entry.device_id.as_str(),
                serde_json::to_value(entry)?,
            )
            .await?;
        Ok(())
    }
}
