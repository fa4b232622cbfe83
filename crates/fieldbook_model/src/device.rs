//! Device identity and per-device migration tracking.

use crate::clock::Timestamp;
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A locally generated, installation-scoped device identifier.
///
/// The value is opaque to the model; the engine generates a random UUID
/// on first run and persists it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Wraps an identifier, rejecting blank or path-unsafe values.
    pub fn new(value: impl Into<String>) -> ModelResult<Self> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= 64
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(value))
        } else {
            Err(ModelError::InvalidDeviceId(value))
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Progress of the one-time legacy migration on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Registered, not yet finished.
    #[default]
    Pending,
    /// Finished with no failures. Terminal.
    Completed,
    /// Finished with at least one failure. Retried on the next load.
    Failed,
}

impl MigrationStatus {
    /// Returns true once no further attempts will run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStatus::Pending => write!(f, "pending"),
            MigrationStatus::Completed => write!(f, "completed"),
            MigrationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counters from one migration attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResults {
    /// Records now present remotely.
    pub migrated: u32,
    /// Records that needed a user decision. Also counted in `migrated`.
    pub conflicted: u32,
    /// Records that could not be uploaded.
    pub failed: u32,
}

impl MigrationResults {
    /// Total records processed.
    pub fn total(&self) -> u32 {
        self.migrated + self.failed
    }
}

/// A row of the remote device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistryEntry {
    /// Owner of the device row.
    pub user_id: String,
    /// Device the row describes.
    pub device_id: DeviceId,
    /// Migration progress.
    pub migration_status: MigrationStatus,
    /// How many attempts have finished. Never decreases.
    pub migration_attempts: u32,
    /// Counters from the latest attempt.
    #[serde(default)]
    pub migration_results: MigrationResults,
    /// When the latest attempt finished.
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    /// When the device was first registered.
    pub registered_at: Timestamp,
}

impl DeviceRegistryEntry {
    /// A fresh pending registration.
    pub fn pending(user_id: impl Into<String>, device_id: DeviceId, now: Timestamp) -> Self {
        Self {
            user_id: user_id.into(),
            device_id,
            migration_status: MigrationStatus::Pending,
            migration_attempts: 0,
            migration_results: MigrationResults::default(),
            completed_at: None,
            registered_at: now,
        }
    }

    /// Records the outcome of an attempt.
    ///
    /// The status becomes `Completed` when nothing failed and `Failed`
    /// otherwise; the attempt counter always advances.
    pub fn finish_attempt(&mut self, results: MigrationResults, now: Timestamp) {
        self.migration_attempts = self.migration_attempts.saturating_add(1);
        self.migration_results = results;
        self.migration_status = if results.failed == 0 {
            MigrationStatus::Completed
        } else {
            MigrationStatus::Failed
        };
        self.completed_at = Some(now);
    }

    /// Returns true when the migration has completed.
    pub fn is_completed(&self) -> bool {
        self.migration_status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("6f1c2d9e-2b7a-4d38-9d1e-6a7b3c2f9e01").unwrap()
    }

    #[test]
    fn device_id_rejects_unsafe_values() {
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("../etc").is_err());
        assert!(DeviceId::new("a".repeat(65)).is_err());
        assert_eq!(device().as_str().len(), 36);
    }

    #[test]
    fn finish_attempt_sets_status_and_counters() {
        let mut entry = DeviceRegistryEntry::pending("u1", device(), 100);
        assert_eq!(entry.migration_status, MigrationStatus::Pending);

        entry.finish_attempt(
            MigrationResults {
                migrated: 3,
                conflicted: 1,
                failed: 1,
            },
            200,
        );
        assert_eq!(entry.migration_status, MigrationStatus::Failed);
        assert_eq!(entry.migration_attempts, 1);
        assert!(!entry.is_completed());

        entry.finish_attempt(
            MigrationResults {
                migrated: 1,
                ..MigrationResults::default()
            },
            300,
        );
        assert_eq!(entry.migration_status, MigrationStatus::Completed);
        assert_eq!(entry.migration_attempts, 2);
        assert_eq!(entry.completed_at, Some(300));
        assert!(entry.is_completed());
    }

    #[test]
    fn registry_entry_json_shape() {
        let entry = DeviceRegistryEntry::pending("u1", device(), 100);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["migrationStatus"], "pending");
        assert_eq!(json["migrationAttempts"], 0);
        let back: DeviceRegistryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
