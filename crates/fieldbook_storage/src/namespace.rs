//! Logical tables of the local store.

use std::fmt;
use std::str::FromStr;

/// A logical table inside the local store.
///
/// Namespaces never share keys: the same key may exist in `Entries` and
/// `OutboxEntries` without interfering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Local mirror of the user's daily entries.
    Entries,
    /// Local mirror of the settings singleton.
    Settings,
    /// Entry writes that failed to reach the remote store.
    OutboxEntries,
    /// Settings writes that failed to reach the remote store.
    OutboxSettings,
    /// Last known device registry entry for this device.
    DeviceRegistryCache,
    /// Entries recorded before cloud sync existed on this device.
    LegacyEntries,
    /// Settings recorded before cloud sync existed on this device.
    LegacySettings,
    /// Small engine state: device id, sync watermark.
    Meta,
}

impl Namespace {
    /// Every namespace, in a stable order.
    pub const ALL: [Namespace; 8] = [
        Namespace::Entries,
        Namespace::Settings,
        Namespace::OutboxEntries,
        Namespace::OutboxSettings,
        Namespace::DeviceRegistryCache,
        Namespace::LegacyEntries,
        Namespace::LegacySettings,
        Namespace::Meta,
    ];

    /// Stable name, also used as the on-disk file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Entries => "entries",
            Namespace::Settings => "settings",
            Namespace::OutboxEntries => "outbox_entries",
            Namespace::OutboxSettings => "outbox_settings",
            Namespace::DeviceRegistryCache => "device_registry_cache",
            Namespace::LegacyEntries => "legacy_entries",
            Namespace::LegacySettings => "legacy_settings",
            Namespace::Meta => "meta",
        }
    }

    /// Returns true for the two outbox namespaces.
    pub fn is_outbox(&self) -> bool {
        matches!(self, Namespace::OutboxEntries | Namespace::OutboxSettings)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| format!("unknown namespace: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for ns in Namespace::ALL {
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert!("records".parse::<Namespace>().is_err());
    }

    #[test]
    fn outbox_namespaces() {
        assert!(Namespace::OutboxEntries.is_outbox());
        assert!(Namespace::OutboxSettings.is_outbox());
        assert!(!Namespace::Entries.is_outbox());
    }
}
