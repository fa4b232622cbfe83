//! Remote collections.

use crate::error::RemoteError;
use std::fmt;
use std::str::FromStr;

/// A per-user remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Daily entries keyed by date.
    Entries,
    /// The settings singleton.
    Settings,
    /// The device registry.
    Devices,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Collection; 3] = [
        Collection::Entries,
        Collection::Settings,
        Collection::Devices,
    ];

    /// Stable name, also used as a directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Entries => "entries",
            Collection::Settings => "settings",
            Collection::Devices => "devices",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RemoteError::InvalidKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for collection in Collection::ALL {
            assert_eq!(collection.as_str().parse::<Collection>().unwrap(), collection);
        }
        assert!("users".parse::<Collection>().is_err());
    }
}
