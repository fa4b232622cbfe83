//! The `fieldbook.json` configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fieldbook.json";

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    /// Directory of the local durable store.
    pub data_dir: PathBuf,
    /// Directory standing in for the cloud document store.
    pub remote_dir: PathBuf,
    /// Signed-in user id. Without one every write stays local.
    pub user_id: Option<String>,
    /// Email of the signed-in user.
    pub email: Option<String>,
    /// Maximum uploads in flight during a bootstrap.
    pub upload_concurrency: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".fieldbook/local"),
            remote_dir: PathBuf::from(".fieldbook/cloud"),
            user_id: None,
            email: None,
            upload_concurrency: 4,
        }
    }
}

impl CliConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        data_dir: Option<PathBuf>,
        remote_dir: Option<PathBuf>,
        user_id: Option<String>,
    ) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if let Some(dir) = remote_dir {
            self.remote_dir = dir;
        }
        if user_id.is_some() {
            self.user_id = user_id;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{"userId": "crew-7", "uploadConcurrency": 2}"#).unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("crew-7"));
        assert_eq!(config.upload_concurrency, 2);
        assert_eq!(config.data_dir, CliConfig::default().data_dir);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CliConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn flags_override_file_values() {
        let config = CliConfig {
            user_id: Some("from-file".into()),
            ..CliConfig::default()
        }
        .with_overrides(Some("/tmp/local".into()), None, None);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/local"));
        assert_eq!(config.user_id.as_deref(), Some("from-file"));
    }
}
