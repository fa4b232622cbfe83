//! CLI command implementations.

pub mod entry;
pub mod legacy;
pub mod settings;
pub mod status;
pub mod sync;

use crate::config::CliConfig;
use crate::ports::{ConsoleNotifier, ConsoleResolver, StaticAuth};
use fieldbook_model::{ConflictChoice, Timestamp};
use fieldbook_remote::DirectoryRemote;
use fieldbook_storage::FileStore;
use fieldbook_sync_engine::{AuthUser, SyncConfig, SyncEngine, WriteOutcome};
use std::sync::Arc;

/// Result type shared by the commands.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// An engine wired to the on-disk stores named by the configuration.
pub struct Session {
    /// The engine every command drives.
    pub engine: SyncEngine,
}

impl Session {
    /// Opens both stores and builds the engine.
    pub fn open(config: &CliConfig, preference: Option<ConflictChoice>) -> CliResult<Self> {
        let local = FileStore::open(&config.data_dir)?;
        let remote = DirectoryRemote::open(&config.remote_dir)?;
        let user = config.user_id.as_ref().map(|uid| {
            let user = AuthUser::new(uid.clone());
            match &config.email {
                Some(email) => user.with_email(email.clone()),
                None => user,
            }
        });
        tracing::debug!(
            data_dir = %config.data_dir.display(),
            remote_dir = %config.remote_dir.display(),
            signed_in = user.is_some(),
            "opening session"
        );

        let engine = SyncEngine::builder()
            .with_local_store(Arc::new(local))
            .with_remote(Arc::new(remote))
            .with_auth(Arc::new(StaticAuth::new(user)))
            .with_notifier(Arc::new(ConsoleNotifier))
            .with_conflict_port(Arc::new(ConsoleResolver::new(preference)))
            .with_config(SyncConfig::new().with_upload_concurrency(config.upload_concurrency))
            .build()?;
        Ok(Self { engine })
    }
}

fn describe(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Synced => "synced",
        WriteOutcome::Queued => "queued for sync",
    }
}

fn format_timestamp(ms: Timestamp) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{ms} ms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldbook_model::EntryDate;
    use tempfile::tempdir;

    fn config(root: &std::path::Path, user: Option<&str>) -> CliConfig {
        CliConfig {
            data_dir: root.join("local"),
            remote_dir: root.join("cloud"),
            user_id: user.map(str::to_string),
            ..CliConfig::default()
        }
    }

    fn add_args(date: &str, points: i64) -> entry::AddArgs {
        entry::AddArgs {
            date: date.into(),
            points,
            hours: 8.0,
            mileage: 0.0,
            day_off: false,
            note: String::new(),
            fuel: 0.0,
            meals: 0.0,
            lodging: 0.0,
            other: 0.0,
        }
    }

    #[tokio::test]
    async fn signed_in_entry_reaches_remote_directory() {
        let dir = tempdir().unwrap();
        let session = Session::open(&config(dir.path(), Some("crew-7")), None).unwrap();

        entry::run(&session, entry::EntryCommand::Add(add_args("2025-07-10", 4)))
            .await
            .unwrap();

        let status = session.engine.status().await.unwrap();
        assert_eq!(status.pending_outbox, 0);
        assert!(dir.path().join("cloud").join("crew-7").exists());
    }

    #[tokio::test]
    async fn signed_out_entry_is_queued_and_survives_restart() {
        let dir = tempdir().unwrap();
        {
            let session = Session::open(&config(dir.path(), None), None).unwrap();
            entry::run(&session, entry::EntryCommand::Add(add_args("2025-07-10", 4)))
                .await
                .unwrap();
        }

        let session = Session::open(&config(dir.path(), None), None).unwrap();
        let date = EntryDate::parse("2025-07-10").unwrap();
        assert_eq!(session.engine.entry(&date).await.unwrap().unwrap().points, 4);
        assert_eq!(session.engine.pending_writes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queued_entry_is_pushed_by_sync() {
        let dir = tempdir().unwrap();
        {
            let session = Session::open(&config(dir.path(), None), None).unwrap();
            entry::run(&session, entry::EntryCommand::Add(add_args("2025-07-10", 4)))
                .await
                .unwrap();
        }

        let session = Session::open(&config(dir.path(), Some("crew-7")), None).unwrap();
        sync::run(&session, true).await.unwrap();
        assert!(session.engine.pending_writes().await.unwrap().is_empty());
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
