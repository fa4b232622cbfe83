//! Staging of pre-cloud data for the one-time migration.

use super::{CliResult, Session};
use clap::Subcommand;
use fieldbook_model::{Entry, Settings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Legacy subcommands.
#[derive(Subcommand)]
pub enum LegacyCommand {
    /// Stage records exported by the local-only app version
    Import {
        /// JSON export with `entries` and optional `settings`
        file: PathBuf,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyExport {
    entries: Vec<Entry>,
    settings: Option<Settings>,
}

/// Runs a legacy subcommand.
pub async fn run(session: &Session, command: LegacyCommand) -> CliResult {
    match command {
        LegacyCommand::Import { file } => import(session, &file).await,
    }
}

async fn import(session: &Session, file: &Path) -> CliResult {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
    let export: LegacyExport = serde_json::from_str(&text)?;

    let migration = session.engine.migration();
    let entries = migration.stage_legacy(&export.entries).await?;
    let settings = match export.settings {
        Some(settings) => migration.stage_legacy(&[settings]).await?,
        None => 0,
    };
    println!(
        "Staged {entries} entries and {settings} settings records for migration."
    );
    println!("Run `fieldbook migrate` while signed in to move them to the cloud.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_without_settings_parses() {
        let export: LegacyExport = serde_json::from_str(r#"{"entries": []}"#).unwrap();
        assert!(export.entries.is_empty());
        assert!(export.settings.is_none());
    }
}
