//! Sync and migration commands.

use super::{CliResult, Session};
use tracing::info;

/// Runs one sync pass.
pub async fn run(session: &Session, full: bool) -> CliResult {
    info!(full, "starting sync");
    let report = if full {
        session.engine.perform_manual_sync_all().await?
    } else {
        session.engine.perform_incremental_sync().await?
    };
    match report {
        Some(report) => {
            println!("{}", report.summary());
            if report.was_interrupted() {
                println!("The cloud stopped answering; pending writes will be retried.");
            }
        }
        None => println!("A sync is already running."),
    }
    Ok(())
}

/// Runs the one-time migration of legacy local data.
pub async fn migrate(session: &Session) -> CliResult {
    let report = session.engine.run_migration().await?;
    if report.skipped {
        println!(
            "Device {} already migrated ({} attempts).",
            report.device_id, report.attempts
        );
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}
