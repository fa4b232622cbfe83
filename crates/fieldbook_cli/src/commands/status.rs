//! Status, outbox and device commands.

use super::{format_timestamp, CliResult, Session};
use serde_json::json;

/// Prints the engine status.
pub async fn status(session: &Session, format: &str) -> CliResult {
    let status = session.engine.status().await?;
    let user = session.engine.current_user().map(|u| u.uid);

    match format {
        "json" => {
            let value = json!({
                "state": status.state.to_string(),
                "signedIn": status.is_signed_in,
                "user": user,
                "online": status.is_online,
                "permissionError": status.has_permission_error,
                "lastSyncTime": status.last_sync_time,
                "pendingOutbox": status.pending_outbox,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("Fieldbook Sync Status");
            println!("=====================");
            println!();
            println!("State:          {}", status.state);
            println!("User:           {}", user.as_deref().unwrap_or("(signed out)"));
            println!(
                "Last sync:      {}",
                status
                    .last_sync_time
                    .map_or_else(|| "never".to_string(), format_timestamp)
            );
            println!("Pending writes: {}", status.pending_outbox);
            if status.has_permission_error {
                println!();
                println!("Cloud access was denied. Sign in again to resume syncing.");
            }
        }
    }
    Ok(())
}

/// Lists writes waiting in the outbox.
pub async fn outbox(session: &Session, format: &str) -> CliResult {
    let pending = session.engine.pending_writes().await?;
    match format {
        "json" => {
            let rows: Vec<_> = pending
                .iter()
                .map(|write| {
                    json!({
                        "kind": write.kind.as_str(),
                        "key": write.key,
                        "action": write.action.to_string(),
                        "offlineTimestamp": write.offline_timestamp,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            if pending.is_empty() {
                println!("Outbox is empty.");
            }
            for write in &pending {
                println!(
                    "{}  {:<6} {:<8} {}",
                    format_timestamp(write.offline_timestamp),
                    write.action,
                    write.kind,
                    write.key
                );
            }
        }
    }
    Ok(())
}

/// Shows this device's id and migration record.
pub async fn device(session: &Session) -> CliResult {
    let migration = session.engine.migration();
    println!("Device id:  {}", migration.device_id().await?);
    println!("Legacy:     {} records waiting", migration.legacy_count().await?);

    match migration.cached_status().await? {
        Some(row) => {
            println!("Migration:  {}", row.migration_status);
            println!("Attempts:   {}", row.migration_attempts);
            println!(
                "Results:    {} migrated, {} conflicted, {} failed",
                row.migration_results.migrated,
                row.migration_results.conflicted,
                row.migration_results.failed
            );
            if let Some(at) = row.completed_at {
                println!("Completed:  {}", format_timestamp(at));
            }
        }
        None => println!("Migration:  not registered yet"),
    }
    Ok(())
}
