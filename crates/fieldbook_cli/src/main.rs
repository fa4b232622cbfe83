//! Fieldbook CLI
//!
//! Command-line front end for the Fieldbook sync core. Local data lives in
//! a file store, and a shared directory stands in for the cloud.
//!
//! # Commands
//!
//! - `entry add|list|delete` - Manage daily entries
//! - `settings show|set` - Manage pay rates
//! - `sync [--full]` - Run an incremental or full sync pass
//! - `migrate` - Move legacy local data to the cloud once per device
//! - `status` - Show sync state and pending writes
//! - `outbox` - List writes waiting for the cloud
//! - `device` - Show this device's id and migration record
//! - `legacy import` - Stage data exported by the local-only version

mod commands;
mod config;
mod ports;

use clap::{Parser, Subcommand, ValueEnum};
use commands::entry::EntryCommand;
use commands::legacy::LegacyCommand;
use commands::settings::SettingsCommand;
use commands::Session;
use config::{CliConfig, DEFAULT_CONFIG_FILE};
use fieldbook_model::ConflictChoice;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fieldbook offline-first field data tools.
#[derive(Parser)]
#[command(name = "fieldbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(global = true, short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory of the local store (overrides the config file)
    #[arg(global = true, long)]
    data_dir: Option<PathBuf>,

    /// Directory acting as the cloud store (overrides the config file)
    #[arg(global = true, long)]
    remote_dir: Option<PathBuf>,

    /// Signed-in user id (overrides the config file)
    #[arg(global = true, short, long)]
    user: Option<String>,

    /// Answer every conflict without asking
    #[arg(global = true, long, value_enum)]
    prefer: Option<Prefer>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Prefer {
    /// Keep the version on this device
    Local,
    /// Keep the cloud version
    Remote,
}

impl From<Prefer> for ConflictChoice {
    fn from(prefer: Prefer) -> Self {
        match prefer {
            Prefer::Local => ConflictChoice::KeepLocal,
            Prefer::Remote => ConflictChoice::KeepRemote,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage daily entries
    Entry {
        #[command(subcommand)]
        action: EntryCommand,
    },

    /// Manage pay rates
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Sync with the cloud
    Sync {
        /// Compare every record instead of recent changes only
        #[arg(long)]
        full: bool,
    },

    /// Move legacy local data to the cloud
    Migrate,

    /// Show sync state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List writes waiting for the cloud
    Outbox {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show this device's id and migration record
    Device,

    /// Work with data from the local-only version
    Legacy {
        #[command(subcommand)]
        action: LegacyCommand,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Fieldbook CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config =
        CliConfig::load(&cli.config)?.with_overrides(cli.data_dir, cli.remote_dir, cli.user);
    let session = Session::open(&config, cli.prefer.map(ConflictChoice::from))?;

    match cli.command {
        Commands::Entry { action } => commands::entry::run(&session, action).await?,
        Commands::Settings { action } => commands::settings::run(&session, action).await?,
        Commands::Sync { full } => commands::sync::run(&session, full).await?,
        Commands::Migrate => commands::sync::migrate(&session).await?,
        Commands::Status { format } => commands::status::status(&session, &format).await?,
        Commands::Outbox { format } => commands::status::outbox(&session, &format).await?,
        Commands::Device => commands::status::device(&session).await?,
        Commands::Legacy { action } => commands::legacy::run(&session, action).await?,
        Commands::Version => {}
    }

    Ok(())
}
