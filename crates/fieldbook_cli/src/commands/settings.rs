//! Settings commands.

use super::{describe, CliResult, Session};
use clap::Subcommand;
use fieldbook_model::{Clock, Settings, SystemClock};

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show the current rates
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Change one or more rates; unspecified values are kept
    Set {
        /// Pay per point
        #[arg(long)]
        point_rate: Option<f64>,

        /// Pay per hour
        #[arg(long)]
        hourly_rate: Option<f64>,

        /// Pay per distance unit
        #[arg(long)]
        mileage_rate: Option<f64>,

        /// Currency code
        #[arg(long)]
        currency: Option<String>,
    },
}

/// Runs a settings subcommand.
pub async fn run(session: &Session, command: SettingsCommand) -> CliResult {
    match command {
        SettingsCommand::Show { format } => {
            let Some(settings) = session.engine.settings().await? else {
                println!("No settings saved yet.");
                return Ok(());
            };
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&settings)?),
                _ => {
                    println!("Point rate:    {:.2} {}", settings.point_rate, settings.currency);
                    println!("Hourly rate:   {:.2} {}", settings.hourly_rate, settings.currency);
                    println!("Mileage rate:  {:.2} {}", settings.mileage_rate, settings.currency);
                }
            }
            Ok(())
        }
        SettingsCommand::Set {
            point_rate,
            hourly_rate,
            mileage_rate,
            currency,
        } => {
            let mut settings = match session.engine.settings().await? {
                Some(settings) => settings,
                None => Settings::new(SystemClock.now_millis()),
            };
            settings.point_rate = point_rate.unwrap_or(settings.point_rate);
            settings.hourly_rate = hourly_rate.unwrap_or(settings.hourly_rate);
            settings.mileage_rate = mileage_rate.unwrap_or(settings.mileage_rate);
            if let Some(currency) = currency {
                settings.currency = currency;
            }
            let outcome = session.engine.save_settings(settings).await?;
            println!("Settings saved ({})", describe(outcome));
            Ok(())
        }
    }
}
