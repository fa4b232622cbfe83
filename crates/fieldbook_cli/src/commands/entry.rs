//! Daily entry commands.

use super::{describe, CliResult, Session};
use clap::{Args, Subcommand};
use fieldbook_model::{Clock, Entry, EntryDate, Expenses, SystemClock};

/// Entry subcommands.
#[derive(Subcommand)]
pub enum EntryCommand {
    /// Create or replace the entry for a day
    Add(AddArgs),

    /// List entries, oldest day first
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete the entry for a day
    Delete {
        /// Day as YYYY-MM-DD
        date: String,
    },
}

/// Fields of a new entry.
#[derive(Args)]
pub struct AddArgs {
    /// Day as YYYY-MM-DD
    pub date: String,

    /// Points earned
    #[arg(long, default_value_t = 0)]
    pub points: i64,

    /// Hours worked
    #[arg(long, default_value_t = 0.0)]
    pub hours: f64,

    /// Distance driven
    #[arg(long, default_value_t = 0.0)]
    pub mileage: f64,

    /// Mark the day as a day off
    #[arg(long)]
    pub day_off: bool,

    /// Free-text note
    #[arg(long, default_value = "")]
    pub note: String,

    /// Fuel expense
    #[arg(long, default_value_t = 0.0)]
    pub fuel: f64,

    /// Meals expense
    #[arg(long, default_value_t = 0.0)]
    pub meals: f64,

    /// Lodging expense
    #[arg(long, default_value_t = 0.0)]
    pub lodging: f64,

    /// Other expenses
    #[arg(long, default_value_t = 0.0)]
    pub other: f64,
}

/// Runs an entry subcommand.
pub async fn run(session: &Session, command: EntryCommand) -> CliResult {
    match command {
        EntryCommand::Add(args) => add(session, args).await,
        EntryCommand::List { format } => list(session, &format).await,
        EntryCommand::Delete { date } => {
            let date = EntryDate::parse(&date)?;
            let outcome = session.engine.delete_entry(&date).await?;
            println!("Deleted {date} ({})", describe(outcome));
            Ok(())
        }
    }
}

async fn add(session: &Session, args: AddArgs) -> CliResult {
    let date = EntryDate::parse(&args.date)?;
    let entry = Entry::new(date.clone(), SystemClock.now_millis())
        .with_points(args.points)
        .with_hours(args.hours)
        .with_mileage(args.mileage)
        .with_day_off(args.day_off)
        .with_note(args.note)
        .with_expenses(Expenses {
            fuel: args.fuel,
            meals: args.meals,
            lodging: args.lodging,
            other: args.other,
        });
    let outcome = session.engine.save_entry(entry).await?;
    println!("Saved {date} ({})", describe(outcome));
    Ok(())
}

async fn list(session: &Session, format: &str) -> CliResult {
    let entries = session.engine.entries().await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            if entries.is_empty() {
                println!("No entries.");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &Entry) {
    let mut line = format!(
        "{}  points {:>4}  hours {:>5.2}  mileage {:>7.1}  expenses {:>8.2}",
        entry.date,
        entry.points,
        entry.hours,
        entry.mileage,
        entry.expenses.total()
    );
    if entry.day_off {
        line.push_str("  [day off]");
    }
    if !entry.note.is_empty() {
        line.push_str("  ");
        line.push_str(&entry.note);
    }
    println!("{line}");
}
