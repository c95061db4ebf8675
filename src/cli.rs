//! Command-line surface for a host migration binary.
//!
//! The host owns its binary, connection setup, and runner construction; this
//! module supplies the argument shape and command dispatch:
//!
//! ```no_run
//! use clap::Parser;
//! use rusqlite::Connection;
//! use stratum::cli::CliArgs;
//! use stratum::{MigrationRegistry, Runner};
//!
//! fn main() {
//!     let args = CliArgs::parse();
//!     let runner = Runner::new(MigrationRegistry::new());
//!     let mut conn = Connection::open("app.db").expect("failed to open database");
//!     if let Err(e) = stratum::cli::run(&runner, &mut conn, args) {
//!         eprintln!("Error: {e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::error::Error;
use crate::identity::MigrationIdentity;
use crate::runner::Runner;

#[derive(Debug, Parser)]
#[command(name = "migrate", about = "Apply and reverse schema migrations")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply pending migrations
    Up {
        /// Stop after this identity instead of running everything
        #[arg(long)]
        to: Option<String>,
    },
    /// Reverse the most recently applied migrations
    Down {
        /// How many migrations to reverse
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Show the current identity and pending count
    Status,
    /// Show the ledger of applied migrations
    History,
    /// List all registered migrations (no database required)
    List,
    /// Preview pending migrations without running them
    Preview,
}

/// Dispatch a parsed command against a runner and connection. Returns an
/// error — naming the failing identity and cause — on any unit failure, so
/// the host binary can exit non-zero.
pub fn run(runner: &Runner, conn: &mut Connection, args: CliArgs) -> Result<(), Error> {
    match args.command {
        Commands::Up { to } => {
            let report = match to {
                Some(raw) => {
                    let target: MigrationIdentity = raw.parse()?;
                    runner.apply_to(conn, target)?
                }
                None => runner.apply(conn)?,
            };
            let applied = report.units_run.len();
            let result = report.into_result();
            if applied == 0 && result.is_ok() {
                println!("Nothing to apply; database is up to date.");
            }
            for identity in result? {
                println!("Applied {identity}");
            }
            Ok(())
        }
        Commands::Down { count } => {
            let report = runner.rollback(conn, count)?;
            let reversed = report.units_run.len();
            let result = report.into_result();
            if reversed == 0 && result.is_ok() {
                println!("Nothing to reverse.");
            }
            for identity in result? {
                println!("Reversed {identity}");
            }
            Ok(())
        }
        Commands::Status => {
            match runner.current_identity(conn)? {
                Some(identity) => println!("Current identity: {identity}"),
                None => println!("Current identity: none (no migrations applied)"),
            }
            let pending = runner.preview_apply(conn)?;
            println!("Pending migrations: {}", pending.len());
            Ok(())
        }
        Commands::History => {
            let entries = runner.history(conn)?;
            if entries.is_empty() {
                println!("No migrations have been applied.");
            }
            for entry in entries {
                println!(
                    "{}  {}  applied {}",
                    entry.identity,
                    entry.name,
                    entry.applied_at.to_rfc3339()
                );
            }
            Ok(())
        }
        Commands::List => {
            let units = runner.registry().ordered_units();
            if units.is_empty() {
                println!("No migrations defined.");
            } else {
                println!("Defined migrations ({}):", units.len());
                for (identity, unit) in units {
                    println!("  {}: {}", identity, unit.name());
                    if let Some(description) = unit.description() {
                        println!("      {description}");
                    }
                }
            }
            Ok(())
        }
        Commands::Preview => {
            let pending = runner.preview_apply(conn)?;
            if pending.is_empty() {
                println!("Nothing to apply; database is up to date.");
            } else {
                println!("Would apply ({}):", pending.len());
                for (identity, unit) in pending {
                    println!("  {}: {}", identity, unit.name());
                }
            }
            Ok(())
        }
    }
}
