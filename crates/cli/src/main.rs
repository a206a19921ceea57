//! Customer Sync CLI - migrations, dry runs and lookups.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cs-cli migrate
//!
//! # Sync a JSON-lines file into the database
//! cs-cli sync customers.jsonl
//!
//! # Sync into an in-memory store and log the resulting records
//! cs-cli sync customers.jsonl --dry-run
//!
//! # Show the customer bound to an external id
//! cs-cli customer show E1
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Feed a file of external records through the sync listener
//! - `customer show` - Print a stored customer as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use customer_sync_worker::config::LogFormat;
use customer_sync_worker::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(author, version, about = "Customer sync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Sync external customer records from a JSON-lines file
    Sync {
        /// File with one JSON record per line
        file: PathBuf,

        /// Sync into an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect stored customers
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Show the customer currently bound to an external id
    Show {
        /// External id to look up
        external_id: String,
    },
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing(
        LogFormat::Text,
        "customer_sync_cli=info,customer_sync_worker=info,customer_sync_core=info",
    );

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync { file, dry_run } => {
            if dry_run {
                commands::sync::dry_run(&file).await?;
            } else {
                commands::sync::apply(&file).await?;
            }
        }
        Commands::Customer { action } => match action {
            CustomerAction::Show { external_id } => {
                commands::customer::show(&external_id).await?;
            }
        },
    }
    Ok(())
}
