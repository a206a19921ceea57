//! Customer Sync Worker - applies external customer records to `PostgreSQL`.
//!
//! Reads one JSON record per line from `CUSTOMER_SYNC_INPUT` (or stdin when
//! unset) and syncs each record in its own transaction. Conflicting and
//! undecodable records are logged and skipped. The worker exits when the
//! input ends, with status 1 if the database or the input fails.
//!
//! Migrations are NOT run here. Run them via:
//! ```bash
//! cargo run -p customer-sync-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use tokio::io::{AsyncBufRead, BufReader};

use customer_sync_worker::config::WorkerConfig;
use customer_sync_worker::db;
use customer_sync_worker::listener::{PgBackend, SyncListener};
use customer_sync_worker::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = telemetry::init_sentry(&config.sentry);
    telemetry::init_tracing(
        config.log_format,
        "customer_sync_worker=info,customer_sync_core=info",
    );

    let status = exit_status(run(config).await);

    // Flushes queued Sentry events, including the failure above.
    drop(sentry_guard);
    ExitCode::from(status)
}

fn exit_status(result: Result<(), Box<dyn std::error::Error>>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Worker failed: {e}");
            1
        }
    }
}

async fn run(config: WorkerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database pool created");

    let input: Box<dyn AsyncBufRead + Unpin> = match &config.input {
        Some(path) => {
            tracing::info!(path = %path.display(), "Reading customer records from file");
            Box::new(BufReader::new(tokio::fs::File::open(path).await?))
        }
        None => {
            tracing::info!("Reading customer records from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let mut listener = SyncListener::new(PgBackend::new(pool));
    let summary = listener.run(input).await?;

    tracing::info!(
        received = summary.received,
        created = summary.created,
        updated = summary.updated,
        conflicts = summary.conflicts,
        invalid = summary.invalid,
        "Input exhausted"
    );
    Ok(())
}
