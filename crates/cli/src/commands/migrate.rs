//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cs-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CUSTOMER_SYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/worker/migrations/` and are embedded at build time.

use customer_sync_worker::db::MIGRATOR;

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running customer sync migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Customer sync migrations complete!");
    Ok(())
}
