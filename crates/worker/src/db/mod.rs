//! Database operations for the customer sync `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `customer_sync.customer` - Internal customer records
//! - `customer_sync.shopping_list` - Shopping lists owned by a customer
//!
//! # Migrations
//!
//! Migrations are stored in `crates/worker/migrations/`, embedded in
//! [`MIGRATOR`] and run via:
//! ```bash
//! cargo run -p customer-sync-cli -- migrate
//! ```

pub mod customers;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub use customers::{CustomerRepository, PgCustomerStore};

/// Embedded schema migrations for the customer sync database.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// The record is in the wrong state for the requested write.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.url.expose_secret())
        .await
}
