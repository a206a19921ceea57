//! Subcommand implementations.

pub mod customer;
pub mod migrate;
pub mod sync;

use sqlx::PgPool;
use thiserror::Error;

use customer_sync_worker::config::{ConfigError, DatabaseConfig};
use customer_sync_worker::db::{self, RepositoryError};
use customer_sync_worker::listener::ListenerError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository query failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The sync listener stopped.
    #[error("Sync failed: {0}")]
    Listener(#[from] ListenerError),

    /// Input file could not be opened.
    #[error("Failed to open {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid command argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Load database settings and connect.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let config = DatabaseConfig::from_env()?;
    tracing::info!("Connecting to customer sync database...");
    Ok(db::create_pool(&config).await?)
}
