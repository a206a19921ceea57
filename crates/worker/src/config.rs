//! Worker configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CUSTOMER_SYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `CUSTOMER_SYNC_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `CUSTOMER_SYNC_INPUT` - JSON-lines file to read records from (default: stdin)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for text

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Database connection settings
    pub database: DatabaseConfig,
    /// JSON-lines input file; stdin when `None`
    pub input: Option<PathBuf>,
    /// Sentry error tracking settings
    pub sentry: SentryConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// `PostgreSQL` connection settings.
///
/// `Debug` never prints the URL, which carries the password.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub url: SecretString,
    /// Upper bound of the connection pool
    pub max_connections: u32,
}

/// Sentry error tracking settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Sentry DSN; Sentry is disabled when `None`
    pub dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub traces_sample_rate: f32,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            input: get_optional_env("CUSTOMER_SYNC_INPUT").map(PathBuf::from),
            sentry: SentryConfig::from_env()?,
            log_format: LogFormat::from_env(),
        })
    }
}

impl DatabaseConfig {
    /// Load database settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or the pool size
    /// is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = get_database_url("CUSTOMER_SYNC_DATABASE_URL")?;
        let max_connections =
            parse_or_default("CUSTOMER_SYNC_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CUSTOMER_SYNC_DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            url,
            max_connections,
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }
}

impl LogFormat {
    fn from_env() -> Self {
        get_optional_env("LOG_FORMAT").map_or(Self::Text, |value| Self::parse(&value))
    }

    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, get_optional_env(key).as_deref(), default)
}

fn parse_value<T>(key: &str, value: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a sample rate and check it lies within 0.0 and 1.0.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    check_rate(key, parse_or_default(key, default)?)
}

fn check_rate(key: &str, rate: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
}
