//! Customer Sync Worker library.
//!
//! Everything the worker binary needs, as a library so the CLI and the
//! integration tests can reuse it:
//!
//! - [`config`] - Environment configuration
//! - [`db`] - `PostgreSQL` store, repository and migrations
//! - [`listener`] - JSON-lines ingestion into a sync backend
//! - [`telemetry`] - Sentry and tracing setup

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod listener;
pub mod telemetry;
