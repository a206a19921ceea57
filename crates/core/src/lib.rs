//! Customer Sync Core - matching engine and shared types.
//!
//! This crate holds everything about customer sync that does not do I/O:
//! - `worker` - Consumes external records and syncs them into Postgres
//! - `cli` - Command-line tools for migrations, dry runs and lookups
//!
//! # Architecture
//!
//! Storage is reached only through the [`store::CustomerStore`] trait. The
//! worker crate implements it on top of a Postgres transaction; the in-memory
//! [`store::MemoryCustomerStore`] backs dry runs and tests.
//!
//! # Modules
//!
//! - [`types`] - Customer record, identity keys and type-safe IDs
//! - [`external`] - Decoding and validation of external records
//! - [`store`] - Persistence boundary and the in-memory store
//! - [`sync`] - Matcher, field projector and synchronizer

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod external;
pub mod store;
pub mod sync;
pub mod types;

pub use external::{CustomerKind, ExternalCustomer, ExternalCustomerError};
pub use store::{CustomerStore, MemoryCustomerStore, MemoryStoreError, MemoryTransaction};
pub use sync::{CustomerSync, SyncError, SyncOutcome};
pub use types::*;
