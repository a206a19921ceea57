//! Core types for customer sync.
//!
//! This module provides type-safe wrappers for identity keys and the internal
//! customer record.

pub mod customer;
pub mod id;
pub mod identity;

pub use customer::{Address, Customer, CustomerProfile, CustomerType, ShoppingList};
pub use id::*;
pub use identity::{CompanyNumber, ExternalId, KeyError};
