//! Persistence boundary of the sync engine.
//!
//! The engine only ever talks to storage through [`CustomerStore`]. An
//! implementation is expected to scope everything it does to a single unit of
//! work (one database transaction, for instance) so that all writes of one
//! sync either land together or not at all.

pub mod memory;

use std::future::Future;

use crate::types::{CompanyNumber, Customer, ExternalId};

pub use memory::{MemoryCustomerStore, MemoryStoreError, MemoryTransaction};

/// Lookup and upsert of internal customer records.
///
/// When several records share the key being looked up, the most recently
/// written one is returned.
pub trait CustomerStore {
    /// Storage failure. Passed through the engine unchanged.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Find the customer currently bound to `external_id`.
    fn find_by_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send;

    /// Find the customer whose master external id is `external_id`.
    fn find_by_master_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send;

    /// Find the company registered under `company_number`.
    fn find_by_company_number(
        &mut self,
        company_number: &CompanyNumber,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send;

    /// Persist a new customer and return it with its assigned id.
    fn create(
        &mut self,
        customer: Customer,
    ) -> impl Future<Output = Result<Customer, Self::Error>> + Send;

    /// Overwrite an already persisted customer.
    fn update(
        &mut self,
        customer: Customer,
    ) -> impl Future<Output = Result<Customer, Self::Error>> + Send;
}

impl<S> CustomerStore for &mut S
where
    S: CustomerStore + Send,
{
    type Error = S::Error;

    fn find_by_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send {
        (**self).find_by_external_id(external_id)
    }

    fn find_by_master_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send {
        (**self).find_by_master_external_id(external_id)
    }

    fn find_by_company_number(
        &mut self,
        company_number: &CompanyNumber,
    ) -> impl Future<Output = Result<Option<Customer>, Self::Error>> + Send {
        (**self).find_by_company_number(company_number)
    }

    fn create(
        &mut self,
        customer: Customer,
    ) -> impl Future<Output = Result<Customer, Self::Error>> + Send {
        (**self).create(customer)
    }

    fn update(
        &mut self,
        customer: Customer,
    ) -> impl Future<Output = Result<Customer, Self::Error>> + Send {
        (**self).update(customer)
    }
}
