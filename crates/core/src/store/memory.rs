//! In-memory customer store.
//!
//! Backs dry runs and tests. Every write bumps a store-wide revision counter and
//! lookups return the matching record with the highest revision, which mirrors
//! the ordering the Postgres store applies.
//!
//! [`MemoryCustomerStore::transaction`] groups writes into one unit of work. It
//! records the previous state of every row it touches and restores them unless
//! it is committed.

use std::collections::BTreeMap;

use thiserror::Error;

use super::CustomerStore;
use crate::types::{CompanyNumber, Customer, CustomerId, ExternalId};

/// Errors returned by [`MemoryCustomerStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryStoreError {
    /// `update` was called with a record that has never been persisted.
    #[error("customer has not been persisted")]
    NotPersisted,

    /// `create` was called with a record that already has an id.
    #[error("customer {0} is already persisted")]
    AlreadyPersisted(CustomerId),

    /// `update` was called with an id the store does not know.
    #[error("unknown customer {0}")]
    UnknownCustomer(CustomerId),

    /// Every customer id has been handed out.
    #[error("customer ids exhausted")]
    IdsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCustomer {
    customer: Customer,
    revision: u64,
}

/// A [`CustomerStore`] that keeps all records in process memory.
///
/// Writes made directly on the store are applied immediately. Use
/// [`Self::transaction`] for all-or-nothing semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCustomerStore {
    rows: BTreeMap<CustomerId, StoredCustomer>,
    last_id: i32,
    revision: u64,
}

impl MemoryCustomerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with a freshly assigned id, ignoring any id it carries.
    ///
    /// # Errors
    ///
    /// Returns `MemoryStoreError::IdsExhausted` once every `i32` id is taken.
    pub fn insert(&mut self, mut customer: Customer) -> Result<Customer, MemoryStoreError> {
        self.last_id = self
            .last_id
            .checked_add(1)
            .ok_or(MemoryStoreError::IdsExhausted)?;
        customer.id = Some(CustomerId::new(self.last_id));
        Ok(self.write(customer))
    }

    /// Start a unit of work. Its writes are rolled back when it is dropped
    /// without [`MemoryTransaction::commit`].
    pub fn transaction(&mut self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            last_id: self.last_id,
            revision: self.revision,
            undo: Vec::new(),
            committed: false,
            store: self,
        }
    }

    /// Get a record by id.
    #[must_use]
    pub fn get(&self, id: CustomerId) -> Option<&Customer> {
        self.rows.get(&id).map(|row| &row.customer)
    }

    /// All records in id order.
    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.rows.values().map(|row| &row.customer)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn write(&mut self, customer: Customer) -> Customer {
        let Some(id) = customer.id else {
            return customer;
        };
        self.revision += 1;
        self.rows.insert(
            id,
            StoredCustomer {
                customer: customer.clone(),
                revision: self.revision,
            },
        );
        customer
    }

    fn create_new(&mut self, customer: Customer) -> Result<Customer, MemoryStoreError> {
        if let Some(id) = customer.id {
            return Err(MemoryStoreError::AlreadyPersisted(id));
        }
        self.insert(customer)
    }

    fn update_existing(&mut self, customer: Customer) -> Result<Customer, MemoryStoreError> {
        let id = customer.id.ok_or(MemoryStoreError::NotPersisted)?;
        if !self.rows.contains_key(&id) {
            return Err(MemoryStoreError::UnknownCustomer(id));
        }
        Ok(self.write(customer))
    }

    fn latest_where(&self, predicate: impl Fn(&Customer) -> bool) -> Option<Customer> {
        self.rows
            .values()
            .filter(|row| predicate(&row.customer))
            .max_by_key(|row| row.revision)
            .map(|row| row.customer.clone())
    }
}

impl CustomerStore for MemoryCustomerStore {
    type Error = MemoryStoreError;

    async fn find_by_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        Ok(self.latest_where(|c| c.external_id.as_ref() == Some(external_id)))
    }

    async fn find_by_master_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        Ok(self.latest_where(|c| c.master_external_id.as_ref() == Some(external_id)))
    }

    async fn find_by_company_number(
        &mut self,
        company_number: &CompanyNumber,
    ) -> Result<Option<Customer>, Self::Error> {
        Ok(self.latest_where(|c| c.company_number() == Some(company_number)))
    }

    async fn create(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
        self.create_new(customer)
    }

    async fn update(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
        self.update_existing(customer)
    }
}

/// A unit of work on a [`MemoryCustomerStore`].
///
/// Only rows touched by the transaction are saved for rollback, so the cost of
/// a sync does not grow with the size of the store.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a mut MemoryCustomerStore,
    undo: Vec<(CustomerId, Option<StoredCustomer>)>,
    last_id: i32,
    revision: u64,
    committed: bool,
}

impl MemoryTransaction<'_> {
    /// Keep every write made through this transaction.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Discard every write made through this transaction.
    pub fn rollback(self) {
        drop(self);
    }

    fn remember(&mut self, id: CustomerId) {
        if self.undo.iter().any(|(touched, _)| *touched == id) {
            return;
        }
        let previous = self.store.rows.get(&id).cloned();
        self.undo.push((id, previous));
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (id, previous) in self.undo.drain(..).rev() {
            match previous {
                Some(row) => {
                    self.store.rows.insert(id, row);
                }
                None => {
                    self.store.rows.remove(&id);
                }
            }
        }
        self.store.last_id = self.last_id;
        self.store.revision = self.revision;
    }
}

impl CustomerStore for MemoryTransaction<'_> {
    type Error = MemoryStoreError;

    async fn find_by_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        self.store.find_by_external_id(external_id).await
    }

    async fn find_by_master_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        self.store.find_by_master_external_id(external_id).await
    }

    async fn find_by_company_number(
        &mut self,
        company_number: &CompanyNumber,
    ) -> Result<Option<Customer>, Self::Error> {
        self.store.find_by_company_number(company_number).await
    }

    async fn create(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
        let created = self.store.create_new(customer)?;
        if let Some(id) = created.id {
            self.undo.push((id, None));
        }
        Ok(created)
    }

    async fn update(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
        if let Some(id) = customer.id
            && self.store.rows.contains_key(&id)
        {
            self.remember(id);
        }
        self.store.update_existing(customer)
    }
}
