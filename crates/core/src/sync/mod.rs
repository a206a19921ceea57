//! Synchronization of external customer records into the customer store.
//!
//! [`CustomerSync::sync`] runs one record through three steps:
//!
//! 1. [`matcher::resolve`] finds the primary target and any duplicates, and
//!    rejects records that conflict with what is stored.
//! 2. [`projector`] copies the external fields: everything onto the primary,
//!    only the name onto duplicates.
//! 3. Duplicates and then the primary are saved through the store, each as a
//!    create or an update depending on whether it already has an id.
//!
//! Conflicts are detected before anything is written. Atomicity of the writes
//! is the store's responsibility.

pub mod matcher;
pub mod projector;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::external::ExternalCustomer;
use crate::store::CustomerStore;
use crate::types::{CompanyNumber, Customer, CustomerType, ExternalId};

pub use matcher::Resolution;

/// Errors that abort a sync.
#[derive(Debug, Error)]
pub enum SyncError<E> {
    /// A matched record has the other customer type.
    #[error(
        "existing customer for external id {external_id} is not a {expected} (found {})",
        .found.map_or("untyped", CustomerType::as_str)
    )]
    TypeConflict {
        external_id: ExternalId,
        expected: CustomerType,
        found: Option<CustomerType>,
    },

    /// A company found by company number is bound to another external id.
    #[error(
        "existing customer for company number {company_number} is bound to external id {existing_external_id}, not {external_id}"
    )]
    IdentityConflict {
        company_number: CompanyNumber,
        external_id: ExternalId,
        existing_external_id: ExternalId,
    },

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] E),
}

impl<E> SyncError<E> {
    /// Returns true for the non-retryable conflict kinds.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::TypeConflict { .. } | Self::IdentityConflict { .. })
    }
}

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// True if the primary record was created, false if an existing one was updated.
    pub created: bool,
    /// The primary record as persisted.
    pub customer: Customer,
    /// Duplicates as persisted, in save order.
    pub duplicates: Vec<Customer>,
}

/// Synchronizes external records into a [`CustomerStore`].
#[derive(Debug)]
pub struct CustomerSync<S> {
    store: S,
}

impl<S> CustomerSync<S>
where
    S: CustomerStore,
{
    /// Create a synchronizer over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give back the underlying store, e.g. to commit its transaction.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Sync one external record.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::TypeConflict` or `SyncError::IdentityConflict`
    /// without having written anything, or `SyncError::Store` if the store
    /// fails, in which case earlier writes of this call may need rolling back.
    #[instrument(skip_all, fields(external_id = %external.external_id, company = external.is_company()))]
    pub async fn sync(
        &mut self,
        external: ExternalCustomer,
    ) -> Result<SyncOutcome, SyncError<S::Error>> {
        let Resolution {
            primary,
            duplicates,
        } = matcher::resolve(&mut self.store, &external).await?;

        let created = primary.is_none();
        let mut primary = primary.unwrap_or_else(|| Customer::seeded(&external.external_id));
        let name = external.name.clone();
        projector::project_full(&mut primary, external);

        let mut saved_duplicates = Vec::with_capacity(duplicates.len());
        for mut duplicate in duplicates {
            projector::project_partial(&mut duplicate, name.as_deref());
            saved_duplicates.push(self.save(duplicate).await?);
        }

        let customer = self.save(primary).await?;
        debug!(
            customer_id = ?customer.id,
            created,
            duplicates = saved_duplicates.len(),
            "Customer synced"
        );

        Ok(SyncOutcome {
            created,
            customer,
            duplicates: saved_duplicates,
        })
    }

    async fn save(&mut self, customer: Customer) -> Result<Customer, S::Error> {
        if customer.is_persisted() {
            self.store.update(customer).await
        } else {
            self.store.create(customer).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::external::CustomerKind;
    use crate::store::{MemoryCustomerStore, MemoryStoreError};
    use crate::types::{Address, CustomerId, CustomerProfile, ShoppingList};

    /// Passes everything through to `inner` but fails every write after the
    /// first `writes_left`.
    struct FailingStore<S> {
        inner: S,
        writes_left: usize,
    }

    impl<S> FailingStore<S> {
        fn take_write(&mut self) -> Result<(), MemoryStoreError> {
            self.writes_left = self
                .writes_left
                .checked_sub(1)
                .ok_or(MemoryStoreError::IdsExhausted)?;
            Ok(())
        }
    }

    impl<S> CustomerStore for FailingStore<S>
    where
        S: CustomerStore<Error = MemoryStoreError> + Send,
    {
        type Error = MemoryStoreError;

        async fn find_by_external_id(
            &mut self,
            external_id: &ExternalId,
        ) -> Result<Option<Customer>, Self::Error> {
            self.inner.find_by_external_id(external_id).await
        }

        async fn find_by_master_external_id(
            &mut self,
            external_id: &ExternalId,
        ) -> Result<Option<Customer>, Self::Error> {
            self.inner.find_by_master_external_id(external_id).await
        }

        async fn find_by_company_number(
            &mut self,
            company_number: &CompanyNumber,
        ) -> Result<Option<Customer>, Self::Error> {
            self.inner.find_by_company_number(company_number).await
        }

        async fn create(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
            self.take_write()?;
            self.inner.create(customer).await
        }

        async fn update(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
            self.take_write()?;
            self.inner.update(customer).await
        }
    }

    fn id(s: &str) -> ExternalId {
        ExternalId::parse(s).unwrap()
    }

    fn number(s: &str) -> CompanyNumber {
        CompanyNumber::parse(s).unwrap()
    }

    fn company(external: &str, cn: &str, name: &str) -> ExternalCustomer {
        ExternalCustomer {
            external_id: id(external),
            name: Some(name.to_owned()),
            preferred_store: Some("Nordstan".to_owned()),
            address: Some(Address {
                street: Some("Main 1".to_owned()),
                city: Some("Gothenburg".to_owned()),
                postal_code: Some("41101".to_owned()),
            }),
            shopping_lists: vec![ShoppingList::new(vec!["lumber".to_owned()])],
            kind: CustomerKind::Company {
                company_number: number(cn),
            },
        }
    }

    fn person(external: &str, name: &str, bonus: Option<i32>) -> ExternalCustomer {
        ExternalCustomer {
            external_id: id(external),
            name: Some(name.to_owned()),
            preferred_store: None,
            address: None,
            shopping_lists: vec![ShoppingList::new(vec!["milk".to_owned()])],
            kind: CustomerKind::Person {
                bonus_points_balance: bonus,
            },
        }
    }

    fn stored_company(external: Option<&str>, master: Option<&str>, cn: &str) -> Customer {
        Customer {
            external_id: external.map(id),
            master_external_id: master.map(id),
            name: Some("Stored".to_owned()),
            profile: Some(CustomerProfile::Company {
                company_number: number(cn),
            }),
            ..Customer::default()
        }
    }

    async fn sync(
        store: &mut MemoryCustomerStore,
        external: ExternalCustomer,
    ) -> Result<SyncOutcome, SyncError<MemoryStoreError>> {
        CustomerSync::new(store).sync(external).await
    }

    #[tokio::test]
    async fn test_new_company_is_created() {
        let mut store = MemoryCustomerStore::new();

        let outcome = sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();

        assert!(outcome.created);
        assert!(outcome.duplicates.is_empty());
        assert_eq!(store.len(), 1);
        let stored = store.get(CustomerId::new(1)).unwrap();
        assert_eq!(stored.external_id, Some(id("E1")));
        assert_eq!(stored.master_external_id, Some(id("E1")));
        assert_eq!(stored.company_number(), Some(&number("C1")));
        assert_eq!(stored.customer_type(), Some(CustomerType::Company));
        assert_eq!(stored.name.as_deref(), Some("Acme"));
        assert_eq!(stored.shopping_lists.len(), 1);
    }

    #[tokio::test]
    async fn test_new_person_is_created() {
        let mut store = MemoryCustomerStore::new();

        let outcome = sync(&mut store, person("P1", "Jane", Some(50)))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(store.len(), 1);
        let stored = store.get(CustomerId::new(1)).unwrap();
        assert_eq!(stored.customer_type(), Some(CustomerType::Person));
        assert_eq!(stored.bonus_points_balance(), Some(50));
        assert_eq!(stored.company_number(), None);
        assert_eq!(stored.master_external_id, Some(id("P1")));
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        for record in [company("E1", "C1", "Acme"), person("P1", "Jane", Some(5))] {
            let mut store = MemoryCustomerStore::new();

            let first = sync(&mut store, record.clone()).await.unwrap();
            let after_first: Vec<Customer> = store.customers().cloned().collect();
            let second = sync(&mut store, record).await.unwrap();
            let after_second: Vec<Customer> = store.customers().cloned().collect();

            assert!(first.created);
            assert!(!second.created);
            assert!(second.duplicates.is_empty());
            assert_eq!(after_first, after_second);
        }
    }

    #[tokio::test]
    async fn test_existing_person_is_updated() {
        let mut store = MemoryCustomerStore::new();
        sync(&mut store, person("P1", "Jane", Some(5))).await.unwrap();

        let outcome = sync(&mut store, person("P1", "Jane Doe", None))
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(store.len(), 1);
        let stored = store.get(CustomerId::new(1)).unwrap();
        assert_eq!(stored.name.as_deref(), Some("Jane Doe"));
        assert_eq!(stored.bonus_points_balance(), None);
    }

    #[tokio::test]
    async fn test_identity_conflict_leaves_store_untouched() {
        let mut store = MemoryCustomerStore::new();
        store
            .insert(stored_company(Some("E1"), Some("E1"), "C1"))
            .unwrap();
        let before = store.clone();

        let err = sync(&mut store, company("E2", "C1", "Acme"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::IdentityConflict { .. }));
        assert!(err.is_conflict());
        assert_eq!(store, before);
    }

    #[tokio::test]
    async fn test_type_conflict_for_company_on_person() {
        let mut store = MemoryCustomerStore::new();
        sync(&mut store, person("E1", "Jane", None)).await.unwrap();
        let before = store.clone();

        let err = sync(&mut store, company("E1", "C1", "Acme"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::TypeConflict {
                expected: CustomerType::Company,
                found: Some(CustomerType::Person),
                ..
            }
        ));
        assert_eq!(store, before);
    }

    #[tokio::test]
    async fn test_type_conflict_for_person_on_company() {
        let mut store = MemoryCustomerStore::new();
        sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();

        let err = sync(&mut store, person("E1", "Jane", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::TypeConflict {
                expected: CustomerType::Person,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "existing customer for external id E1 is not a person (found company)"
        );
    }

    #[tokio::test]
    async fn test_changed_company_number_creates_new_primary() {
        let mut store = MemoryCustomerStore::new();
        let old = store
            .insert(stored_company(Some("E1"), Some("E1"), "C1"))
            .unwrap();

        let outcome = sync(&mut store, company("E1", "C2", "Acme2")).await.unwrap();

        assert!(outcome.created);
        assert_eq!(store.len(), 2);

        let demoted = store.get(old.id.unwrap()).unwrap();
        assert_eq!(demoted.name.as_deref(), Some("Acme2"));
        assert_eq!(demoted.company_number(), Some(&number("C1")));
        assert_eq!(demoted.preferred_store, None);
        assert!(demoted.shopping_lists.is_empty());

        let primary = store.get(outcome.customer.id.unwrap()).unwrap();
        assert_ne!(primary.id, old.id);
        assert_eq!(primary.company_number(), Some(&number("C2")));
        assert_eq!(primary.external_id, Some(id("E1")));
        assert_eq!(primary.master_external_id, Some(id("E1")));
        assert_eq!(primary.name.as_deref(), Some("Acme2"));
    }

    #[tokio::test]
    async fn test_claim_by_company_number_adds_fresh_duplicate() {
        let mut store = MemoryCustomerStore::new();
        let claimed = store.insert(stored_company(None, None, "C1")).unwrap();

        let outcome = sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.customer.id, claimed.id);
        assert_eq!(store.len(), 2);

        let primary = store.get(claimed.id.unwrap()).unwrap();
        assert_eq!(primary.external_id, Some(id("E1")));
        assert_eq!(primary.master_external_id, Some(id("E1")));
        assert_eq!(primary.name.as_deref(), Some("Acme"));
        assert_eq!(primary.preferred_store.as_deref(), Some("Nordstan"));

        assert_eq!(outcome.duplicates.len(), 1);
        let duplicate = &outcome.duplicates[0];
        assert_ne!(duplicate.id, claimed.id);
        assert_eq!(duplicate.external_id, Some(id("E1")));
        assert_eq!(duplicate.master_external_id, Some(id("E1")));
        assert_eq!(duplicate.name.as_deref(), Some("Acme"));
        assert_eq!(duplicate.profile, None);
        assert!(duplicate.shopping_lists.is_empty());
    }

    #[tokio::test]
    async fn test_claimed_company_is_primary_on_next_sync() {
        let mut store = MemoryCustomerStore::new();
        let claimed = store.insert(stored_company(None, None, "C1")).unwrap();
        sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();
        let before: Vec<Customer> = store.customers().cloned().collect();

        let outcome = sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.customer.id, claimed.id);
        assert!(outcome.duplicates.is_empty());
        assert_eq!(store.customers().cloned().collect::<Vec<_>>(), before);
    }

    #[tokio::test]
    async fn test_diverged_master_gets_name_only() {
        let mut store = MemoryCustomerStore::new();
        let primary = store
            .insert(stored_company(Some("E1"), Some("E0"), "C1"))
            .unwrap();
        let diverged = store
            .insert(Customer {
                preferred_store: Some("Kept".to_owned()),
                ..stored_company(Some("E7"), Some("E1"), "C7")
            })
            .unwrap();

        let outcome = sync(&mut store, company("E1", "C1", "Acme")).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.customer.id, primary.id);
        let diverged = store.get(diverged.id.unwrap()).unwrap();
        assert_eq!(diverged.name.as_deref(), Some("Acme"));
        assert_eq!(diverged.preferred_store.as_deref(), Some("Kept"));
        assert_eq!(diverged.external_id, Some(id("E7")));
        assert_eq!(diverged.company_number(), Some(&number("C7")));
    }

    #[tokio::test]
    async fn test_failed_primary_save_rolls_back_duplicate_writes() {
        let mut store = MemoryCustomerStore::new();
        store
            .insert(stored_company(Some("E1"), Some("E0"), "C1"))
            .unwrap();
        store
            .insert(stored_company(Some("E7"), Some("E1"), "C7"))
            .unwrap();
        let before = store.clone();

        let mut sync = CustomerSync::new(FailingStore {
            inner: store.transaction(),
            writes_left: 1,
        });
        let err = sync.sync(company("E1", "C1", "Acme")).await.unwrap_err();
        drop(sync);

        assert!(matches!(err, SyncError::Store(MemoryStoreError::IdsExhausted)));
        assert!(!err.is_conflict());
        assert_eq!(store, before);
    }

    #[tokio::test]
    async fn test_external_id_is_matched_exactly() {
        let mut store = MemoryCustomerStore::new();
        sync(&mut store, company("E1", "C1", "First")).await.unwrap();

        let outcome = sync(&mut store, company(" E1", "C9", "Second"))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(store.len(), 2);
        let first = store.get(CustomerId::new(1)).unwrap();
        assert_eq!(first.external_id, Some(id("E1")));
        assert_eq!(first.name.as_deref(), Some("First"));
        assert_eq!(first.company_number(), Some(&number("C1")));
    }

    #[test]
    fn test_store_errors_are_not_conflicts() {
        let err = SyncError::<MemoryStoreError>::from(MemoryStoreError::NotPersisted);

        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "store error: customer has not been persisted");
    }

    #[tokio::test]
    async fn test_into_inner_returns_store_with_writes() {
        let mut sync = CustomerSync::new(MemoryCustomerStore::new());
        sync.sync(company("E1", "C1", "Acme")).await.unwrap();
        assert_eq!(sync.store().len(), 1);

        let store = sync.into_inner();

        assert_eq!(store.len(), 1);
    }
}
