//! Resolves an external record to the stored records it refers to.
//!
//! Companies are matched by external id first and by company number second;
//! persons only by external id. Type and identity checks run here, before the
//! synchronizer mutates anything.

use tracing::debug;

use super::SyncError;
use crate::external::{CustomerKind, ExternalCustomer};
use crate::store::CustomerStore;
use crate::types::{CompanyNumber, Customer, CustomerType, ExternalId};

/// Outcome of matching one external record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Record that receives the full projection. `None` means a new record
    /// has to be created.
    pub primary: Option<Customer>,
    /// Records that get a partial update. Never contains the primary.
    pub duplicates: Vec<Customer>,
}

/// Find the primary target and the duplicates for `external`.
///
/// # Errors
///
/// Returns `SyncError::TypeConflict` if a matched record has the other
/// customer type, `SyncError::IdentityConflict` if a company found by number
/// is bound to another external id, and `SyncError::Store` on store failures.
pub async fn resolve<S>(
    store: &mut S,
    external: &ExternalCustomer,
) -> Result<Resolution, SyncError<S::Error>>
where
    S: CustomerStore,
{
    match &external.kind {
        CustomerKind::Company { company_number } => {
            resolve_company(store, &external.external_id, company_number).await
        }
        CustomerKind::Person { .. } => resolve_person(store, &external.external_id).await,
    }
}

async fn resolve_company<S>(
    store: &mut S,
    external_id: &ExternalId,
    company_number: &CompanyNumber,
) -> Result<Resolution, SyncError<S::Error>>
where
    S: CustomerStore,
{
    if let Some(existing) = store.find_by_external_id(external_id).await? {
        ensure_type::<S::Error>(external_id, &existing, CustomerType::Company)?;

        let mut duplicates = Vec::new();
        if let Some(diverged) = store.find_by_master_external_id(external_id).await?
            && diverged.id != existing.id
        {
            debug!(duplicate = ?diverged.id, "Found diverged record by master external id");
            duplicates.push(diverged);
        }

        if existing.company_number() == Some(company_number) {
            return Ok(Resolution {
                primary: Some(existing),
                duplicates,
            });
        }

        // Same external id but the company behind it changed: keep the old
        // record as a duplicate and start a new primary. The lookup also locks
        // the new number in stores that lock on read.
        if let Some(numbered) = store.find_by_company_number(company_number).await? {
            ensure_unbound::<S::Error>(external_id, company_number, &numbered)?;
        }
        debug!(
            duplicate = ?existing.id,
            stored_company_number = ?existing.company_number(),
            "Company number changed for external id"
        );
        duplicates.push(existing);
        return Ok(Resolution {
            primary: None,
            duplicates,
        });
    }

    if let Some(mut claimed) = store.find_by_company_number(company_number).await? {
        ensure_type::<S::Error>(external_id, &claimed, CustomerType::Company)?;
        ensure_unbound::<S::Error>(external_id, company_number, &claimed)?;

        debug!(primary = ?claimed.id, "Claiming company by company number");
        claimed.external_id = Some(external_id.clone());
        claimed.master_external_id = Some(external_id.clone());
        return Ok(Resolution {
            primary: Some(claimed),
            duplicates: vec![Customer::seeded(external_id)],
        });
    }

    Ok(Resolution::default())
}

async fn resolve_person<S>(
    store: &mut S,
    external_id: &ExternalId,
) -> Result<Resolution, SyncError<S::Error>>
where
    S: CustomerStore,
{
    let existing = store.find_by_external_id(external_id).await?;
    if let Some(customer) = &existing {
        ensure_type::<S::Error>(external_id, customer, CustomerType::Person)?;
    }

    Ok(Resolution {
        primary: existing,
        duplicates: Vec::new(),
    })
}

/// A company record found by number may only be taken over by the external id
/// it is already bound to, if any.
fn ensure_unbound<E>(
    external_id: &ExternalId,
    company_number: &CompanyNumber,
    customer: &Customer,
) -> Result<(), SyncError<E>> {
    match &customer.external_id {
        Some(bound) if bound != external_id => Err(SyncError::IdentityConflict {
            company_number: company_number.clone(),
            external_id: external_id.clone(),
            existing_external_id: bound.clone(),
        }),
        _ => Ok(()),
    }
}

fn ensure_type<E>(
    external_id: &ExternalId,
    customer: &Customer,
    expected: CustomerType,
) -> Result<(), SyncError<E>> {
    let found = customer.customer_type();
    if found == Some(expected) {
        return Ok(());
    }
    Err(SyncError::TypeConflict {
        external_id: external_id.clone(),
        expected,
        found,
    })
}
