//! Copies external fields onto internal records.

use crate::external::{CustomerKind, ExternalCustomer};
use crate::types::{Customer, CustomerProfile};

/// Full projection onto the primary target.
///
/// Consumes the external record: its shopping lists move into `customer` and
/// replace whatever lists the customer held before.
pub fn project_full(customer: &mut Customer, external: ExternalCustomer) {
    customer.name = external.name;
    customer.preferred_store = external.preferred_store;
    customer.address = external.address;
    customer.shopping_lists = external.shopping_lists;
    customer.profile = Some(match external.kind {
        CustomerKind::Company { company_number } => CustomerProfile::Company { company_number },
        CustomerKind::Person {
            bonus_points_balance,
        } => CustomerProfile::Person {
            bonus_points_balance,
        },
    });
}

/// Partial projection onto a duplicate: only the name is copied.
pub fn project_partial(customer: &mut Customer, name: Option<&str>) {
    customer.name = name.map(str::to_owned);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Address, CompanyNumber, CustomerType, ExternalId, ShoppingList};

    fn external(kind: CustomerKind) -> ExternalCustomer {
        ExternalCustomer {
            external_id: ExternalId::parse("E1").unwrap(),
            name: Some("Acme".to_owned()),
            preferred_store: Some("Nordstan".to_owned()),
            address: Some(Address {
                street: Some("Main 1".to_owned()),
                city: Some("Gothenburg".to_owned()),
                postal_code: Some("41101".to_owned()),
            }),
            shopping_lists: vec![ShoppingList::new(vec!["milk".to_owned()])],
            kind,
        }
    }

    fn existing() -> Customer {
        Customer {
            name: Some("Old".to_owned()),
            preferred_store: Some("Old store".to_owned()),
            shopping_lists: vec![
                ShoppingList::new(vec!["bread".to_owned()]),
                ShoppingList::new(vec!["eggs".to_owned()]),
            ],
            ..Customer::seeded(&ExternalId::parse("E1").unwrap())
        }
    }

    #[test]
    fn test_full_projection_company() {
        let mut customer = existing();

        project_full(
            &mut customer,
            external(CustomerKind::Company {
                company_number: CompanyNumber::parse("C1").unwrap(),
            }),
        );

        assert_eq!(customer.name.as_deref(), Some("Acme"));
        assert_eq!(customer.preferred_store.as_deref(), Some("Nordstan"));
        assert_eq!(
            customer.address.as_ref().unwrap().city.as_deref(),
            Some("Gothenburg")
        );
        assert_eq!(customer.customer_type(), Some(CustomerType::Company));
        assert_eq!(customer.company_number().unwrap().as_str(), "C1");
        assert_eq!(customer.bonus_points_balance(), None);
    }

    #[test]
    fn test_full_projection_replaces_shopping_lists() {
        let mut customer = existing();

        project_full(
            &mut customer,
            external(CustomerKind::Person {
                bonus_points_balance: None,
            }),
        );

        assert_eq!(
            customer.shopping_lists,
            vec![ShoppingList::new(vec!["milk".to_owned()])]
        );
    }

    #[test]
    fn test_full_projection_person() {
        let mut customer = existing();

        project_full(
            &mut customer,
            external(CustomerKind::Person {
                bonus_points_balance: Some(300),
            }),
        );

        assert_eq!(customer.customer_type(), Some(CustomerType::Person));
        assert_eq!(customer.bonus_points_balance(), Some(300));
        assert_eq!(customer.company_number(), None);
    }

    #[test]
    fn test_full_projection_keeps_identity_fields() {
        let mut customer = existing();
        let before = customer.clone();

        project_full(
            &mut customer,
            external(CustomerKind::Person {
                bonus_points_balance: None,
            }),
        );

        assert_eq!(customer.id, before.id);
        assert_eq!(customer.external_id, before.external_id);
        assert_eq!(customer.master_external_id, before.master_external_id);
    }

    #[test]
    fn test_partial_projection_only_touches_name() {
        let mut customer = existing();
        let before = customer.clone();

        project_partial(&mut customer, Some("Acme"));

        assert_eq!(customer.name.as_deref(), Some("Acme"));
        assert_eq!(
            Customer {
                name: before.name.clone(),
                ..customer
            },
            before
        );
    }

    #[test]
    fn test_partial_projection_copies_absent_name() {
        let mut customer = existing();

        project_partial(&mut customer, None);

        assert_eq!(customer.name, None);
    }
}
