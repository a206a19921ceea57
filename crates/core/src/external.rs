//! External customer records as delivered by the source system.
//!
//! Records arrive as JSON objects with camelCase keys. Unknown keys are
//! ignored and absent optional keys decode to `None` or an empty list. A
//! record is a company exactly when it carries a `companyNumber`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, CompanyNumber, ExternalId, KeyError, ShoppingList};

/// Errors that can occur when decoding an external record.
#[derive(Debug, Error)]
pub enum ExternalCustomerError {
    /// The payload is not valid JSON for an external record.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The record has no external id.
    #[error("missing externalId")]
    MissingExternalId,

    /// The external id is present but invalid.
    #[error("invalid externalId: {0}")]
    InvalidExternalId(#[source] KeyError),

    /// The company number is present but invalid.
    #[error("invalid companyNumber: {0}")]
    InvalidCompanyNumber(#[source] KeyError),
}

/// Wire format of an external customer record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCustomerDto {
    pub external_id: Option<String>,
    pub company_number: Option<String>,
    pub name: Option<String>,
    pub preferred_store: Option<String>,
    #[serde(alias = "postalAddress")]
    pub address: Option<Address>,
    pub bonus_points_balance: Option<i32>,
    pub shopping_lists: Option<Vec<ShoppingListDto>>,
}

/// Wire format of a shopping list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShoppingListDto {
    pub products: Option<Vec<String>>,
}

/// Company or person specific part of an external record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerKind {
    Company { company_number: CompanyNumber },
    Person { bonus_points_balance: Option<i32> },
}

/// A validated external customer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCustomer {
    pub external_id: ExternalId,
    pub name: Option<String>,
    pub preferred_store: Option<String>,
    pub address: Option<Address>,
    pub shopping_lists: Vec<ShoppingList>,
    pub kind: CustomerKind,
}

impl ExternalCustomer {
    /// Decode and validate a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `ExternalCustomerError::Malformed` if the payload is not a JSON
    /// record, or a validation error if the identity keys are missing or blank.
    pub fn from_json(payload: &str) -> Result<Self, ExternalCustomerError> {
        let dto: ExternalCustomerDto = serde_json::from_str(payload)?;
        dto.try_into()
    }

    #[must_use]
    pub const fn is_company(&self) -> bool {
        matches!(self.kind, CustomerKind::Company { .. })
    }

    #[must_use]
    pub const fn company_number(&self) -> Option<&CompanyNumber> {
        match &self.kind {
            CustomerKind::Company { company_number } => Some(company_number),
            CustomerKind::Person { .. } => None,
        }
    }
}

impl TryFrom<ExternalCustomerDto> for ExternalCustomer {
    type Error = ExternalCustomerError;

    fn try_from(dto: ExternalCustomerDto) -> Result<Self, Self::Error> {
        let external_id = dto
            .external_id
            .as_deref()
            .ok_or(ExternalCustomerError::MissingExternalId)
            .and_then(|id| {
                ExternalId::parse(id).map_err(ExternalCustomerError::InvalidExternalId)
            })?;

        let kind = match dto.company_number.as_deref() {
            Some(number) => CustomerKind::Company {
                company_number: CompanyNumber::parse(number)
                    .map_err(ExternalCustomerError::InvalidCompanyNumber)?,
            },
            None => CustomerKind::Person {
                bonus_points_balance: dto.bonus_points_balance,
            },
        };

        let shopping_lists = dto
            .shopping_lists
            .unwrap_or_default()
            .into_iter()
            .map(|list| ShoppingList::new(list.products.unwrap_or_default()))
            .collect();

        Ok(Self {
            external_id,
            name: dto.name,
            preferred_store: dto.preferred_store,
            address: dto.address.filter(|address| !address.is_empty()),
            shopping_lists,
            kind,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_company_payload() {
        let payload = r#"{
            "externalId": "E1",
            "companyNumber": "C1",
            "name": "Acme",
            "preferredStore": "Nordstan",
            "address": {"street": "Main 1", "city": "Gothenburg", "postalCode": "41101"},
            "shoppingLists": [{"products": ["apples", "pears"]}]
        }"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert_eq!(customer.external_id.as_str(), "E1");
        assert!(customer.is_company());
        assert_eq!(customer.company_number().unwrap().as_str(), "C1");
        assert_eq!(customer.name.as_deref(), Some("Acme"));
        assert_eq!(customer.preferred_store.as_deref(), Some("Nordstan"));
        let address = customer.address.unwrap();
        assert_eq!(address.postal_code.as_deref(), Some("41101"));
        assert_eq!(
            customer.shopping_lists,
            vec![ShoppingList::new(vec!["apples".into(), "pears".into()])]
        );
    }

    #[test]
    fn test_person_payload_keeps_bonus_points() {
        let payload = r#"{"externalId": "P1", "name": "Jane", "bonusPointsBalance": 120}"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert!(!customer.is_company());
        assert_eq!(
            customer.kind,
            CustomerKind::Person {
                bonus_points_balance: Some(120)
            }
        );
    }

    #[test]
    fn test_company_drops_bonus_points() {
        let payload = r#"{"externalId": "E1", "companyNumber": "C1", "bonusPointsBalance": 7}"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert!(matches!(customer.kind, CustomerKind::Company { .. }));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let payload = r#"{"externalId": "P1", "loyaltyTier": "gold", "tags": [1, 2]}"#;
        assert!(ExternalCustomer::from_json(payload).is_ok());
    }

    #[test]
    fn test_absent_optionals_default_to_empty() {
        let customer = ExternalCustomer::from_json(r#"{"externalId": "P1"}"#).unwrap();

        assert_eq!(customer.name, None);
        assert_eq!(customer.address, None);
        assert!(customer.shopping_lists.is_empty());
        assert_eq!(
            customer.kind,
            CustomerKind::Person {
                bonus_points_balance: None
            }
        );
    }

    #[test]
    fn test_empty_address_is_dropped() {
        let payload = r#"{"externalId": "P1", "address": {"street": null}}"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert_eq!(customer.address, None);
    }

    #[test]
    fn test_null_lists_and_products() {
        let payload = r#"{"externalId": "P1", "shoppingLists": [{"products": null}, {}]}"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert_eq!(customer.shopping_lists.len(), 2);
        assert!(customer.shopping_lists.iter().all(|l| l.products.is_empty()));

        let customer =
            ExternalCustomer::from_json(r#"{"externalId": "P1", "shoppingLists": null}"#).unwrap();
        assert!(customer.shopping_lists.is_empty());
    }

    #[test]
    fn test_postal_address_alias() {
        let payload = r#"{"externalId": "P1", "postalAddress": {"city": "Lund"}}"#;

        let customer = ExternalCustomer::from_json(payload).unwrap();

        assert_eq!(customer.address.unwrap().city.as_deref(), Some("Lund"));
    }

    #[test]
    fn test_missing_external_id() {
        let err = ExternalCustomer::from_json(r#"{"name": "Nobody"}"#).unwrap_err();
        assert!(matches!(err, ExternalCustomerError::MissingExternalId));
    }

    #[test]
    fn test_blank_keys_rejected() {
        let err = ExternalCustomer::from_json(r#"{"externalId": "  "}"#).unwrap_err();
        assert!(matches!(err, ExternalCustomerError::InvalidExternalId(_)));

        let err =
            ExternalCustomer::from_json(r#"{"externalId": "E1", "companyNumber": ""}"#).unwrap_err();
        assert!(matches!(err, ExternalCustomerError::InvalidCompanyNumber(_)));
    }

    #[test]
    fn test_malformed_payload() {
        let err = ExternalCustomer::from_json("not json").unwrap_err();
        assert!(matches!(err, ExternalCustomerError::Malformed(_)));
    }
}
