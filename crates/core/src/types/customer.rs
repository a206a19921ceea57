//! The internal customer record and its parts.

use serde::{Deserialize, Serialize};

use super::id::CustomerId;
use super::identity::{CompanyNumber, ExternalId};

/// Classification of a stored customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Company,
    Person,
}

impl CustomerType {
    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Person => "person",
        }
    }
}

impl std::fmt::Display for CustomerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CustomerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(Self::Company),
            "person" => Ok(Self::Person),
            _ => Err(format!("invalid customer type: {s}")),
        }
    }
}

/// Type-specific customer data.
///
/// A company never carries a bonus points balance and a person never carries a
/// company number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerProfile {
    Company { company_number: CompanyNumber },
    Person { bonus_points_balance: Option<i32> },
}

impl CustomerProfile {
    /// The customer type this profile belongs to.
    #[must_use]
    pub const fn customer_type(&self) -> CustomerType {
        match self {
            Self::Company { .. } => CustomerType::Company,
            Self::Person { .. } => CustomerType::Person,
        }
    }
}

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl Address {
    /// Returns true if no part of the address is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.postal_code.is_none()
    }
}

/// A shopping list owned by exactly one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    /// Product identifiers, in list order.
    pub products: Vec<String>,
}

impl ShoppingList {
    /// Create a shopping list from product identifiers.
    #[must_use]
    pub const fn new(products: Vec<String>) -> Self {
        Self { products }
    }
}

/// An internal customer record.
///
/// `id` is only set once the store has persisted the record; its absence is
/// what makes a save a create instead of an update. `profile` is `None` until
/// the record is populated from an external company or person for the first
/// time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Option<CustomerId>,
    pub external_id: Option<ExternalId>,
    pub master_external_id: Option<ExternalId>,
    pub profile: Option<CustomerProfile>,
    pub name: Option<String>,
    pub preferred_store: Option<String>,
    pub address: Option<Address>,
    pub shopping_lists: Vec<ShoppingList>,
}

impl Customer {
    /// A new, unpersisted record bound to `external_id` as both its external
    /// and master external id.
    #[must_use]
    pub fn seeded(external_id: &ExternalId) -> Self {
        Self {
            external_id: Some(external_id.clone()),
            master_external_id: Some(external_id.clone()),
            ..Self::default()
        }
    }

    /// Returns true once the store has assigned an id.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    #[must_use]
    pub fn customer_type(&self) -> Option<CustomerType> {
        self.profile.as_ref().map(CustomerProfile::customer_type)
    }

    #[must_use]
    pub const fn company_number(&self) -> Option<&CompanyNumber> {
        match &self.profile {
            Some(CustomerProfile::Company { company_number }) => Some(company_number),
            _ => None,
        }
    }

    #[must_use]
    pub const fn bonus_points_balance(&self) -> Option<i32> {
        match &self.profile {
            Some(CustomerProfile::Person {
                bonus_points_balance,
            }) => *bonus_points_balance,
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sets_both_ids() {
        let external_id = ExternalId::parse("E1").unwrap();
        let customer = Customer::seeded(&external_id);

        assert_eq!(customer.external_id.as_ref(), Some(&external_id));
        assert_eq!(customer.master_external_id.as_ref(), Some(&external_id));
        assert!(!customer.is_persisted());
        assert_eq!(customer.customer_type(), None);
    }

    #[test]
    fn test_profile_accessors() {
        let company = Customer {
            profile: Some(CustomerProfile::Company {
                company_number: CompanyNumber::parse("C1").unwrap(),
            }),
            ..Customer::default()
        };
        assert_eq!(company.customer_type(), Some(CustomerType::Company));
        assert_eq!(company.company_number().unwrap().as_str(), "C1");
        assert_eq!(company.bonus_points_balance(), None);

        let person = Customer {
            profile: Some(CustomerProfile::Person {
                bonus_points_balance: Some(42),
            }),
            ..Customer::default()
        };
        assert_eq!(person.customer_type(), Some(CustomerType::Person));
        assert_eq!(person.company_number(), None);
        assert_eq!(person.bonus_points_balance(), Some(42));
    }

    #[test]
    fn test_customer_type_from_str() {
        assert_eq!("company".parse::<CustomerType>(), Ok(CustomerType::Company));
        assert_eq!("person".parse::<CustomerType>(), Ok(CustomerType::Person));
        assert!("COMPANY".parse::<CustomerType>().is_err());
    }

    #[test]
    fn test_address_is_empty() {
        assert!(Address::default().is_empty());
        let address = Address {
            city: Some("Gothenburg".to_owned()),
            ..Address::default()
        };
        assert!(!address.is_empty());
    }
}
