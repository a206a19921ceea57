//! Identity keys used to match external records against stored customers.

use core::fmt;

/// Errors that can occur when parsing an identity key.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The input string is empty or whitespace only.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Which key was being parsed.
        kind: &'static str,
    },
}

/// Defines a string identity key with validation, serde and optional sqlx support.
///
/// Keys are kept exactly as given and compared as exact strings. Values read
/// back from the database are assumed valid and are not re-validated.
macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse the key from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty or whitespace only.
            pub fn parse(s: &str) -> Result<Self, KeyError> {
                if s.trim().is_empty() {
                    return Err(KeyError::Empty { kind: $kind });
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the key and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = KeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = KeyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_key!(
    /// Identifier of a customer in the external source system.
    ///
    /// ```
    /// use customer_sync_core::ExternalId;
    ///
    /// let id = ExternalId::parse("12345").unwrap();
    /// assert_eq!(id.as_str(), "12345");
    /// assert_ne!(ExternalId::parse(" 12345").unwrap(), id);
    /// assert!(ExternalId::parse("   ").is_err());
    /// ```
    ExternalId,
    "external id"
);

define_key!(
    /// Registered company number. Its presence marks an external record as a company.
    CompanyNumber,
    "company number"
);
