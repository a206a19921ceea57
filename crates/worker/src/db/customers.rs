//! Customer persistence on `PostgreSQL`.
//!
//! [`PgCustomerStore`] is the [`CustomerStore`] the sync engine runs against:
//! it owns one transaction for the duration of a single sync. [`CustomerRepository`]
//! is the read-only, pool-backed view used by the CLI.
//!
//! Queries are built at runtime with `sqlx::query_as` to avoid the SQLx
//! offline mode cache requirements.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use customer_sync_core::{
    Address, CompanyNumber, Customer, CustomerId, CustomerProfile, CustomerStore, CustomerType,
    ExternalId, KeyError, ShoppingList,
};

use super::RepositoryError;

const CUSTOMER_COLUMNS: &str = "id, external_id, master_external_id, customer_type, name, \
     preferred_store, address_street, address_city, address_postal_code, company_number, \
     bonus_points_balance";

/// Key a lookup goes through.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    ExternalId,
    MasterExternalId,
    CompanyNumber,
}

impl Lookup {
    const fn column(self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::MasterExternalId => "master_external_id",
            Self::CompanyNumber => "company_number",
        }
    }

    /// Advisory lock namespace. Both external id lookups share one so a sync
    /// holds a single lock per external id.
    const fn lock_namespace(self) -> &'static str {
        match self {
            Self::ExternalId | Self::MasterExternalId => "external_id",
            Self::CompanyNumber => "company_number",
        }
    }
}

/// Raw customer row from the database.
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    external_id: Option<String>,
    master_external_id: Option<String>,
    customer_type: Option<String>,
    name: Option<String>,
    preferred_store: Option<String>,
    address_street: Option<String>,
    address_city: Option<String>,
    address_postal_code: Option<String>,
    company_number: Option<String>,
    bonus_points_balance: Option<i32>,
}

impl CustomerRow {
    fn into_customer(
        self,
        shopping_lists: Vec<ShoppingList>,
    ) -> Result<Customer, RepositoryError> {
        let id = CustomerId::new(self.id);
        let customer_type = self
            .customer_type
            .as_deref()
            .map(str::parse::<CustomerType>)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("customer {id}: {e}")))?;

        let profile = match customer_type {
            Some(CustomerType::Company) => {
                let number = self.company_number.ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "customer {id}: company without company number"
                    ))
                })?;
                Some(CustomerProfile::Company {
                    company_number: parse_key(id, &number, CompanyNumber::parse)?,
                })
            }
            Some(CustomerType::Person) => Some(CustomerProfile::Person {
                bonus_points_balance: self.bonus_points_balance,
            }),
            None => None,
        };

        let address = Address {
            street: self.address_street,
            city: self.address_city,
            postal_code: self.address_postal_code,
        };

        Ok(Customer {
            id: Some(id),
            external_id: self
                .external_id
                .map(|value| parse_key(id, &value, ExternalId::parse))
                .transpose()?,
            master_external_id: self
                .master_external_id
                .map(|value| parse_key(id, &value, ExternalId::parse))
                .transpose()?,
            profile,
            name: self.name,
            preferred_store: self.preferred_store,
            address: (!address.is_empty()).then_some(address),
            shopping_lists,
        })
    }
}

fn parse_key<T>(
    id: CustomerId,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, KeyError>,
) -> Result<T, RepositoryError> {
    parse(value).map_err(|e| RepositoryError::DataCorruption(format!("customer {id}: {e}")))
}

// =============================================================================
// Queries
// =============================================================================

/// Serialize concurrent syncs on one identity key until the transaction ends.
async fn lock_key(
    conn: &mut PgConnection,
    lookup: Lookup,
    key: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("{}:{key}", lookup.lock_namespace()))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn fetch_latest(
    conn: &mut PgConnection,
    lookup: Lookup,
    key: &str,
) -> Result<Option<Customer>, RepositoryError> {
    let sql = format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customer_sync.customer \
         WHERE {} = $1 ORDER BY revision DESC LIMIT 1",
        lookup.column()
    );
    let row = sqlx::query_as::<_, CustomerRow>(&sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let lists = fetch_shopping_lists(conn, CustomerId::new(row.id)).await?;
            Ok(Some(row.into_customer(lists)?))
        }
        None => Ok(None),
    }
}

async fn fetch_all(
    conn: &mut PgConnection,
    lookup: Lookup,
    key: &str,
) -> Result<Vec<Customer>, RepositoryError> {
    let sql = format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customer_sync.customer \
         WHERE {} = $1 ORDER BY revision DESC",
        lookup.column()
    );
    let rows = sqlx::query_as::<_, CustomerRow>(&sql)
        .bind(key)
        .fetch_all(&mut *conn)
        .await?;

    let mut customers = Vec::with_capacity(rows.len());
    for row in rows {
        let lists = fetch_shopping_lists(conn, CustomerId::new(row.id)).await?;
        customers.push(row.into_customer(lists)?);
    }
    Ok(customers)
}

async fn fetch_shopping_lists(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<Vec<ShoppingList>, RepositoryError> {
    let lists = sqlx::query_scalar::<_, Vec<String>>(
        r"
        SELECT products FROM customer_sync.shopping_list
        WHERE customer_id = $1
        ORDER BY position
        ",
    )
    .bind(customer_id.as_i32())
    .fetch_all(&mut *conn)
    .await?;

    Ok(lists.into_iter().map(ShoppingList::new).collect())
}

async fn insert_customer(
    conn: &mut PgConnection,
    customer: &Customer,
) -> Result<CustomerId, RepositoryError> {
    let address = customer.address.as_ref();
    let id = sqlx::query_scalar::<_, i32>(
        r"
        INSERT INTO customer_sync.customer
            (external_id, master_external_id, customer_type, name, preferred_store,
             address_street, address_city, address_postal_code,
             company_number, bonus_points_balance)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        ",
    )
    .bind(customer.external_id.as_ref().map(ExternalId::as_str))
    .bind(customer.master_external_id.as_ref().map(ExternalId::as_str))
    .bind(customer.customer_type().map(CustomerType::as_str))
    .bind(customer.name.as_deref())
    .bind(customer.preferred_store.as_deref())
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.and_then(|a| a.city.as_deref()))
    .bind(address.and_then(|a| a.postal_code.as_deref()))
    .bind(customer.company_number().map(CompanyNumber::as_str))
    .bind(customer.bonus_points_balance())
    .fetch_one(&mut *conn)
    .await?;

    Ok(CustomerId::new(id))
}

async fn update_customer(
    conn: &mut PgConnection,
    id: CustomerId,
    customer: &Customer,
) -> Result<(), RepositoryError> {
    let address = customer.address.as_ref();
    let result = sqlx::query(
        r"
        UPDATE customer_sync.customer
        SET external_id = $2,
            master_external_id = $3,
            customer_type = $4,
            name = $5,
            preferred_store = $6,
            address_street = $7,
            address_city = $8,
            address_postal_code = $9,
            company_number = $10,
            bonus_points_balance = $11,
            revision = nextval('customer_sync.customer_revision_seq'),
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .bind(customer.external_id.as_ref().map(ExternalId::as_str))
    .bind(customer.master_external_id.as_ref().map(ExternalId::as_str))
    .bind(customer.customer_type().map(CustomerType::as_str))
    .bind(customer.name.as_deref())
    .bind(customer.preferred_store.as_deref())
    .bind(address.and_then(|a| a.street.as_deref()))
    .bind(address.and_then(|a| a.city.as_deref()))
    .bind(address.and_then(|a| a.postal_code.as_deref()))
    .bind(customer.company_number().map(CompanyNumber::as_str))
    .bind(customer.bonus_points_balance())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Delete the customer's lists and insert the current ones in order.
async fn replace_shopping_lists(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    lists: &[ShoppingList],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM customer_sync.shopping_list WHERE customer_id = $1")
        .bind(customer_id.as_i32())
        .execute(&mut *conn)
        .await?;

    for (position, list) in (0_i32..).zip(lists) {
        sqlx::query(
            r"
            INSERT INTO customer_sync.shopping_list (customer_id, position, products)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(customer_id.as_i32())
        .bind(position)
        .bind(&list.products)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Transactional store
// =============================================================================

/// [`CustomerStore`] scoped to one `PostgreSQL` transaction.
///
/// Nothing written through the store is visible to others until
/// [`commit`](Self::commit). Dropping the store without committing rolls
/// everything back.
#[derive(Debug)]
pub struct PgCustomerStore {
    tx: Transaction<'static, Postgres>,
}

impl PgCustomerStore {
    /// Begin a transaction on `pool`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if no connection can be acquired.
    pub async fn begin(pool: &PgPool) -> Result<Self, RepositoryError> {
        Ok(Self {
            tx: pool.begin().await?,
        })
    }

    /// Commit all writes made through this store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the commit fails.
    pub async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard all writes made through this store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the rollback fails.
    pub async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn find(
        &mut self,
        lookup: Lookup,
        key: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        lock_key(&mut self.tx, lookup, key).await?;
        fetch_latest(&mut self.tx, lookup, key).await
    }
}

impl CustomerStore for PgCustomerStore {
    type Error = RepositoryError;

    async fn find_by_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        self.find(Lookup::ExternalId, external_id.as_str()).await
    }

    async fn find_by_master_external_id(
        &mut self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, Self::Error> {
        self.find(Lookup::MasterExternalId, external_id.as_str())
            .await
    }

    async fn find_by_company_number(
        &mut self,
        company_number: &CompanyNumber,
    ) -> Result<Option<Customer>, Self::Error> {
        self.find(Lookup::CompanyNumber, company_number.as_str())
            .await
    }

    #[instrument(skip_all, fields(external_id = ?customer.external_id))]
    async fn create(&mut self, mut customer: Customer) -> Result<Customer, Self::Error> {
        if let Some(id) = customer.id {
            return Err(RepositoryError::Conflict(format!(
                "customer {id} is already persisted"
            )));
        }

        let id = insert_customer(&mut self.tx, &customer).await?;
        replace_shopping_lists(&mut self.tx, id, &customer.shopping_lists).await?;
        customer.id = Some(id);

        debug!(customer_id = %id, "Inserted customer");
        Ok(customer)
    }

    #[instrument(skip_all, fields(customer_id = ?customer.id))]
    async fn update(&mut self, customer: Customer) -> Result<Customer, Self::Error> {
        let id = customer.id.ok_or_else(|| {
            RepositoryError::Conflict("customer has not been persisted".to_owned())
        })?;

        update_customer(&mut self.tx, id, &customer).await?;
        replace_shopping_lists(&mut self.tx, id, &customer.shopping_lists).await?;

        debug!("Updated customer");
        Ok(customer)
    }
}

// =============================================================================
// Read-only repository
// =============================================================================

/// Repository for customer lookups outside of a sync.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the customer currently bound to an external id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_latest(&mut conn, Lookup::ExternalId, external_id.as_str()).await
    }

    /// List every customer carrying an external id, most recently written first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_all(&mut conn, Lookup::ExternalId, external_id.as_str()).await
    }

    /// Get the company currently registered under a company number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_company_number(
        &self,
        company_number: &CompanyNumber,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_latest(&mut conn, Lookup::CompanyNumber, company_number.as_str()).await
    }
}
