//! Integration tests for customer sync.
//!
//! # Running Tests
//!
//! ```bash
//! # Listener tests over the in-memory store
//! cargo test -p customer-sync-integration-tests
//!
//! # Including the PostgreSQL tests
//! CUSTOMER_SYNC_TEST_DATABASE_URL=postgres://localhost/customer_sync_test \
//!     cargo test -p customer-sync-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `listener_memory` - End-to-end listener runs over the in-memory store
//! - `postgres_store` - The `PostgreSQL` store and repository (ignored by default)
//!
//! `PostgreSQL` tests share one database and never truncate it: every test
//! works on identifiers made unique with [`unique`].

use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use customer_sync_worker::db::MIGRATOR;

/// Environment variable holding the test database URL.
pub const TEST_DATABASE_URL: &str = "CUSTOMER_SYNC_TEST_DATABASE_URL";

/// Suffix `prefix` with a random id so concurrent tests never share keys.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// JSON payload for a company record.
#[must_use]
pub fn company_payload(external_id: &str, company_number: &str, name: &str) -> String {
    json!({
        "externalId": external_id,
        "companyNumber": company_number,
        "name": name,
        "preferredStore": "Nordstan",
        "address": {
            "street": "Main 1",
            "city": "Gothenburg",
            "postalCode": "41101"
        },
        "shoppingLists": [{"products": ["lumber", "nails"]}],
        "someFutureField": true
    })
    .to_string()
}

/// JSON payload for a person record.
#[must_use]
pub fn person_payload(external_id: &str, name: &str, bonus_points: Option<i32>) -> String {
    let mut payload = json!({
        "externalId": external_id,
        "name": name,
        "postalAddress": {"city": "Lund"},
        "shoppingLists": [{"products": ["milk"]}, {"products": ["bread", "eggs"]}]
    });
    if let (Some(points), Value::Object(map)) = (bonus_points, &mut payload) {
        map.insert("bonusPointsBalance".to_owned(), json!(points));
    }
    payload.to_string()
}

/// Join payloads into JSON-lines input.
#[must_use]
pub fn json_lines(payloads: &[String]) -> String {
    let mut input = payloads.join("\n");
    input.push('\n');
    input
}

/// Connect to the test database and apply migrations.
///
/// Returns `None` when `CUSTOMER_SYNC_TEST_DATABASE_URL` is not set.
///
/// # Errors
///
/// Returns `sqlx::Error` if the database is unreachable or a migration fails.
pub async fn test_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let Ok(url) = std::env::var(TEST_DATABASE_URL) else {
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(Some(pool))
}
