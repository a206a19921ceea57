//! Customer lookup commands.
//!
//! # Usage
//!
//! ```bash
//! cs-cli customer show E1
//! ```

use customer_sync_core::ExternalId;
use customer_sync_worker::db::CustomerRepository;

use super::{CommandError, connect};

/// Print the customer currently bound to `external_id` as pretty JSON.
///
/// # Errors
///
/// Returns `CommandError::InvalidArgument` for a blank external id and
/// `CommandError::Repository` if the lookup fails.
pub async fn show(external_id: &str) -> Result<(), CommandError> {
    let external_id =
        ExternalId::parse(external_id).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let pool = connect().await?;

    let Some(customer) = CustomerRepository::new(&pool)
        .get_by_external_id(&external_id)
        .await?
    else {
        tracing::warn!(%external_id, "No customer bound to external id");
        return Ok(());
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&customer)?);
    }
    Ok(())
}
