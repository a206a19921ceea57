//! Feed a JSON-lines file through the sync listener.
//!
//! # Usage
//!
//! ```bash
//! # Apply to the database, one transaction per record
//! cs-cli sync customers.jsonl
//!
//! # Apply to an empty in-memory store and log every resulting record
//! cs-cli sync customers.jsonl --dry-run
//! ```

use std::path::Path;

use tokio::io::BufReader;

use customer_sync_worker::listener::{
    ListenerSummary, MemoryBackend, PgBackend, SyncBackend, SyncListener,
};

use super::{CommandError, connect};

/// Sync `file` into the database.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or the database fails.
pub async fn apply(file: &Path) -> Result<(), CommandError> {
    let pool = connect().await?;
    let listener = listen(file, PgBackend::new(pool)).await?;
    log_summary(listener.summary());
    Ok(())
}

/// Sync `file` into an in-memory store and log the resulting records.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read.
pub async fn dry_run(file: &Path) -> Result<(), CommandError> {
    let listener = listen(file, MemoryBackend::default()).await?;
    let summary = listener.summary();

    let store = listener.into_backend().into_store();
    for customer in store.customers() {
        let json = serde_json::to_string(customer)?;
        tracing::info!(customer = %json, "Dry run result");
    }
    log_summary(summary);
    Ok(())
}

async fn listen<B>(file: &Path, backend: B) -> Result<SyncListener<B>, CommandError>
where
    B: SyncBackend,
{
    let input = tokio::fs::File::open(file)
        .await
        .map_err(|source| CommandError::Input {
            path: file.display().to_string(),
            source,
        })?;

    tracing::info!(file = %file.display(), "Syncing customer records");
    let mut listener = SyncListener::new(backend);
    listener.run(BufReader::new(input)).await?;
    Ok(listener)
}

fn log_summary(summary: ListenerSummary) {
    tracing::info!(
        received = summary.received,
        created = summary.created,
        updated = summary.updated,
        conflicts = summary.conflicts,
        invalid = summary.invalid,
        "Sync complete"
    );
}
