//! Ingestion of external customer records.
//!
//! The listener reads one JSON record per line and runs each through a
//! [`SyncBackend`]. Every record is synced in its own unit of work: conflicts
//! and undecodable payloads are logged, counted and skipped, and the next
//! record is processed as usual. A store failure stops the listener.

use std::error::Error as StdError;
use std::future::Future;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use customer_sync_core::{
    CustomerSync, ExternalCustomer, MemoryCustomerStore, MemoryStoreError, SyncError, SyncOutcome,
};

use crate::db::{PgCustomerStore, RepositoryError};

/// Errors that stop the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Reading the input failed.
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),

    /// The store failed while syncing a record.
    #[error("store failed: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),
}

/// Counts of what happened to the records a listener received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerSummary {
    pub received: u64,
    pub created: u64,
    pub updated: u64,
    pub conflicts: u64,
    pub invalid: u64,
}

/// Runs one sync as a single unit of work.
pub trait SyncBackend {
    type Error: StdError + Send + Sync + 'static;

    /// Sync `external` and make its writes durable, or discard all of them.
    fn sync(
        &mut self,
        external: ExternalCustomer,
    ) -> impl Future<Output = Result<SyncOutcome, SyncError<Self::Error>>> + Send;
}

/// Syncs each record in its own `PostgreSQL` transaction.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SyncBackend for PgBackend {
    type Error = RepositoryError;

    async fn sync(
        &mut self,
        external: ExternalCustomer,
    ) -> Result<SyncOutcome, SyncError<Self::Error>> {
        let mut sync = CustomerSync::new(PgCustomerStore::begin(&self.pool).await?);

        match sync.sync(external).await {
            Ok(outcome) => {
                sync.into_inner().commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = sync.into_inner().rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Syncs against an in-memory store. A failed sync leaves the store as it was.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: MemoryCustomerStore,
}

impl MemoryBackend {
    #[must_use]
    pub const fn new(store: MemoryCustomerStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &MemoryCustomerStore {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> MemoryCustomerStore {
        self.store
    }
}

impl SyncBackend for MemoryBackend {
    type Error = MemoryStoreError;

    async fn sync(
        &mut self,
        external: ExternalCustomer,
    ) -> Result<SyncOutcome, SyncError<Self::Error>> {
        let mut tx = self.store.transaction();
        let outcome = CustomerSync::new(&mut tx).sync(external).await?;
        tx.commit();
        Ok(outcome)
    }
}

/// Feeds external records into a [`SyncBackend`] and keeps a [`ListenerSummary`].
#[derive(Debug)]
pub struct SyncListener<B> {
    backend: B,
    summary: ListenerSummary,
}

impl<B> SyncListener<B>
where
    B: SyncBackend,
{
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            summary: ListenerSummary::default(),
        }
    }

    /// Counts so far.
    #[must_use]
    pub const fn summary(&self) -> ListenerSummary {
        self.summary
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Handle a single JSON payload. Blank payloads are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Store` if the backend's store fails. Conflicts
    /// and invalid payloads are not errors.
    pub async fn handle(&mut self, payload: &str) -> Result<(), ListenerError> {
        if payload.trim().is_empty() {
            return Ok(());
        }
        self.summary.received += 1;

        let external = match ExternalCustomer::from_json(payload) {
            Ok(external) => external,
            Err(e) => {
                warn!(error = %e, "Skipping invalid customer payload");
                self.summary.invalid += 1;
                return Ok(());
            }
        };

        let span = info_span!(
            "sync_record",
            sync_id = %Uuid::new_v4(),
            external_id = %external.external_id,
        );
        let result = self.backend.sync(external).instrument(span.clone()).await;
        let _entered = span.enter();

        match result {
            Ok(outcome) => {
                if outcome.created {
                    self.summary.created += 1;
                    info!(
                        customer_id = ?outcome.customer.id,
                        duplicates = outcome.duplicates.len(),
                        "Customer created"
                    );
                } else {
                    self.summary.updated += 1;
                    info!(
                        customer_id = ?outcome.customer.id,
                        duplicates = outcome.duplicates.len(),
                        "Customer updated"
                    );
                }
                Ok(())
            }
            Err(SyncError::Store(e)) => Err(ListenerError::Store(Box::new(e))),
            Err(conflict) => {
                error!(error = %conflict, "Conflict, skipping customer record");
                self.summary.conflicts += 1;
                Ok(())
            }
        }
    }

    /// Handle every line of `input` until end of input.
    ///
    /// Lines that are not valid UTF-8 are counted as invalid and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Input` if reading fails and
    /// `ListenerError::Store` if the store fails.
    pub async fn run<R>(&mut self, mut input: R) -> Result<ListenerSummary, ListenerError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }

            match std::str::from_utf8(&buf) {
                Ok(line) => self.handle(line).await?,
                Err(e) => {
                    warn!(error = %e, "Skipping customer payload that is not UTF-8");
                    self.summary.received += 1;
                    self.summary.invalid += 1;
                }
            }
        }
        Ok(self.summary)
    }
}
