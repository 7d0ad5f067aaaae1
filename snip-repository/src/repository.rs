//! Snip repository.
//!
//! Save, load and delete snips against a `DocumentStore`. Every document is
//! addressed by `(id, userId)` with `userId` as the partition key. The
//! repository holds no mutable state: one instance serves any number of
//! concurrent callers, and concurrent saves to the same key resolve as
//! last-writer-wins at the store.
//!
//! No call is retried internally. `RepositoryError::Transient` tells the
//! caller the whole call may be repeated.

use std::sync::Arc;

use serde_json::Value;
use snip_domain::{Snip, PARTITION_KEY_FIELD, PARTITION_KEY_PATH};
use snip_store::{drain, DocumentStore, Query, RequestCharge};
use tracing::{debug, info, warn};

use crate::backend::open_store;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{RepositoryError, RepositoryResult};

/// Repository for Snip documents
pub struct SnipRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
    clock: Arc<dyn Clock>,
}

impl SnipRepository {
    /// Create a repository over `store` using the configured collection
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Open the configured store and check its snips collection.
    ///
    /// See `backend::open_store` for how the environment picks a backend.
    pub async fn from_config(config: &Config) -> RepositoryResult<Self> {
        let store = open_store(config).await?;
        let repo = Self::new(store, config);
        repo.verify().await?;
        Ok(repo)
    }

    /// Replace the time source used for `lastModified`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Collection this repository reads and writes
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check that the collection exists and is partitioned by `/userId`.
    pub async fn verify(&self) -> RepositoryResult<()> {
        let info = self.store.read_collection(&self.collection).await?;

        if info.partition_key_path != PARTITION_KEY_PATH {
            return Err(RepositoryError::Configuration(format!(
                "collection '{}' is partitioned by '{}', expected '{}'",
                info.name, info.partition_key_path, PARTITION_KEY_PATH
            )));
        }

        info!(collection = %self.collection, "Snip collection verified");
        Ok(())
    }

    /// Create or fully replace a snip.
    ///
    /// `lastModified` is stamped from the repository clock, whatever the
    /// caller sent. Repeating the same save only moves `lastModified`.
    pub async fn save(&self, mut snip: Snip) -> RepositoryResult<(Snip, RequestCharge)> {
        snip.validate()?;
        snip.last_modified = self.clock.now();

        let document = snip.to_document()?;
        let response = self
            .store
            .upsert_document(&self.collection, document, snip.partition_key())
            .await
            .map_err(|e| {
                warn!(id = %snip.id, user_id = %snip.user_id, error = %e, "Snip upsert failed");
                RepositoryError::from(e)
            })?;

        let stored = decode(response.document, response.charge)?;
        debug!(
            id = %stored.id,
            user_id = %stored.user_id,
            charge = %response.charge,
            "Snip saved"
        );
        Ok((stored, response.charge))
    }

    /// Point lookup of one snip
    pub async fn get(&self, id: &str, user_id: &str) -> RepositoryResult<(Snip, RequestCharge)> {
        require_address(id, user_id)?;

        let response = self.store.get_document(&self.collection, id, user_id).await?;
        let snip = decode(response.document, response.charge)?;
        Ok((snip, response.charge))
    }

    /// Every snip owned by `user_id`.
    ///
    /// The partition is drained completely before returning, in the store's
    /// scan order. An empty partition is an empty list, not an error. A
    /// failed page fetch returns no partial list.
    pub async fn load(&self, user_id: &str) -> RepositoryResult<(Vec<Snip>, RequestCharge)> {
        if user_id.is_empty() {
            return Err(RepositoryError::validation("userId must not be empty"));
        }

        let query = Query::select_all().where_eq(PARTITION_KEY_FIELD, user_id);
        self.run_query(query, Some(user_id)).await
    }

    /// Every snip of every user (cross-partition fan-out).
    ///
    /// Order between partitions is unspecified.
    pub async fn load_all(&self) -> RepositoryResult<(Vec<Snip>, RequestCharge)> {
        self.run_query(Query::select_all(), None).await
    }

    /// Physically delete one snip.
    ///
    /// Deleting an absent `(id, userId)` is `RepositoryError::NotFound`.
    pub async fn delete(&self, id: &str, user_id: &str) -> RepositoryResult<RequestCharge> {
        require_address(id, user_id)?;

        let charge = self
            .store
            .delete_document(&self.collection, id, user_id)
            .await
            .map_err(RepositoryError::from)?;

        debug!(id, user_id, charge = %charge, "Snip deleted");
        Ok(charge)
    }

    async fn run_query(
        &self,
        query: Query,
        partition_key: Option<&str>,
    ) -> RepositoryResult<(Vec<Snip>, RequestCharge)> {
        let text = query.text();
        let pages = self
            .store
            .query_paged(&self.collection, query, partition_key)
            .await?;

        let drained = drain(pages).await.map_err(|e| {
            warn!(query = %text, error = %e, "Snip query failed");
            RepositoryError::from(e)
        })?;

        let charge = drained.charge;
        let snips = drained
            .items
            .into_iter()
            .map(|document| decode(document, charge))
            .collect::<RepositoryResult<Vec<_>>>()?;

        debug!(
            query = %text,
            partition_key = partition_key.unwrap_or("*"),
            count = snips.len(),
            pages = drained.pages,
            charge = %charge,
            "Snips loaded"
        );
        Ok((snips, charge))
    }
}

fn require_address(id: &str, user_id: &str) -> RepositoryResult<()> {
    if id.is_empty() {
        return Err(RepositoryError::validation("id must not be empty"));
    }
    if user_id.is_empty() {
        return Err(RepositoryError::validation("userId must not be empty"));
    }
    Ok(())
}

/// Decode a stored document, keeping the charge already paid on failure
fn decode(document: Value, charge: RequestCharge) -> RepositoryResult<Snip> {
    Snip::from_document(document).map_err(|e| RepositoryError::Validation {
        reason: e.to_string(),
        charge: Some(charge),
    })
}

// =============================================================================
// Tests
// =============================================================================
