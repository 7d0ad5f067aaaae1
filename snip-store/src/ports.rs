//! Document store port definitions
//!
//! `DocumentStore` abstracts the concrete database driver behind get, upsert,
//! delete and paged query operations addressed by id + partition key.
//! Implementations can be PostgreSQL, in-memory, or a scripted test double.

use crate::charge::RequestCharge;
use crate::error::StoreError;
use crate::query::Query;
use async_trait::async_trait;
use serde_json::Value;

// =============================================================================
// Responses
// =============================================================================

/// A single document returned by a point operation
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    /// The stored document
    pub document: Value,
    /// Cost of the operation
    pub charge: RequestCharge,
}

/// One batch of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Documents in this page
    pub items: Vec<Value>,
    /// Cost of fetching this page
    pub charge: RequestCharge,
}

/// Collection metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Property path the store partitions by (e.g. `/userId`)
    pub partition_key_path: String,
}

// =============================================================================
// Document Store Port
// =============================================================================

/// Port for a partitioned document store.
///
/// One instance is shared by many concurrent callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read collection metadata.
    ///
    /// Fails with `StoreError::Configuration` if the collection does not exist.
    async fn read_collection(&self, collection: &str) -> Result<CollectionInfo, StoreError>;

    /// Point read by id + partition key
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError>;

    /// Create the document or fully replace the one at the same id + partition key.
    ///
    /// The document must carry a string `id` property.
    async fn upsert_document(
        &self,
        collection: &str,
        document: Value,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError>;

    /// Physically delete a document. `StoreError::NotFound` if absent.
    async fn delete_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<RequestCharge, StoreError>;

    /// Start a paged query.
    ///
    /// With a partition key the query is scoped to that partition; without one
    /// it fans out across all partitions and the order between partitions is
    /// unspecified. No page is fetched until `next_page` is called.
    async fn query_paged(
        &self,
        collection: &str,
        query: Query,
        partition_key: Option<&str>,
    ) -> Result<Box<dyn PageIterator>, StoreError>;
}

// =============================================================================
// Page Iterator Port
// =============================================================================

/// Lazy, finite, non-restartable sequence of result pages.
///
/// Consumed by a single caller; no internal synchronization.
#[async_trait]
pub trait PageIterator: Send {
    /// Whether another page can be fetched
    fn has_more(&self) -> bool;

    /// Fetch the next page.
    ///
    /// Fails with `StoreError::Exhausted` once `has_more` is false.
    async fn next_page(&mut self) -> Result<Page, StoreError>;
}
