//! SnipSnop Storage Layer
//!
//! Capability interface over a partitioned document store.
//!
//! # Architecture
//!
//! - **Ports**: `DocumentStore` (get / upsert / delete / paged query by
//!   id + partition key) and `PageIterator` (lazy, finite result pages)
//! - **Pagination**: `drain` consumes an iterator in one pass, summing charges
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use snip_store::{drain, DocumentStore, MemoryDocumentStore, Query};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryDocumentStore::new();
//!     store.create_collection("snips", "/userId");
//!
//!     let doc = json!({ "id": "s1", "userId": "u1" });
//!     store.upsert_document("snips", doc, "u1").await.unwrap();
//!
//!     let query = Query::select_all().where_eq("userId", "u1");
//!     let pages = store.query_paged("snips", query, Some("u1")).await.unwrap();
//!     let drained = drain(pages).await.unwrap();
//!     println!("{} documents, {} units", drained.items.len(), drained.charge);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod charge;
mod error;
mod memory;
mod pagination;
#[cfg(feature = "postgres")]
mod postgres;
mod ports;
mod query;

// Re-exports
pub use charge::{ChargeSchedule, RequestCharge};
pub use error::StoreError;
pub use memory::{MemoryDocumentStore, DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_PAGE_SIZE};
pub use pagination::{drain, Drained, SnapshotPages};
#[cfg(feature = "postgres")]
pub use postgres::PgDocumentStore;
pub use ports::{CollectionInfo, DocumentStore, ItemResponse, Page, PageIterator};
pub use query::{Condition, Query};
