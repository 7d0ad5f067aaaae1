//! Snip persistence for SnipSnop.
//!
//! `SnipRepository` saves, loads and deletes audio snips in a partitioned
//! document collection. Any `DocumentStore` backend can sit underneath:
//!
//! - `MemoryDocumentStore` for tests and local runs
//! - `PgDocumentStore` (feature `postgres`) for JSONB storage in PostgreSQL
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use snip_domain::{Episode, Snip};
//! use snip_repository::{Config, SnipRepository};
//! use snip_store::MemoryDocumentStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), snip_repository::RepositoryError> {
//! let config = Config::test();
//! let store = Arc::new(MemoryDocumentStore::new());
//! store.create_collection(&config.collection, "/userId");
//!
//! let repo = SnipRepository::new(store, &config);
//! repo.verify().await?;
//!
//! let episode = Episode::new(42, "https://a/ep.mp3", "Episode", "Show", "https://a/art.jpg");
//! let (saved, _charge) = repo
//!     .save(Snip::new("s1", "u1", "00:10", "00:40", "snips/u1/s1.m4a", episode))
//!     .await?;
//!
//! let (snips, _charge) = repo.load("u1").await?;
//! assert_eq!(snips, vec![saved]);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod repository;

pub use backend::{memory_store, open_store};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, Environment};
pub use error::{RepositoryError, RepositoryResult};
pub use repository::SnipRepository;
