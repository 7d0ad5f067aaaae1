//! Store selection from configuration.
//!
//! - `Environment::Test`: in-memory store with the snips collection created
//! - otherwise: PostgreSQL at `DATABASE_URL` (feature `postgres`)

use std::sync::Arc;

use snip_domain::PARTITION_KEY_PATH;
use snip_store::{DocumentStore, MemoryDocumentStore};
use tracing::info;

use crate::config::{Config, Environment};
use crate::error::RepositoryResult;

/// In-memory store paged by `config.page_size`, holding an empty snips collection
pub fn memory_store(config: &Config) -> Arc<MemoryDocumentStore> {
    let store = MemoryDocumentStore::new().with_page_size(config.page_size);
    store.create_collection(&config.collection, PARTITION_KEY_PATH);
    Arc::new(store)
}

/// Open the store the configured environment calls for
pub async fn open_store(config: &Config) -> RepositoryResult<Arc<dyn DocumentStore>> {
    match config.environment {
        Environment::Test => {
            info!(
                collection = %config.collection,
                page_size = config.page_size,
                "Using in-memory document store"
            );
            Ok(memory_store(config))
        },
        Environment::Development | Environment::Production => postgres_store(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn postgres_store(config: &Config) -> RepositoryResult<Arc<dyn DocumentStore>> {
    let url = config.require_database_url()?;
    let store = snip_store::PgDocumentStore::connect(url, config.page_size).await?;

    info!(
        environment = %config.environment,
        page_size = config.page_size,
        "Connected to PostgreSQL document store"
    );
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_store(config: &Config) -> RepositoryResult<Arc<dyn DocumentStore>> {
    config.require_database_url()?;
    Err(crate::error::RepositoryError::Configuration(format!(
        "{} environment needs the PostgreSQL backend; build with the `postgres` feature",
        config.environment
    )))
}
