//! In-memory document store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access. Charges follow a
//! `ChargeSchedule`; failures can be injected with `fail_next` / `fail_after`.

use crate::charge::{ChargeSchedule, RequestCharge};
use crate::error::StoreError;
use crate::pagination::SnapshotPages;
use crate::ports::{CollectionInfo, DocumentStore, ItemResponse, Page, PageIterator};
use crate::query::Query;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of documents per query page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default maximum serialized document size (2 MiB)
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;

/// Documents of one collection, in natural scan order `(partition key, id)`
struct MemoryCollection {
    partition_key_path: String,
    documents: BTreeMap<(String, String), Value>,
}

impl MemoryCollection {
    fn partition_field(&self) -> &str {
        self.partition_key_path.trim_start_matches('/')
    }
}

/// Pending injected failure: succeed `skip` more backend calls, then fail once
type FaultSlot = Arc<Mutex<Option<(usize, StoreError)>>>;

/// In-memory document store for testing
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    page_size: usize,
    schedule: ChargeSchedule,
    max_document_bytes: usize,
    fault: FaultSlot,
}

impl MemoryDocumentStore {
    /// Create a new store with no collections
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            schedule: ChargeSchedule::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            fault: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the number of documents per query page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the cost model
    pub fn with_schedule(mut self, schedule: ChargeSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Set the maximum serialized document size
    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    /// Create (or replace) a collection partitioned by `partition_key_path`
    pub fn create_collection(&self, name: &str, partition_key_path: &str) {
        if let Ok(mut collections) = self.collections.write() {
            collections.insert(
                name.to_string(),
                MemoryCollection {
                    partition_key_path: partition_key_path.to_string(),
                    documents: BTreeMap::new(),
                },
            );
        }
    }

    /// Number of documents in a collection (0 if missing)
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(|c| c.documents.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Make the next backend call fail with `error`
    pub fn fail_next(&self, error: StoreError) {
        self.fail_after(0, error);
    }

    /// Let `skip` backend calls succeed, then fail the following one with `error`.
    ///
    /// Point operations and page fetches count as backend calls; starting a
    /// query does not.
    pub fn fail_after(&self, skip: usize, error: StoreError) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = Some((skip, error));
        }
    }

    /// Remove every document from every collection
    pub fn clear(&self) {
        if let Ok(mut collections) = self.collections.write() {
            for collection in collections.values_mut() {
                collection.documents.clear();
            }
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemoryCollection>>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemoryCollection>>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume one slot of the injected fault plan
fn check_fault(fault: &FaultSlot) -> Result<(), StoreError> {
    let mut slot = fault
        .lock()
        .map_err(|_| StoreError::unavailable("fault plan lock poisoned"))?;
    let fire = match slot.as_mut() {
        Some((skip, _)) if *skip > 0 => {
            *skip -= 1;
            false
        },
        Some(_) => true,
        None => false,
    };
    match slot.take() {
        Some((_, error)) if fire => Err(error),
        pending => {
            *slot = pending;
            Ok(())
        },
    }
}

fn missing_collection(name: &str) -> StoreError {
    StoreError::Configuration(format!("collection '{}' does not exist", name))
}

fn encoded_len(document: &Value) -> usize {
    serde_json::to_vec(document).map(|b| b.len()).unwrap_or(0)
}

// =============================================================================
// Document Store Implementation
// =============================================================================

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read_collection(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        check_fault(&self.fault)?;
        let collections = self.read()?;
        let found = collections.get(collection).ok_or_else(|| missing_collection(collection))?;
        Ok(CollectionInfo {
            name: collection.to_string(),
            partition_key_path: found.partition_key_path.clone(),
        })
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        check_fault(&self.fault)?;
        let collections = self.read()?;
        let found = collections.get(collection).ok_or_else(|| missing_collection(collection))?;

        let document = found
            .documents
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id, partition_key))?;

        let charge = self.schedule.read(encoded_len(&document));
        Ok(ItemResponse { document, charge })
    }

    async fn upsert_document(
        &self,
        collection: &str,
        document: Value,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        check_fault(&self.fault)?;
        let mut collections = self.write()?;
        let found = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        if !document.is_object() {
            return Err(StoreError::conflict("document must be a JSON object"));
        }

        let id = match document.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(StoreError::conflict("document must carry a non-empty string 'id'")),
        };

        let field = found.partition_field();
        if document.get(field).and_then(Value::as_str) != Some(partition_key) {
            return Err(StoreError::conflict(format!(
                "partition key '{}' does not match document property '{}'",
                partition_key, field
            )));
        }

        let bytes = encoded_len(&document);
        if bytes > self.max_document_bytes {
            return Err(StoreError::conflict(format!(
                "document is {} bytes, limit is {}",
                bytes, self.max_document_bytes
            )));
        }

        found
            .documents
            .insert((partition_key.to_string(), id), document.clone());

        Ok(ItemResponse {
            document,
            charge: self.schedule.upsert(bytes),
        })
    }

    async fn delete_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<RequestCharge, StoreError> {
        check_fault(&self.fault)?;
        let mut collections = self.write()?;
        let found = collections
            .get_mut(collection)
            .ok_or_else(|| missing_collection(collection))?;

        match found
            .documents
            .remove(&(partition_key.to_string(), id.to_string()))
        {
            Some(_) => Ok(self.schedule.remove()),
            None => Err(StoreError::not_found(collection, id, partition_key)),
        }
    }

    async fn query_paged(
        &self,
        collection: &str,
        query: Query,
        partition_key: Option<&str>,
    ) -> Result<Box<dyn PageIterator>, StoreError> {
        let collections = self.read()?;
        let found = collections.get(collection).ok_or_else(|| missing_collection(collection))?;

        let items = found
            .documents
            .iter()
            .filter(|((pk, _), _)| partition_key.map_or(true, |wanted| pk == wanted))
            .filter(|(_, doc)| query.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect::<Vec<_>>();

        let schedule = self.schedule;
        let pages = SnapshotPages::chunked(items, self.page_size, |chunk| {
            schedule.page(chunk.iter().map(encoded_len).sum())
        });

        Ok(Box::new(MemoryPages {
            inner: pages,
            fault: Arc::clone(&self.fault),
        }))
    }
}

/// Snapshot pages that honour the store's injected faults
struct MemoryPages {
    inner: SnapshotPages,
    fault: FaultSlot,
}

#[async_trait]
impl PageIterator for MemoryPages {
    fn has_more(&self) -> bool {
        self.inner.has_more()
    }

    async fn next_page(&mut self) -> Result<Page, StoreError> {
        if !self.inner.has_more() {
            return Err(StoreError::Exhausted);
        }
        check_fault(&self.fault)?;
        self.inner.next_page().await
    }
}

// =============================================================================
// Tests
// =============================================================================
