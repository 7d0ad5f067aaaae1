//! Scripted document store.
//!
//! Replays a fixed sequence of pages for every query and records what it was
//! asked. Used to pin down page charges and mid-drain failures exactly, which
//! the in-memory store only approximates through its charge schedule.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use snip_store::{
    CollectionInfo, DocumentStore, ItemResponse, Page, PageIterator, Query, RequestCharge,
    StoreError,
};

/// A query the store was asked to run
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    /// Collection queried
    pub collection: String,
    /// Query as submitted
    pub query: Query,
    /// Partition scope, `None` for cross-partition
    pub partition_key: Option<String>,
}

#[derive(Default)]
struct Script {
    pages: Vec<Page>,
    fail_at: Option<(usize, StoreError)>,
    point_error: Option<StoreError>,
    queries: Vec<RecordedQuery>,
}

/// `DocumentStore` whose query results are scripted page by page
#[derive(Clone)]
pub struct ScriptedStore {
    info: CollectionInfo,
    write_charge: RequestCharge,
    script: Arc<Mutex<Script>>,
}

impl ScriptedStore {
    /// Store holding one collection partitioned by `partition_key_path`
    pub fn new(collection: &str, partition_key_path: &str) -> Self {
        Self {
            info: CollectionInfo {
                name: collection.to_string(),
                partition_key_path: partition_key_path.to_string(),
            },
            write_charge: RequestCharge::new(5.0),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Pages returned by every query, each with its own items and charge
    pub fn with_pages(self, pages: impl IntoIterator<Item = Page>) -> Self {
        self.edit(|script| script.pages = pages.into_iter().collect());
        self
    }

    /// Fail the page fetch at zero-based `index` with `error`
    pub fn failing_page(self, index: usize, error: StoreError) -> Self {
        self.edit(|script| script.fail_at = Some((index, error)));
        self
    }

    /// Fail every point operation (get, upsert, delete) with `error`
    pub fn failing_point_ops(self, error: StoreError) -> Self {
        self.edit(|script| script.point_error = Some(error));
        self
    }

    /// Charge reported by upserts and deletes
    pub fn with_write_charge(mut self, charge: f64) -> Self {
        self.write_charge = RequestCharge::new(charge);
        self
    }

    /// Queries received so far, oldest first
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.script
            .lock()
            .map(|script| script.queries.clone())
            .unwrap_or_default()
    }

    fn edit(&self, f: impl FnOnce(&mut Script)) {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Script>, StoreError> {
        self.script
            .lock()
            .map_err(|_| StoreError::unavailable("scripted store lock poisoned"))
    }

    fn check_collection(&self, collection: &str) -> Result<(), StoreError> {
        if collection != self.info.name {
            return Err(StoreError::Configuration(format!(
                "collection '{}' does not exist",
                collection
            )));
        }
        Ok(())
    }

    fn check_point_op(&self, collection: &str) -> Result<(), StoreError> {
        self.check_collection(collection)?;
        match &self.lock()?.point_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn read_collection(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        self.check_collection(collection)?;
        Ok(self.info.clone())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        self.check_point_op(collection)?;
        Err(StoreError::not_found(collection, id, partition_key))
    }

    async fn upsert_document(
        &self,
        collection: &str,
        document: Value,
        _partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        self.check_point_op(collection)?;
        Ok(ItemResponse {
            document,
            charge: self.write_charge,
        })
    }

    async fn delete_document(
        &self,
        collection: &str,
        _id: &str,
        _partition_key: &str,
    ) -> Result<RequestCharge, StoreError> {
        self.check_point_op(collection)?;
        Ok(self.write_charge)
    }

    async fn query_paged(
        &self,
        collection: &str,
        query: Query,
        partition_key: Option<&str>,
    ) -> Result<Box<dyn PageIterator>, StoreError> {
        self.check_collection(collection)?;

        let mut script = self.lock()?;
        script.queries.push(RecordedQuery {
            collection: collection.to_string(),
            query,
            partition_key: partition_key.map(str::to_string),
        });

        Ok(Box::new(ScriptedPages {
            pages: script.pages.iter().cloned().collect(),
            fail_at: script.fail_at.clone(),
            fetched: 0,
        }))
    }
}

/// Replays the scripted pages once
struct ScriptedPages {
    pages: VecDeque<Page>,
    fail_at: Option<(usize, StoreError)>,
    fetched: usize,
}

#[async_trait]
impl PageIterator for ScriptedPages {
    fn has_more(&self) -> bool {
        !self.pages.is_empty()
    }

    async fn next_page(&mut self) -> Result<Page, StoreError> {
        let index = self.fetched;
        self.fetched += 1;

        if let Some((fail_index, error)) = &self.fail_at {
            if *fail_index == index {
                return Err(error.clone());
            }
        }
        self.pages.pop_front().ok_or(StoreError::Exhausted)
    }
}
