//! PostgreSQL document store.
//!
//! Documents live as JSONB rows in the `documents` table, keyed by
//! `(collection, partition_key, id)`. The `collections` table records each
//! collection's partition key path. Queries page with a keyset continuation
//! on `(partition_key, id)`, which is also the natural scan order.
//!
//! PostgreSQL does not meter requests, so charges come from a `ChargeSchedule`.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::charge::{ChargeSchedule, RequestCharge};
use crate::error::StoreError;
use crate::ports::{CollectionInfo, DocumentStore, ItemResponse, Page, PageIterator};
use crate::query::{Condition, Query};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

/// PostgreSQL adapter implementing `DocumentStore`
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    page_size: usize,
    schedule: ChargeSchedule,
}

impl PgDocumentStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, page_size: usize) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
            schedule: ChargeSchedule::default(),
        }
    }

    /// Connect to `database_url`
    pub async fn connect(database_url: &str, page_size: usize) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, page_size))
    }

    /// Set the cost model
    pub fn with_schedule(mut self, schedule: ChargeSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn partition_key_path(&self, collection: &str) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT partition_key_path FROM collections WHERE name = $1")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("partition_key_path")?),
            None => Err(StoreError::Configuration(format!(
                "collection '{}' does not exist",
                collection
            ))),
        }
    }

    /// Distinguish a missing document from a missing collection
    async fn not_found(&self, collection: &str, id: &str, partition_key: &str) -> StoreError {
        match self.partition_key_path(collection).await {
            Ok(_) => StoreError::not_found(collection, id, partition_key),
            Err(e) => e,
        }
    }
}

fn encoded_len(document: &Value) -> usize {
    serde_json::to_vec(document).map(|b| b.len()).unwrap_or(0)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn read_collection(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        let partition_key_path = self.partition_key_path(collection).await?;
        Ok(CollectionInfo {
            name: collection.to_string(),
            partition_key_path,
        })
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND partition_key = $2 AND id = $3
            "#,
        )
        .bind(collection)
        .bind(partition_key)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(self.not_found(collection, id, partition_key).await);
        };

        let Json(document) = row.try_get::<Json<Value>, _>("body")?;
        let charge = self.schedule.read(encoded_len(&document));
        Ok(ItemResponse { document, charge })
    }

    async fn upsert_document(
        &self,
        collection: &str,
        document: Value,
        partition_key: &str,
    ) -> Result<ItemResponse, StoreError> {
        let path = self.partition_key_path(collection).await?;
        let field = path.trim_start_matches('/');

        if !document.is_object() {
            return Err(StoreError::conflict("document must be a JSON object"));
        }
        let id = match document.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(StoreError::conflict("document must carry a non-empty string 'id'")),
        };
        if document.get(field).and_then(Value::as_str) != Some(partition_key) {
            return Err(StoreError::conflict(format!(
                "partition key '{}' does not match document property '{}'",
                partition_key, field
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO documents (collection, partition_key, id, body, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (collection, partition_key, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            RETURNING body
            "#,
        )
        .bind(collection)
        .bind(partition_key)
        .bind(&id)
        .bind(Json(&document))
        .fetch_one(&self.pool)
        .await?;

        let Json(stored) = row.try_get::<Json<Value>, _>("body")?;
        let charge = self.schedule.upsert(encoded_len(&stored));
        debug!(collection, id = %id, partition_key, charge = %charge, "Document upserted");
        Ok(ItemResponse {
            document: stored,
            charge,
        })
    }

    async fn delete_document(
        &self,
        collection: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<RequestCharge, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND partition_key = $2 AND id = $3
            "#,
        )
        .bind(collection)
        .bind(partition_key)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(collection, id, partition_key).await);
        }
        Ok(self.schedule.remove())
    }

    async fn query_paged(
        &self,
        collection: &str,
        query: Query,
        partition_key: Option<&str>,
    ) -> Result<Box<dyn PageIterator>, StoreError> {
        self.partition_key_path(collection).await?;

        debug!(
            collection,
            query = %query.text(),
            partition_key = partition_key.unwrap_or("*"),
            "Starting paged query"
        );

        Ok(Box::new(PgPages {
            pool: self.pool.clone(),
            collection: collection.to_string(),
            conditions: query.conditions().to_vec(),
            partition_key: partition_key.map(str::to_string),
            page_size: self.page_size,
            schedule: self.schedule,
            after: None,
            done: false,
        }))
    }
}

// =============================================================================
// Keyset Page Iterator
// =============================================================================

/// Pages through `documents` ordered by `(partition_key, id)`.
///
/// Each fetch asks for one row more than the page size; the extra row only
/// signals that another page exists and is not returned.
struct PgPages {
    pool: PgPool,
    collection: String,
    conditions: Vec<Condition>,
    partition_key: Option<String>,
    page_size: usize,
    schedule: ChargeSchedule,
    /// Continuation key: last `(partition_key, id)` returned
    after: Option<(String, String)>,
    done: bool,
}

impl PgPages {
    fn sql(&self) -> String {
        let mut sql = String::from(
            "SELECT partition_key, id, body FROM documents WHERE collection = $1",
        );
        let mut bind_count = 1;

        if self.partition_key.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND partition_key = ${}", bind_count));
        }

        if self.after.is_some() {
            sql.push_str(&format!(
                " AND (partition_key, id) > (${}, ${})",
                bind_count + 1,
                bind_count + 2
            ));
            bind_count += 2;
        }

        for _ in &self.conditions {
            sql.push_str(&format!(
                " AND body -> ${} = ${}",
                bind_count + 1,
                bind_count + 2
            ));
            bind_count += 2;
        }

        sql.push_str(&format!(
            " ORDER BY partition_key ASC, id ASC LIMIT ${}",
            bind_count + 1
        ));
        sql
    }
}

#[async_trait]
impl PageIterator for PgPages {
    fn has_more(&self) -> bool {
        !self.done
    }

    async fn next_page(&mut self) -> Result<Page, StoreError> {
        if self.done {
            return Err(StoreError::Exhausted);
        }

        let sql = self.sql();
        let mut q = sqlx::query(&sql).bind(&self.collection);

        if let Some(ref partition_key) = self.partition_key {
            q = q.bind(partition_key);
        }
        if let Some((ref pk, ref id)) = self.after {
            q = q.bind(pk).bind(id);
        }
        for condition in &self.conditions {
            q = q.bind(&condition.field).bind(Json(&condition.value));
        }
        q = q.bind((self.page_size + 1) as i64);

        let rows = q.fetch_all(&self.pool).await?;

        let mut keys = Vec::with_capacity(rows.len());
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let pk: String = row.try_get("partition_key")?;
            let id: String = row.try_get("id")?;
            let Json(body) = row.try_get::<Json<Value>, _>("body")?;
            keys.push((pk, id));
            items.push(body);
        }

        let has_more = items.len() > self.page_size;
        if has_more {
            items.truncate(self.page_size);
            keys.truncate(self.page_size);
        }
        self.after = keys.pop();
        self.done = !has_more;

        let bytes = items.iter().map(encoded_len).sum();
        Ok(Page {
            items,
            charge: self.schedule.page(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(partition_key: Option<&str>, after: Option<(&str, &str)>, query: Query) -> PgPages {
        PgPages {
            pool: PgPoolOptions::new().connect_lazy("postgres://localhost/unused").unwrap(),
            collection: "snips".to_string(),
            conditions: query.conditions().to_vec(),
            partition_key: partition_key.map(str::to_string),
            page_size: 10,
            schedule: ChargeSchedule::default(),
            after: after.map(|(p, i)| (p.to_string(), i.to_string())),
            done: false,
        }
    }

    #[tokio::test]
    async fn test_sql_cross_partition() {
        let sql = pages(None, None, Query::select_all()).sql();
        assert_eq!(
            sql,
            "SELECT partition_key, id, body FROM documents WHERE collection = $1 \
             ORDER BY partition_key ASC, id ASC LIMIT $2"
        );
    }

    #[tokio::test]
    async fn test_sql_partition_with_continuation_and_condition() {
        let query = Query::select_all().where_eq("userId", "u1");
        let sql = pages(Some("u1"), Some(("u1", "s9")), query).sql();
        assert_eq!(
            sql,
            "SELECT partition_key, id, body FROM documents WHERE collection = $1 \
             AND partition_key = $2 AND (partition_key, id) > ($3, $4) \
             AND body -> $5 = $6 ORDER BY partition_key ASC, id ASC LIMIT $7"
        );
    }
}
