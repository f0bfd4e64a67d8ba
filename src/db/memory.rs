use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    matches_filter, merge_into, Collection, Document, Store, StoreError, StoreResult,
};

/// In-process store with the same semantics as [`super::PgStore`].
///
/// Documents are kept in insertion order; reads return newest first.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    failing: RwLock<HashSet<Collection>>,
    unreachable: AtomicBool,
    operations: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent operation on `collection` fails with a backend error.
    pub async fn fail_collection(&self, collection: Collection) {
        self.failing.write().await.insert(collection);
    }

    /// Every subsequent ping fails, as if the backend were down.
    pub fn fail_ping(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    /// Number of store operations attempted so far.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of documents currently held in `collection`.
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }

    async fn begin(&self, collection: Collection) -> StoreResult<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().await.contains(&collection) {
            return Err(StoreError::Backend(format!(
                "collection {} is unavailable",
                collection
            )));
        }
        Ok(())
    }
}

fn newest_first(docs: &[Document]) -> Vec<Document> {
    let mut out: Vec<Document> = docs.iter().rev().cloned().collect();
    // stable: equal stamps keep reverse insertion order
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

fn same_email(body: &Value, email: &str) -> bool {
    body.get("email")
        .and_then(Value::as_str)
        .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Document> {
        self.begin(collection).await?;
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if collection == Collection::Users {
            if let Some(email) = body.get("email").and_then(Value::as_str) {
                if docs.iter().any(|d| same_email(&d.body, email)) {
                    return Err(StoreError::Conflict(
                        "Duplicate value for a unique field".to_string(),
                    ));
                }
            }
        }

        let doc = Document {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            body,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.begin(collection).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| newest_first(docs))
            .unwrap_or_default())
    }

    async fn list_page(
        &self,
        collection: Collection,
        filter: Option<Value>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Document>, i64)> {
        self.begin(collection).await?;
        let collections = self.collections.read().await;
        let matching: Vec<Document> = collections
            .get(&collection)
            .map(|docs| newest_first(docs))
            .unwrap_or_default()
            .into_iter()
            .filter(|d| matches_filter(&d.body, filter.as_ref()))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        self.begin(collection).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        self.begin(collection).await?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| {
            newest_first(docs)
                .into_iter()
                .find(|d| d.body.get(field).and_then(Value::as_str) == Some(value))
        }))
    }

    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> StoreResult<Option<Document>> {
        self.begin(collection).await?;
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };
        if merge_into(&mut doc.body, &patch)? {
            Ok(Some(doc.clone()))
        } else {
            Ok(None)
        }
    }

    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
    ) -> StoreResult<Option<Document>> {
        self.begin(collection).await?;
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };
        let current = doc.body.get(field).and_then(Value::as_i64).unwrap_or(0);
        let fields = doc.body.as_object_mut().ok_or(StoreError::NotAnObject)?;
        fields.insert(field.to_string(), Value::from(current + 1));
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool> {
        self.begin(collection).await?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() < before)
    }

    async fn ping(&self) -> StoreResult<Duration> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store is unreachable".to_string()));
        }
        Ok(Duration::ZERO)
    }

    async fn close(&self) {}
}
