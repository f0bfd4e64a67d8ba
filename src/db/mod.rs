pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Every persisted collection. Each maps to its own JSONB table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Blogs,
    Events,
    Projects,
    Services,
    Statistics,
    LinkedInPosts,
    Contacts,
    Subscribers,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Blogs,
        Collection::Events,
        Collection::Projects,
        Collection::Services,
        Collection::Statistics,
        Collection::LinkedInPosts,
        Collection::Contacts,
        Collection::Subscribers,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Blogs => "blogs",
            Collection::Events => "events",
            Collection::Projects => "projects",
            Collection::Services => "services",
            Collection::Statistics => "statistics",
            Collection::LinkedInPosts => "linkedin_posts",
            Collection::Contacts => "contacts",
            Collection::Subscribers => "newsletter_subscribers",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// A stored document: generated id, creation stamp, and a JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub body: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("{0}")]
    Conflict(String),

    #[error("document body must be a JSON object")]
    NotAnObject,

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict("Duplicate value for a unique field".to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam shared by every handler.
///
/// Single-document operations are atomic; nothing spans documents.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Document>;

    /// All documents, newest first.
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    /// One page of documents whose body contains every field of `filter`,
    /// newest first, together with the total number of matches.
    async fn list_page(
        &self,
        collection: Collection,
        filter: Option<Value>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Document>, i64)>;

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>>;

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>>;

    /// Shallow-merges `patch` into the body. `None` when the id does not
    /// exist or the merge would not change anything.
    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> StoreResult<Option<Document>>;

    /// Atomically adds one to a numeric field (missing counts as zero).
    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
    ) -> StoreResult<Option<Document>>;

    /// `true` when a document was removed.
    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool>;

    /// Round-trip latency to the backend.
    async fn ping(&self) -> StoreResult<std::time::Duration>;

    async fn close(&self);
}

/// Applies a shallow merge, reporting whether anything changed.
pub(crate) fn merge_into(body: &mut Value, patch: &Value) -> StoreResult<bool> {
    let (Some(target), Some(fields)) = (body.as_object_mut(), patch.as_object()) else {
        return Err(StoreError::NotAnObject);
    };
    let mut changed = false;
    for (key, value) in fields {
        if target.get(key) != Some(value) {
            target.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    Ok(changed)
}

/// `true` when every field of `filter` is present in `body` with an equal value.
pub(crate) fn matches_filter(body: &Value, filter: Option<&Value>) -> bool {
    let Some(fields) = filter.and_then(Value::as_object) else {
        return true;
    };
    fields
        .iter()
        .all(|(key, expected)| body.get(key) == Some(expected))
}
