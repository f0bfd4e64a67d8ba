use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{Collection, DbConfig, Document, Store, StoreError, StoreResult};

type Row = (Uuid, Value, DateTime<Utc>);

fn into_document((id, body, created_at): Row) -> Document {
    Document {
        id,
        created_at,
        body,
    }
}

/// Postgres-backed store: one `(id, body JSONB, created_at)` table per collection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("Initializing database connection pool...");
        tracing::debug!(
            "Database URL: {}",
            config.url.replace(
                |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
                "*"
            )
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        tracing::info!("Database connection pool initialized successfully");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Running database migrations...");

        for collection in Collection::ALL {
            let table = collection.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id UUID PRIMARY KEY,
                    body JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at DESC)"
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email
                ON users ((lower(body->>'email')))
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_newsletter_subscribers_active
                ON newsletter_subscribers ((body->>'isActive'))
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Document> {
        if !body.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let row: Row = sqlx::query_as(&format!(
            "INSERT INTO {} (id, body, created_at) VALUES ($1, $2, now()) \
             RETURNING id, body, created_at",
            collection.table()
        ))
        .bind(Uuid::new_v4())
        .bind(&body)
        .fetch_one(&self.pool)
        .await?;
        Ok(into_document(row))
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let rows: Vec<Row> = sqlx::query_as(&format!(
            "SELECT id, body, created_at FROM {} ORDER BY created_at DESC",
            collection.table()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn list_page(
        &self,
        collection: Collection,
        filter: Option<Value>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<Document>, i64)> {
        let table = collection.table();
        let rows: Vec<Row> = sqlx::query_as(&format!(
            "SELECT id, body, created_at FROM {table} \
             WHERE ($1::jsonb IS NULL OR body @> $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&filter)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {table} WHERE ($1::jsonb IS NULL OR body @> $1)"
        ))
        .bind(&filter)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(into_document).collect(), total.0))
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        let row: Option<Row> = sqlx::query_as(&format!(
            "SELECT id, body, created_at FROM {} WHERE id = $1",
            collection.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_document))
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Document>> {
        let row: Option<Row> = sqlx::query_as(&format!(
            "SELECT id, body, created_at FROM {} WHERE body->>$1 = $2 \
             ORDER BY created_at DESC LIMIT 1",
            collection.table()
        ))
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_document))
    }

    async fn merge(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Value,
    ) -> StoreResult<Option<Document>> {
        if !patch.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let row: Option<Row> = sqlx::query_as(&format!(
            "UPDATE {} SET body = body || $2 \
             WHERE id = $1 AND (body || $2) IS DISTINCT FROM body \
             RETURNING id, body, created_at",
            collection.table()
        ))
        .bind(id)
        .bind(&patch)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_document))
    }

    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
    ) -> StoreResult<Option<Document>> {
        let row: Option<Row> = sqlx::query_as(&format!(
            "UPDATE {} \
             SET body = jsonb_set(body, ARRAY[$2::text], \
                 to_jsonb(COALESCE((body->>$2)::bigint, 0) + 1)) \
             WHERE id = $1 \
             RETURNING id, body, created_at",
            collection.table()
        ))
        .bind(id)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(into_document))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", collection.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    async fn close(&self) {
        tracing::info!("Closing database connection pool");
        self.pool.close().await;
    }
}
