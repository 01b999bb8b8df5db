//! Postgres-backed document store.
//!
//! All collections share one JSONB table keyed by `(collection, id)`:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT NOT NULL,
//!     id         TEXT NOT NULL,
//!     body       JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError | Scenario |
//! |------------|------------|----------|
//! | Database (`22P02`, `22023`) | `Serialization` | Malformed JSON path or value |
//! | Database (other) | `Unavailable` | Constraint/lock/server errors |
//! | PoolClosed, Io, Tls, PoolTimedOut | `Unavailable` | Connection problems |
//! | ColumnDecode, Decode | `Serialization` | Stored body is not valid JSON |
//!
//! Nested updates are applied in Rust on a row locked with `SELECT ... FOR UPDATE`, so
//! intermediate objects are created exactly as the in-memory store creates them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::instrument;

use super::in_memory::apply_update;
use super::{Collection, DocumentStore, FieldUpdate, StoreError};

/// DDL for the documents table; idempotent.
pub const DOCUMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS documents_user_id_idx
    ON documents (collection, (body ->> 'user_id'));
"#;

/// Document store over a single Postgres JSONB table.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the documents table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(DOCUMENTS_SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), fields(collection = %collection))]
    async fn get(&self, collection: Collection, id: &str) -> Result<JsonValue, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        row.try_get::<JsonValue, _>("body")
            .map_err(|e| map_sqlx_error("get", e))
    }

    #[instrument(skip(self, document), fields(collection = %collection))]
    async fn set(
        &self,
        collection: Collection,
        id: &str,
        document: JsonValue,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set", e))?;
        Ok(())
    }

    #[instrument(skip(self, updates), fields(collection = %collection, update_count = updates.len()))]
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        let row = sqlx::query(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?
        .ok_or_else(|| StoreError::not_found(collection, id))?;

        let mut body: JsonValue = row
            .try_get("body")
            .map_err(|e| map_sqlx_error("update", e))?;
        for update in updates {
            apply_update(&mut body, update)?;
        }

        sqlx::query(
            "UPDATE documents SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(body)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("update", e))
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    #[instrument(skip(self, value), fields(collection = %collection))]
    async fn filter_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let rows = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND body -> $2 = $3")
            .bind(collection.as_str())
            .bind(field)
            .bind(value)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("filter_by_field", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<JsonValue, _>("body")
                    .map_err(|e| map_sqlx_error("filter_by_field", e))
            })
            .collect()
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("22P02") | Some("22023") => StoreError::Serialization(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("failed to decode document in {operation}: {err}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
