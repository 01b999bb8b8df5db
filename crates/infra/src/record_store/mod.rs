//! Document store abstraction the pipelines read and write records through.
//!
//! Records are JSON documents keyed by `(collection, id)`. The store offers exactly the
//! capabilities the pipelines need: whole-document get/set/delete, a nested-field update
//! and an equality filter on one top-level field.
//!
//! ## Semantics
//!
//! - `set` replaces the whole document (last writer wins)
//! - `update` fails with [`StoreError::NotFound`] when the document does not exist
//! - `delete` fails with [`StoreError::NotFound`] when the document does not exist, so
//!   callers can tell "already gone" from a transient failure

mod in_memory;
mod postgres;
mod typed;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use typed::{find_by_owner, load, save};

/// Collections the pipelines touch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Receipts,
    Queries,
    WalletPasses,
    StockItems,
    ThirdPartyBills,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Receipts => "receipts",
            Collection::Queries => "queries",
            Collection::WalletPasses => "wallet_passes",
            Collection::StockItems => "stock_items",
            Collection::ThirdPartyBills => "third_party_bills",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set one (possibly nested) field. `path` is dot-separated: `"data.status"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: String,
    pub value: JsonValue,
}

impl FieldUpdate {
    pub fn new(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    pub(crate) fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.').filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or failing; worth retrying.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    /// A document could not be encoded, decoded or patched.
    #[error("document serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn not_found(collection: Collection, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

/// Async document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<JsonValue, StoreError>;

    async fn set(&self, collection: Collection, id: &str, document: JsonValue)
    -> Result<(), StoreError>;

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Documents whose top-level `field` equals `value`, in no particular order.
    async fn filter_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn get(&self, collection: Collection, id: &str) -> Result<JsonValue, StoreError> {
        (**self).get(collection, id).await
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        document: JsonValue,
    ) -> Result<(), StoreError> {
        (**self).set(collection, id, document).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), StoreError> {
        (**self).update(collection, id, updates).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        (**self).delete(collection, id).await
    }

    async fn filter_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError> {
        (**self).filter_by_field(collection, field, value).await
    }
}
