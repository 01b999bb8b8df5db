use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use super::{Collection, DocumentStore, FieldUpdate, StoreError};

/// In-memory document store for tests/dev.
///
/// Can be switched into an "unavailable" mode to exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<HashMap<(Collection, String), JsonValue>>,
    unavailable: RwLock<bool>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`] (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.write() {
            *flag = unavailable;
        }
    }

    /// Ids stored in `collection`, sorted.
    pub fn ids(&self, collection: Collection) -> Vec<String> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        let mut ids: Vec<String> = map
            .keys()
            .filter(|(c, _)| *c == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match self.unavailable.read() {
            Ok(flag) if !*flag => Ok(()),
            _ => Err(StoreError::Unavailable("in-memory store offline".to_string())),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<(Collection, String), JsonValue>>, StoreError> {
        self.check_available()?;
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<(Collection, String), JsonValue>>, StoreError> {
        self.check_available()?;
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

/// Set `value` at a dotted path, creating intermediate objects as needed.
pub(crate) fn apply_update(document: &mut JsonValue, update: &FieldUpdate) -> Result<(), StoreError> {
    let segments: Vec<&str> = update.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(StoreError::Serialization("empty update path".to_string()));
    };

    let mut cursor = document;
    for segment in parents {
        let object = cursor.as_object_mut().ok_or_else(|| {
            StoreError::Serialization(format!("{}: {segment} is not inside an object", update.path))
        })?;
        cursor = object
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
    }

    let object = cursor.as_object_mut().ok_or_else(|| {
        StoreError::Serialization(format!("{}: parent is not an object", update.path))
    })?;
    object.insert(last.to_string(), update.value.clone());
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<JsonValue, StoreError> {
        self.read()?
            .get(&(collection, id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn set(
        &self,
        collection: Collection,
        id: &str,
        document: JsonValue,
    ) -> Result<(), StoreError> {
        self.write()?.insert((collection, id.to_string()), document);
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), StoreError> {
        let mut map = self.write()?;
        let document = map
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        // Patch a copy so a failing update leaves the document untouched.
        let mut patched = document.clone();
        for update in updates {
            apply_update(&mut patched, update)?;
        }
        *document = patched;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.write()?
            .remove(&(collection, id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn filter_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<JsonValue>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter(|((c, _), doc)| *c == collection && doc.get(field) == Some(value))
            .map(|(_, doc)| doc.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.get(Collection::Receipts, "r1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn nested_update_creates_intermediate_objects() {
        let store = InMemoryDocumentStore::new();
        store
            .set(Collection::WalletPasses, "p1", json!({"title": "old"}))
            .await
            .unwrap();

        store
            .update(
                Collection::WalletPasses,
                "p1",
                &[
                    FieldUpdate::new("title", "new"),
                    FieldUpdate::new("data.status", "expired"),
                ],
            )
            .await
            .unwrap();

        let doc = store.get(Collection::WalletPasses, "p1").await.unwrap();
        assert_eq!(doc, json!({"title": "new", "data": {"status": "expired"}}));
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let store = InMemoryDocumentStore::new();
        store
            .set(Collection::Queries, "q1", json!({"response": "", "n": 1}))
            .await
            .unwrap();

        let res = store
            .update(
                Collection::Queries,
                "q1",
                &[FieldUpdate::new("response", "hi"), FieldUpdate::new("n.deeper", 2)],
            )
            .await;

        assert!(matches!(res, Err(StoreError::Serialization(_))));
        let doc = store.get(Collection::Queries, "q1").await.unwrap();
        assert_eq!(doc["response"], "");
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_documents_are_not_found() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            store
                .update(Collection::Queries, "q1", &[FieldUpdate::new("response", "x")])
                .await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete(Collection::WalletPasses, "stock_s1").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn filter_matches_top_level_field_within_collection() {
        let store = InMemoryDocumentStore::new();
        store.set(Collection::Receipts, "r1", json!({"user_id": "u1"})).await.unwrap();
        store.set(Collection::Receipts, "r2", json!({"user_id": "u2"})).await.unwrap();
        store.set(Collection::Queries, "q1", json!({"user_id": "u1"})).await.unwrap();

        let found = store
            .filter_by_field(Collection::Receipts, "user_id", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(found, vec![json!({"user_id": "u1"})]);
    }

    #[tokio::test]
    async fn unavailable_mode_fails_every_call() {
        let store = InMemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get(Collection::Receipts, "r1").await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.set(Collection::Receipts, "r1", json!({})).await.is_ok());
    }
}
