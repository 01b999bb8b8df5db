//! Typed access on top of the JSON document store.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use raseed_core::{Entity, OwnerId};

use super::{Collection, DocumentStore, StoreError};

/// Load and decode one record.
pub async fn load<T, S>(store: &S, collection: Collection, id: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    let document = store.get(collection, id).await?;
    serde_json::from_value(document)
        .map_err(|e| StoreError::Serialization(format!("{collection}/{id}: {e}")))
}

/// Encode and store a record under its own id (whole-document replace).
pub async fn save<T, S>(store: &S, collection: Collection, record: &T) -> Result<(), StoreError>
where
    T: Entity + Serialize,
    S: DocumentStore + ?Sized,
{
    let document = serde_json::to_value(record)
        .map_err(|e| StoreError::Serialization(format!("{collection}: {e}")))?;
    store.set(collection, record.id().as_ref(), document).await
}

/// Every record of `collection` owned by `owner`.
///
/// Documents that no longer decode are skipped with a warning.
pub async fn find_by_owner<T, S>(
    store: &S,
    collection: Collection,
    owner: &OwnerId,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    let documents = store
        .filter_by_field(collection, "user_id", &json!(owner.as_str()))
        .await?;

    Ok(documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %collection, owner = %owner, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect())
}
