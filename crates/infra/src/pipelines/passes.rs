use raseed_wallet::WalletPass;

use crate::record_store::{Collection, DocumentStore, StoreError, load, save};

/// Create the pass, or refresh it in place keeping its original `created_at`.
///
/// Works whether or not a previous delivery already created it, so `updated` may be
/// handled before `created`.
pub async fn upsert_pass<S>(store: &S, pass: WalletPass) -> Result<WalletPass, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let stored = match load::<WalletPass, _>(store, Collection::WalletPasses, pass.id.as_str()).await
    {
        Ok(existing) => existing.refreshed_by(pass),
        Err(StoreError::NotFound { .. }) => pass,
        Err(e) => return Err(e),
    };

    save(store, Collection::WalletPasses, &stored).await?;
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::InMemoryDocumentStore;
    use chrono::{Duration, Utc};
    use raseed_core::{OwnerId, PassId};
    use raseed_wallet::PassKind;
    use serde_json::json;

    fn pass(title: &str, at: chrono::DateTime<Utc>) -> WalletPass {
        WalletPass::new(
            PassId::new("stock_s1"),
            OwnerId::new("u1"),
            PassKind::StockItem,
            title,
            "Quantity: 1 l, Expires: 2026-10-20",
            json!({}),
            at,
        )
    }

    #[tokio::test]
    async fn refresh_keeps_created_at_and_stamps_updated_at() {
        let store = InMemoryDocumentStore::new();
        let first = Utc::now();
        let later = first + Duration::hours(1);

        upsert_pass(&store, pass("Stock - Milk", first)).await.unwrap();
        let refreshed = upsert_pass(&store, pass("Stock - Oat Milk", later)).await.unwrap();

        assert_eq!(refreshed.created_at, first);
        assert_eq!(refreshed.updated_at, Some(later));
        assert_eq!(refreshed.title, "Stock - Oat Milk");
        assert_eq!(store.ids(Collection::WalletPasses), vec!["stock_s1".to_string()]);
    }

    #[tokio::test]
    async fn missing_pass_is_created() {
        let store = InMemoryDocumentStore::new();
        let created = upsert_pass(&store, pass("Stock - Milk", Utc::now())).await.unwrap();
        assert!(created.updated_at.is_none());
    }
}
