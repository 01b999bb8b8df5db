use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, instrument};

use raseed_core::StockItemId;
use raseed_events::{
    Disposition, Envelope, EventBus, EventHandler, NotificationKind, NotificationRequested,
    Topic, publish_event,
};
use raseed_inventory::{FreshnessStatus, StockAction, StockItem, StockMutated};
use raseed_wallet::{PassKind, WalletPass, stock_pass_id};

use super::{PipelineError, decode, settle, upsert_pass};
use crate::record_store::{Collection, DocumentStore, StoreError, load};

/// What one stock event led to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StockOutcome {
    pub notified: bool,
    pub pass_refreshed: bool,
    pub pass_deleted: bool,
}

/// `stock-management`: expiry notifications and `stock_<id>` passes.
///
/// Freshness status is taken as computed by the request layer; it is never
/// recomputed here.
#[derive(Clone)]
pub struct StockPipeline {
    store: Arc<dyn DocumentStore>,
    bus: Arc<dyn EventBus>,
}

impl StockPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    #[instrument(skip_all, fields(item_id = %event.item_id, action = ?event.action))]
    pub async fn process(&self, event: &StockMutated) -> Result<StockOutcome, PipelineError> {
        match event.action {
            StockAction::Created | StockAction::Updated => self.sync(event).await,
            StockAction::Deleted => self.remove_pass(event).await,
        }
    }

    async fn sync(&self, event: &StockMutated) -> Result<StockOutcome, PipelineError> {
        let item: StockItem =
            load(&*self.store, Collection::StockItems, event.item_id.as_str()).await?;

        // `created` trusts the stored record; `updated` reports the status it moved to.
        let status = match event.action {
            StockAction::Updated => event.status.unwrap_or(item.status),
            _ => item.status,
        };

        let mut outcome = StockOutcome::default();

        if item.perishable_category().is_some() {
            upsert_pass(&*self.store, stock_pass(&item, Utc::now())).await?;
            outcome.pass_refreshed = true;
        } else {
            // The item may have been perishable before this update.
            debug!(category = %item.category, "not perishable; no stock pass");
            outcome.pass_deleted = self.delete_pass(&item.id).await?;
        }

        if status.needs_attention() {
            publish_event(&*self.bus, &expiry_notification(&item, status))?;
            outcome.notified = true;
        }

        Ok(outcome)
    }

    async fn remove_pass(&self, event: &StockMutated) -> Result<StockOutcome, PipelineError> {
        Ok(StockOutcome {
            pass_deleted: self.delete_pass(&event.item_id).await?,
            ..StockOutcome::default()
        })
    }

    /// Delete the item's pass; a pass that is already gone is not an error.
    async fn delete_pass(&self, item_id: &StockItemId) -> Result<bool, PipelineError> {
        let pass_id = stock_pass_id(item_id);
        match self
            .store
            .delete(Collection::WalletPasses, pass_id.as_str())
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { .. }) => {
                debug!(pass_id = %pass_id, "no stock pass to delete");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn stock_pass(item: &StockItem, now: chrono::DateTime<Utc>) -> WalletPass {
    WalletPass::new(
        stock_pass_id(&item.id),
        item.user_id.clone(),
        PassKind::StockItem,
        format!("Stock - {}", item.name),
        format!(
            "Quantity: {} {}, Expires: {}",
            item.quantity,
            item.unit,
            item.expiry_day()
        ),
        json!({
            "item_id": item.id,
            "name": item.name,
            "category": item.category,
            "quantity": item.quantity,
            "unit": item.unit,
            "expiry_date": item.expiry_date,
            "status": item.status,
        }),
        now,
    )
}

fn expiry_notification(item: &StockItem, status: FreshnessStatus) -> NotificationRequested {
    NotificationRequested {
        user_id: item.user_id.clone(),
        kind: NotificationKind::StockExpiry,
        title: "Item Expiry Alert".to_string(),
        message: format!("{} is {}", item.name, status),
        data: json!({
            "item_id": item.id,
            "item_name": item.name,
            "status": status,
            "expiry_date": item.expiry_date,
        }),
    }
}

#[async_trait]
impl EventHandler for StockPipeline {
    fn name(&self) -> &'static str {
        "stock-pipeline"
    }

    fn topic(&self) -> Topic {
        Topic::StockManagement
    }

    async fn handle(&self, envelope: &Envelope) -> Disposition {
        let result = match decode::<StockMutated>(envelope) {
            Ok(event) => self.process(&event).await,
            Err(e) => Err(e),
        };
        settle(self.name(), envelope, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::{InMemoryDocumentStore, save};
    use chrono::{DateTime, Duration};
    use proptest::prelude::*;
    use raseed_core::OwnerId;
    use raseed_events::InMemoryEventBus;

    struct Fixture {
        store: Arc<InMemoryDocumentStore>,
        bus: Arc<InMemoryEventBus>,
        pipeline: StockPipeline,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let pipeline = StockPipeline::new(store.clone(), bus.clone());
        Fixture {
            store,
            bus,
            pipeline,
        }
    }

    fn item(category: &str, expires_in: Duration, now: DateTime<Utc>) -> StockItem {
        StockItem::new(
            StockItemId::new("s1"),
            OwnerId::new("u1"),
            "Milk",
            category,
            2,
            "l",
            now - Duration::days(3),
            now + expires_in,
            now,
        )
    }

    fn mutated(action: StockAction, status: Option<FreshnessStatus>) -> StockMutated {
        StockMutated {
            item_id: StockItemId::new("s1"),
            user_id: OwnerId::new("u1"),
            action,
            status,
        }
    }

    #[tokio::test]
    async fn expired_dairy_on_create_notifies_once_and_derives_pass() {
        let f = fixture();
        let now = Utc::now();
        let milk = item("dairy", -Duration::days(1), now);
        assert_eq!(milk.status, FreshnessStatus::Expired);
        save(&*f.store, Collection::StockItems, &milk).await.unwrap();

        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Created, Some(FreshnessStatus::Expired)))
            .await
            .unwrap();
        assert!(outcome.notified && outcome.pass_refreshed);

        let notifications = f.bus.published(Topic::NotificationEvents);
        assert_eq!(notifications.len(), 1);
        let n: NotificationRequested = notifications[0].decode().unwrap();
        assert_eq!(n.title, "Item Expiry Alert");
        assert_eq!(n.message, "Milk is expired");
        assert_eq!(n.data["item_id"], "s1");

        let pass: WalletPass = load(&*f.store, Collection::WalletPasses, "stock_s1").await.unwrap();
        assert_eq!(pass.title, "Stock - Milk");
        assert_eq!(
            pass.description,
            format!("Quantity: 2 l, Expires: {}", milk.expiry_day())
        );
    }

    #[tokio::test]
    async fn fresh_items_never_notify() {
        let f = fixture();
        let now = Utc::now();
        save(&*f.store, Collection::StockItems, &item("dairy", Duration::days(30), now))
            .await
            .unwrap();

        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Created, Some(FreshnessStatus::Fresh)))
            .await
            .unwrap();

        assert!(!outcome.notified);
        assert!(f.bus.published(Topic::NotificationEvents).is_empty());
    }

    #[tokio::test]
    async fn update_notifies_on_event_status() {
        let f = fixture();
        let now = Utc::now();
        save(&*f.store, Collection::StockItems, &item("electronics", Duration::days(30), now))
            .await
            .unwrap();

        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Updated, Some(FreshnessStatus::ExpiringSoon)))
            .await
            .unwrap();

        assert!(outcome.notified);
        assert!(!outcome.pass_refreshed);
        let n: NotificationRequested = f.bus.published(Topic::NotificationEvents)[0]
            .decode()
            .unwrap();
        assert_eq!(n.message, "Milk is expiring_soon");
        assert!(f.store.ids(Collection::WalletPasses).is_empty());
    }

    #[tokio::test]
    async fn moving_out_of_a_perishable_category_removes_the_pass() {
        let f = fixture();
        let now = Utc::now();
        let mut milk = item("dairy", Duration::days(30), now);
        save(&*f.store, Collection::StockItems, &milk).await.unwrap();
        f.pipeline
            .process(&mutated(StockAction::Created, None))
            .await
            .unwrap();
        assert_eq!(f.store.ids(Collection::WalletPasses), vec!["stock_s1".to_string()]);

        milk.category = "electronics".into();
        save(&*f.store, Collection::StockItems, &milk).await.unwrap();
        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Updated, None))
            .await
            .unwrap();

        assert!(outcome.pass_deleted);
        assert!(!outcome.pass_refreshed);
        assert!(f.store.ids(Collection::WalletPasses).is_empty());
    }

    #[tokio::test]
    async fn update_before_create_still_creates_the_pass() {
        let f = fixture();
        let now = Utc::now();
        save(&*f.store, Collection::StockItems, &item("fruits", Duration::days(30), now))
            .await
            .unwrap();

        f.pipeline
            .process(&mutated(StockAction::Updated, None))
            .await
            .unwrap();
        f.pipeline
            .process(&mutated(StockAction::Created, None))
            .await
            .unwrap();

        assert_eq!(f.store.ids(Collection::WalletPasses), vec!["stock_s1".to_string()]);
    }

    #[tokio::test]
    async fn deleting_an_item_without_a_pass_succeeds() {
        let f = fixture();
        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Deleted, None))
            .await
            .unwrap();
        assert!(!outcome.pass_deleted);
    }

    #[tokio::test]
    async fn delete_removes_existing_pass() {
        let f = fixture();
        let now = Utc::now();
        save(&*f.store, Collection::StockItems, &item("dairy", Duration::days(30), now))
            .await
            .unwrap();
        f.pipeline
            .process(&mutated(StockAction::Created, None))
            .await
            .unwrap();

        let outcome = f
            .pipeline
            .process(&mutated(StockAction::Deleted, None))
            .await
            .unwrap();
        assert!(outcome.pass_deleted);
        assert!(f.store.ids(Collection::WalletPasses).is_empty());
    }

    #[tokio::test]
    async fn delete_surfaces_transient_store_failures() {
        let f = fixture();
        f.store.set_unavailable(true);

        let envelope = Envelope::new(
            Topic::StockManagement,
            serde_json::to_value(mutated(StockAction::Deleted, None)).unwrap(),
        );
        assert_eq!(f.pipeline.handle(&envelope).await, Disposition::Retry);
    }

    #[tokio::test]
    async fn missing_item_is_dropped() {
        let f = fixture();
        let envelope = Envelope::new(
            Topic::StockManagement,
            serde_json::to_value(mutated(StockAction::Created, None)).unwrap(),
        );
        assert_eq!(f.pipeline.handle(&envelope).await, Disposition::Ack);
        assert!(f.bus.published(Topic::NotificationEvents).is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_dropped() {
        let f = fixture();
        let envelope = Envelope::new(
            Topic::StockManagement,
            json!({"item_id": "s1", "user_id": "u1", "action": "archived"}),
        );
        assert_eq!(f.pipeline.handle(&envelope).await, Disposition::Ack);
    }

    proptest! {
        #[test]
        fn notification_count_follows_classified_status(expires_in_hours in -24i64 * 30..24 * 30) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async {
                let f = fixture();
                let now = Utc::now();
                let milk = item("dairy", Duration::hours(expires_in_hours), now);
                save(&*f.store, Collection::StockItems, &milk).await.unwrap();

                f.pipeline.process(&mutated(StockAction::Created, None)).await.unwrap();

                let expected = usize::from(milk.status != FreshnessStatus::Fresh);
                assert_eq!(f.bus.published(Topic::NotificationEvents).len(), expected);
            });
        }
    }
}
