use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use tracing::{instrument, warn};

use raseed_bills::{
    BillSource, FixtureBillSource, IntegrationAction, ServiceTag, ThirdPartyBill,
    ThirdPartyRequested,
};
use raseed_core::PassId;
use raseed_events::{Disposition, Envelope, EventHandler, Topic};
use raseed_wallet::{PassKind, WalletPass, bill_pass_id, integration_pass_id};

use super::{PipelineError, decode, settle, upsert_pass};
use crate::record_store::{Collection, DocumentStore, StoreError, save};

/// What one integration request led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    BillsFetched { saved: usize, skipped: usize },
    PassCreated(PassId),
}

/// `third-party-integration`: vendor bills → `third_party_bills` + `bill_<id>` passes.
#[derive(Clone)]
pub struct ThirdPartyPipeline {
    store: Arc<dyn DocumentStore>,
    sources: HashMap<ServiceTag, Arc<dyn BillSource>>,
}

impl ThirdPartyPipeline {
    /// Pipeline backed by the fixture feeds for every supported service.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            sources: HashMap::new(),
        }
        .with_source(Arc::new(FixtureBillSource::new(ServiceTag::Zomato)))
        .with_source(Arc::new(FixtureBillSource::new(ServiceTag::Blinkit)))
    }

    /// Replace the source used for `source.service()`.
    pub fn with_source(mut self, source: Arc<dyn BillSource>) -> Self {
        self.sources.insert(source.service(), source);
        self
    }

    #[instrument(skip_all, fields(user_id = %event.user_id, service = %event.service, action = event.action.as_str()))]
    pub async fn process(
        &self,
        event: &ThirdPartyRequested,
    ) -> Result<IntegrationOutcome, PipelineError> {
        match event.action {
            IntegrationAction::FetchBills => self.fetch_bills(event).await,
            IntegrationAction::CreatePass => self.create_pass(event).await,
        }
    }

    /// Bills whose normalization or encoding fails are skipped; an unavailable store
    /// aborts the batch so the whole (idempotent) fetch is redelivered.
    async fn fetch_bills(
        &self,
        event: &ThirdPartyRequested,
    ) -> Result<IntegrationOutcome, PipelineError> {
        let source = self.sources.get(&event.service).ok_or_else(|| {
            PipelineError::validation(format!("no bill source for {}", event.service))
        })?;

        let now = Utc::now();
        let (mut saved, mut skipped) = (0, 0);

        for normalized in source.fetch(&event.user_id, now) {
            let bill = match normalized {
                Ok(bill) => bill,
                Err(e) => {
                    warn!(error = %e, "skipping vendor order that failed to normalize");
                    skipped += 1;
                    continue;
                }
            };

            match self.persist_bill(&bill, now).await {
                Ok(()) => saved += 1,
                Err(e @ StoreError::Unavailable(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(bill_id = %bill.id, error = %e, "skipping bill that failed to persist");
                    skipped += 1;
                }
            }
        }

        Ok(IntegrationOutcome::BillsFetched { saved, skipped })
    }

    async fn persist_bill(&self, bill: &ThirdPartyBill, now: DateTime<Utc>) -> Result<(), StoreError> {
        save(&*self.store, Collection::ThirdPartyBills, bill).await?;
        upsert_pass(&*self.store, bill_pass(bill, now)).await?;
        Ok(())
    }

    /// Not idempotent: every request yields a new timestamped pass.
    async fn create_pass(
        &self,
        event: &ThirdPartyRequested,
    ) -> Result<IntegrationOutcome, PipelineError> {
        let service_data: JsonValue = serde_json::from_str(&event.service_data)
            .map_err(|e| PipelineError::validation(format!("service_data is not JSON: {e}")))?;

        let now = Utc::now();
        let pass = WalletPass::new(
            integration_pass_id(event.service.as_str(), now),
            event.user_id.clone(),
            PassKind::ThirdPartyIntegration,
            format!("{} Integration", event.service),
            format!("Action: {}", event.action.as_str()),
            json!({
                "service": event.service,
                "action": event.action,
                "service_data": service_data,
                "requested_at": event.requested_at,
            }),
            now,
        );

        save(&*self.store, Collection::WalletPasses, &pass).await?;
        Ok(IntegrationOutcome::PassCreated(pass.id))
    }
}

fn bill_pass(bill: &ThirdPartyBill, now: DateTime<Utc>) -> WalletPass {
    WalletPass::new(
        bill_pass_id(&bill.id),
        bill.user_id.clone(),
        PassKind::ThirdPartyBill,
        format!("{} - {}", bill.service, bill.vendor),
        format!("Order: {}, Total: ${:.2}", bill.order_id, bill.total_amount),
        json!({
            "bill_id": bill.id,
            "service": bill.service,
            "order_id": bill.order_id,
            "vendor": bill.vendor,
            "total_amount": bill.total_amount,
            "items_count": bill.items.len(),
            "order_date": bill.order_date.format("%Y-%m-%d").to_string(),
            "status": bill.status,
        }),
        now,
    )
}

#[async_trait]
impl EventHandler for ThirdPartyPipeline {
    fn name(&self) -> &'static str {
        "third-party-pipeline"
    }

    fn topic(&self) -> Topic {
        Topic::ThirdPartyIntegration
    }

    async fn handle(&self, envelope: &Envelope) -> Disposition {
        let result = match decode::<ThirdPartyRequested>(envelope) {
            Ok(event) => self.process(&event).await,
            Err(e) => Err(e),
        };
        settle(self.name(), envelope, result)
    }
}
