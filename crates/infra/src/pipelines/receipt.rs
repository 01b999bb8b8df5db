use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{instrument, warn};

use raseed_events::{Disposition, Envelope, EventHandler, Topic};
use raseed_extraction::{ExtractionAdapter, ImagePayload, PromptContext, PromptTemplate};
use raseed_receipts::{ExtractedReceipt, Receipt, ReceiptStatus, ReceiptUploaded};
use raseed_wallet::{PassKind, WalletPass, receipt_pass_id};

use super::{PipelineError, decode, settle, upsert_pass};
use crate::record_store::{Collection, DocumentStore, FieldUpdate, load};

pub const RECEIPT_EXTRACTION_PROMPT: PromptTemplate = PromptTemplate::new(
    "receipt_extraction",
    r#"Analyze this receipt image and extract the following information in JSON format:
{
  "store_name": "Store name",
  "total_amount": 0.00,
  "tax_amount": 0.00,
  "items": [
    {
      "name": "Item name",
      "price": 0.00,
      "quantity": 1,
      "category": "Category (e.g., groceries, electronics, etc.)"
    }
  ],
  "date": "YYYY-MM-DD"
}

Please ensure all monetary values are numbers, quantities are integers, and categorize items appropriately."#,
);

/// `receipt-processing`: image → extracted fields → `receipt_<id>` pass.
///
/// Receipt states: `uploaded → extracted → finalized`. The pass is written only after
/// the extracted fields are stored; a failed extraction leaves the receipt `uploaded`.
#[derive(Clone)]
pub struct ReceiptPipeline {
    store: Arc<dyn DocumentStore>,
    extraction: ExtractionAdapter,
}

impl ReceiptPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, extraction: ExtractionAdapter) -> Self {
        Self { store, extraction }
    }

    #[instrument(skip_all, fields(receipt_id = %event.receipt_id, user_id = %event.user_id))]
    pub async fn process(&self, event: &ReceiptUploaded) -> Result<WalletPass, PipelineError> {
        let receipt: Receipt =
            load(&*self.store, Collection::Receipts, event.receipt_id.as_str()).await?;

        if receipt.user_id != event.user_id {
            warn!(owner = %receipt.user_id, "event owner differs from receipt owner; using receipt owner");
        }

        let image_url = if receipt.image_url.is_empty() {
            event.image_url.as_str()
        } else {
            receipt.image_url.as_str()
        };
        let image = ImagePayload::from_url(image_url);

        let extracted: ExtractedReceipt = self
            .extraction
            .extract(&RECEIPT_EXTRACTION_PROMPT, &PromptContext::new(), Some(&image))
            .await?;
        extracted
            .validate()
            .map_err(|e| PipelineError::MalformedModelOutput {
                raw: json!(extracted).to_string(),
                reason: e.to_string(),
            })?;

        let now = Utc::now();
        self.store
            .update(
                Collection::Receipts,
                receipt.id.as_str(),
                &[
                    FieldUpdate::new("store_name", extracted.store_name.as_str()),
                    FieldUpdate::new("total_amount", extracted.total_amount),
                    FieldUpdate::new("tax_amount", extracted.tax_amount),
                    FieldUpdate::new("items", json!(extracted.items)),
                    FieldUpdate::new("date", json!(extracted.date)),
                    FieldUpdate::new("status", json!(ReceiptStatus::Extracted)),
                    FieldUpdate::new("updated_at", json!(now)),
                ],
            )
            .await?;

        let pass = upsert_pass(&*self.store, receipt_pass(&receipt, &extracted, now)).await?;

        self.store
            .update(
                Collection::Receipts,
                receipt.id.as_str(),
                &[FieldUpdate::new("status", json!(ReceiptStatus::Finalized))],
            )
            .await?;

        Ok(pass)
    }
}

fn receipt_pass(
    receipt: &Receipt,
    extracted: &ExtractedReceipt,
    now: chrono::DateTime<Utc>,
) -> WalletPass {
    WalletPass::new(
        receipt_pass_id(&receipt.id),
        receipt.user_id.clone(),
        PassKind::Receipt,
        format!("Receipt - {}", extracted.store_name),
        format!(
            "Total: ${:.2}, Items: {}",
            extracted.total_amount,
            extracted.items.len()
        ),
        json!({
            "receipt_id": receipt.id,
            "store_name": extracted.store_name,
            "total_amount": extracted.total_amount,
            "items_count": extracted.items.len(),
            "date": extracted.date,
        }),
        now,
    )
}

#[async_trait]
impl EventHandler for ReceiptPipeline {
    fn name(&self) -> &'static str {
        "receipt-pipeline"
    }

    fn topic(&self) -> Topic {
        Topic::ReceiptProcessing
    }

    async fn handle(&self, envelope: &Envelope) -> Disposition {
        let result = match decode::<ReceiptUploaded>(envelope) {
            Ok(event) => self.process(&event).await.map(|pass| pass.id),
            Err(e) => Err(e),
        };
        settle(self.name(), envelope, result)
    }
}
