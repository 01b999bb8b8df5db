use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

use raseed_events::{Disposition, Envelope, EventHandler, Topic};
use raseed_extraction::{ExtractionAdapter, PromptContext, PromptTemplate};
use raseed_receipts::{
    CONTEXT_RECEIPT_LIMIT, QueryAnswer, QuerySubmitted, Receipt, receipt_history_context,
    recent_receipts,
};
use raseed_wallet::{WalletPass, query_pass_id};

use super::{PipelineError, decode, settle, upsert_pass};
use crate::record_store::{Collection, DocumentStore, FieldUpdate, find_by_owner};

pub const QUERY_PROMPT: PromptTemplate = PromptTemplate::new(
    "query_answer",
    r#"You are Raseed, an AI-powered personal assistant for financial management and receipt analysis.

User's Receipt History:
{history}

User Query (Language: {language}): {query}

Please analyze this query and provide a helpful response. Consider the user's spending patterns, recent purchases, and financial context.

Respond in JSON format:
{
  "response": "Your helpful response to the user",
  "intent": "cooking_suggestion|spending_analysis|shopping_list|financial_insight|general_help",
  "confidence": 0.95,
  "suggestions": ["suggestion1", "suggestion2"],
  "data": {
    "relevant_items": ["item1", "item2"],
    "total_spent": 0.00,
    "category_breakdown": {"category": "amount"}
  }
}

Focus on being helpful, actionable, and personalized based on the user's receipt history."#,
);

/// Characters of the response kept in a pass description.
pub const RESPONSE_PREVIEW_CHARS: usize = 100;

/// First [`RESPONSE_PREVIEW_CHARS`] characters, with `...` appended only when cut.
pub fn response_preview(response: &str) -> String {
    match response.char_indices().nth(RESPONSE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &response[..cut]),
        None => response.to_string(),
    }
}

/// `query-processing`: receipt history + question → answer → optional pass.
#[derive(Clone)]
pub struct QueryPipeline {
    store: Arc<dyn DocumentStore>,
    extraction: ExtractionAdapter,
}

impl QueryPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, extraction: ExtractionAdapter) -> Self {
        Self { store, extraction }
    }

    /// Answers the query and returns the derived pass, if the intent yields one.
    ///
    /// Redelivery re-runs the whole flow; the answer is overwritten and the pass
    /// (if any) refreshed in place.
    #[instrument(skip_all, fields(query_id = %event.query_id, user_id = %event.user_id))]
    pub async fn process(
        &self,
        event: &QuerySubmitted,
    ) -> Result<Option<WalletPass>, PipelineError> {
        let receipts: Vec<Receipt> =
            find_by_owner(&*self.store, Collection::Receipts, &event.user_id).await?;
        let history = receipt_history_context(&recent_receipts(receipts, CONTEXT_RECEIPT_LIMIT));

        let context = PromptContext::new()
            .with("history", history)
            .with("language", event.language.as_str())
            .with("query", event.query.as_str());
        let answer: QueryAnswer = self.extraction.extract(&QUERY_PROMPT, &context, None).await?;

        let now = Utc::now();
        self.store
            .update(
                Collection::Queries,
                event.query_id.as_str(),
                &[
                    FieldUpdate::new("response", answer.response.as_str()),
                    FieldUpdate::new("updated_at", json!(now)),
                ],
            )
            .await?;

        let Some((kind, title)) = answer.intent.wallet_pass() else {
            info!(intent = %answer.intent, "intent yields no wallet pass");
            return Ok(None);
        };

        let pass = WalletPass::new(
            query_pass_id(&event.query_id),
            event.user_id.clone(),
            kind,
            title,
            response_preview(&answer.response),
            json!({
                "query_id": event.query_id,
                "intent": answer.intent,
                "suggestions": answer.suggestions,
                "data": answer.data,
            }),
            now,
        );
        Ok(Some(upsert_pass(&*self.store, pass).await?))
    }
}

#[async_trait]
impl EventHandler for QueryPipeline {
    fn name(&self) -> &'static str {
        "query-pipeline"
    }

    fn topic(&self) -> Topic {
        Topic::QueryProcessing
    }

    async fn handle(&self, envelope: &Envelope) -> Disposition {
        let result = match decode::<QuerySubmitted>(envelope) {
            Ok(event) => self
                .process(&event)
                .await
                .map(|pass| pass.map(|p| p.id)),
            Err(e) => Err(e),
        };
        settle(self.name(), envelope, result)
    }
}
