//! Event pipelines: one handler per topic.
//!
//! Each pipeline exposes a typed `process` operation plus an [`EventHandler`] impl that
//! decodes the envelope, runs `process` and settles according to
//! [`PipelineError::disposition`].
//!
//! ## Ordering
//!
//! Wallet passes are derived only after the source record write succeeds. Pass ids are
//! deterministic per source record, so redelivery converges on one pass.

mod error;
mod passes;
mod query;
mod receipt;
mod stock;
mod third_party;

use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use raseed_events::{Disposition, Envelope};

pub use error::PipelineError;
pub use passes::upsert_pass;
pub use query::{QUERY_PROMPT, QueryPipeline, RESPONSE_PREVIEW_CHARS, response_preview};
pub use receipt::{RECEIPT_EXTRACTION_PROMPT, ReceiptPipeline};
pub use stock::{StockOutcome, StockPipeline};
pub use third_party::{IntegrationOutcome, ThirdPartyPipeline};

/// Decode an envelope payload; undecodable payloads are validation failures.
pub(crate) fn decode<E: DeserializeOwned>(envelope: &Envelope) -> Result<E, PipelineError> {
    envelope.decode().map_err(|e| {
        PipelineError::validation(format!("undecodable {} payload: {e}", envelope.topic()))
    })
}

/// Log the outcome of one delivery and turn it into a settlement.
pub(crate) fn settle<T: core::fmt::Debug>(
    pipeline: &'static str,
    envelope: &Envelope,
    result: Result<T, PipelineError>,
) -> Disposition {
    let message_id = envelope.message_id();
    let attempt = envelope.attempt();

    match result {
        Ok(outcome) => {
            info!(pipeline, %message_id, attempt, ?outcome, "event processed");
            Disposition::Ack
        }
        Err(err) => {
            match &err {
                PipelineError::TransientIo(_) => {
                    warn!(pipeline, %message_id, attempt, error = %err, "transient failure; will retry")
                }
                PipelineError::MalformedModelOutput { raw, reason } => {
                    error!(pipeline, %message_id, attempt, raw = %raw, reason = %reason, "malformed model output; dropping event")
                }
                PipelineError::ModelRejected(_) => {
                    error!(pipeline, %message_id, attempt, error = %err, "model rejected request; dropping event")
                }
                PipelineError::NotFound(_) | PipelineError::Validation(_) => {
                    warn!(pipeline, %message_id, attempt, error = %err, "dropping event")
                }
            }
            err.disposition()
        }
    }
}
