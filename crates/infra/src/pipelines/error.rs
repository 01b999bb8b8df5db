use thiserror::Error;

use raseed_core::DomainError;
use raseed_events::{BusError, Disposition};
use raseed_extraction::ExtractionError;

use crate::record_store::StoreError;

/// Failure of one pipeline invocation, classified for settlement.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Store, bus or model unavailable or timed out. The event is redelivered.
    #[error("transient failure: {0}")]
    TransientIo(String),

    /// The model answered with something that does not fit the schema.
    #[error("malformed model output: {reason}")]
    MalformedModelOutput { raw: String, reason: String },

    /// The model provider refused the request or is misconfigured.
    #[error("model rejected request: {0}")]
    ModelRejected(String),

    /// A record the event refers to does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Undecodable payload, unsupported service/action, or invalid data.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Only transient failures go back to the transport; everything else is acked.
    pub fn disposition(&self) -> Disposition {
        match self {
            PipelineError::TransientIo(_) => Disposition::Retry,
            PipelineError::MalformedModelOutput { .. }
            | PipelineError::ModelRejected(_)
            | PipelineError::NotFound(_)
            | PipelineError::Validation(_) => Disposition::Ack,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => PipelineError::TransientIo(msg),
            StoreError::NotFound { .. } => PipelineError::NotFound(err.to_string()),
            StoreError::Serialization(msg) => PipelineError::Validation(msg),
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(err: ExtractionError) -> Self {
        match err {
            e if e.is_transient() => PipelineError::TransientIo(e.to_string()),
            ExtractionError::MalformedModelOutput { raw, reason } => {
                PipelineError::MalformedModelOutput { raw, reason }
            }
            other => PipelineError::ModelRejected(other.to_string()),
        }
    }
}

impl From<BusError> for PipelineError {
    fn from(err: BusError) -> Self {
        PipelineError::TransientIo(err.to_string())
    }
}

impl From<DomainError> for PipelineError {
    fn from(err: DomainError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::Collection;
    use std::time::Duration;

    #[test]
    fn only_transient_failures_are_retried() {
        assert_eq!(
            PipelineError::TransientIo("down".into()).disposition(),
            Disposition::Retry
        );
        assert_eq!(PipelineError::NotFound("r1".into()).disposition(), Disposition::Ack);
        assert_eq!(PipelineError::validation("bad").disposition(), Disposition::Ack);
        assert_eq!(
            PipelineError::MalformedModelOutput {
                raw: "oops".into(),
                reason: "eof".into()
            }
            .disposition(),
            Disposition::Ack
        );
    }

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        let missing: PipelineError = StoreError::NotFound {
            collection: Collection::Receipts,
            id: "r1".into(),
        }
        .into();
        assert!(matches!(missing, PipelineError::NotFound(_)));

        let down: PipelineError = StoreError::Unavailable("timeout".into()).into();
        assert_eq!(down.disposition(), Disposition::Retry);
    }

    #[test]
    fn extraction_io_failures_are_retried() {
        let timeout: PipelineError = ExtractionError::Timeout(Duration::from_secs(60)).into();
        assert_eq!(timeout.disposition(), Disposition::Retry);

        let overloaded: PipelineError = ExtractionError::Unavailable {
            status: 429,
            body: "RESOURCE_EXHAUSTED".into(),
        }
        .into();
        assert_eq!(overloaded.disposition(), Disposition::Retry);

        let reset: PipelineError = ExtractionError::Transport("connection reset".into()).into();
        assert!(matches!(reset, PipelineError::TransientIo(_)));
    }

    #[test]
    fn provider_rejections_are_acked() {
        let rejected: PipelineError =
            ExtractionError::Provider("400 INVALID_ARGUMENT: image too large".into()).into();
        assert!(matches!(rejected, PipelineError::ModelRejected(_)));
        assert_eq!(rejected.disposition(), Disposition::Ack);

        let misconfigured: PipelineError =
            ExtractionError::Config("GEMINI_API_KEY is not set".into()).into();
        assert_eq!(misconfigured.disposition(), Disposition::Ack);
    }
}
