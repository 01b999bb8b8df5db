use std::time::Duration;

use thiserror::Error;

/// Failure of a single extraction call.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The request never produced an HTTP response (connect/reset/DNS).
    #[error("model transport failed: {0}")]
    Transport(String),

    /// The model answered with a status worth retrying (429/500/503).
    #[error("model unavailable ({status}): {body}")]
    Unavailable { status: u16, body: String },

    /// The caller-side deadline elapsed before the model replied.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// The reply could not be parsed into the expected schema.
    #[error("malformed model output: {reason}")]
    MalformedModelOutput { raw: String, reason: String },

    /// The model rejected the request; retrying the same request will not help.
    #[error("model provider error: {0}")]
    Provider(String),

    #[error("extraction misconfigured: {0}")]
    Config(String),
}

impl ExtractionError {
    pub(crate) fn malformed(raw: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedModelOutput {
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether redelivering the triggering event may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtractionError::Transport(_)
                | ExtractionError::Unavailable { .. }
                | ExtractionError::Timeout(_)
        )
    }
}
