use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::ExtractionError;
use crate::model::{GenerativeModel, ImagePayload};
use crate::parse::parse_model_output;
use crate::prompt::{PromptContext, PromptTemplate};

pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Prompt → model → parsed schema, bounded by a timeout.
///
/// Stateless apart from the injected model; safe to call concurrently and to retry.
#[derive(Clone)]
pub struct ExtractionAdapter {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl ExtractionAdapter {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn extract<T: DeserializeOwned>(
        &self,
        template: &PromptTemplate,
        context: &PromptContext,
        image: Option<&ImagePayload>,
    ) -> Result<T, ExtractionError> {
        let prompt = template.render(context);
        debug!(
            template = template.name(),
            prompt_len = prompt.len(),
            with_image = image.is_some(),
            "calling generative model"
        );

        let raw = tokio::time::timeout(self.timeout, self.model.generate(&prompt, image))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))??;

        parse_model_output(&raw).inspect_err(|e| {
            error!(template = template.name(), raw = %raw, error = %e, "model output did not match schema");
        })
    }
}

impl core::fmt::Debug for ExtractionAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtractionAdapter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
