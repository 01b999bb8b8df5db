//! Deterministic model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::model::{GenerativeModel, ImagePayload};

/// One scripted outcome of a `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    /// Fails like a 503 from the provider.
    Unavailable,
    /// Fails like a 4xx the provider will keep returning.
    Rejected(String),
    /// Never returns; exercises the caller's timeout.
    Hang,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Replays queued replies in order and records every prompt it receives.
///
/// An exhausted script answers `Unavailable`.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    images: Mutex<Vec<Option<ImagePayload>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn images(&self) -> Vec<Option<ImagePayload>> {
        self.images.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<String, ExtractionError> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        self.images
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(image.cloned());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            Some(ScriptedReply::Rejected(reason)) => Err(ExtractionError::Provider(reason)),
            Some(ScriptedReply::Unavailable) | None => Err(ExtractionError::Unavailable {
                status: 503,
                body: "scripted model unavailable".into(),
            }),
        }
    }
}
