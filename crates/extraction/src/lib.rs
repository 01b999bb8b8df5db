//! `raseed-extraction`
//!
//! **Responsibility:** the boundary to the generative model.
//!
//! - Renders prompt templates with caller context.
//! - Sends text (and optionally an image) to a [`GenerativeModel`] under a timeout.
//! - Strips Markdown code fences and parses the reply into a caller-chosen schema.
//!
//! Nothing here touches records or events. A parse failure is surfaced as
//! [`ExtractionError::MalformedModelOutput`] with the raw reply; no partial guessing.

pub mod adapter;
pub mod error;
pub mod gemini;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod scripted;

pub use adapter::{DEFAULT_EXTRACTION_TIMEOUT, ExtractionAdapter};
pub use error::ExtractionError;
pub use gemini::{DEFAULT_MODEL, GeminiClient};
pub use model::{GenerativeModel, ImagePayload};
pub use parse::{parse_model_output, strip_code_fences};
pub use prompt::{PromptContext, PromptTemplate};
pub use scripted::{ScriptedModel, ScriptedReply};
