//! HTTP client for the Gemini `generateContent` REST API.
//!
//! One request per call; retrying is left to the event transport, which redelivers
//! on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::model::{GenerativeModel, ImagePayload};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini client implementing [`GenerativeModel`].
///
/// Text-only prompts go to `model`; prompts carrying an image go to `vision_model`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    vision_model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: impl Into<String>) -> Result<Self, ExtractionError> {
        if api_key.trim().is_empty() {
            return Err(ExtractionError::Config("GEMINI_API_KEY is empty".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| ExtractionError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ExtractionError::Config(format!("failed to build HTTP client: {e}")))?;

        let model = model.into();
        Ok(Self {
            client,
            vision_model: model.clone(),
            model,
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<String, ExtractionError> {
        let model = if image.is_some() {
            &self.vision_model
        } else {
            &self.model
        };
        let request = GenerateRequest::new(prompt, image);

        let response = self
            .client
            .post(self.endpoint(model))
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(status = %status, model = %model, "generateContent response received");

        if status.is_success() {
            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| ExtractionError::Provider(format!("failed to parse API response: {e}")))?;
            return body.text().ok_or_else(|| {
                ExtractionError::Provider("response carried no text candidate".into())
            });
        }

        let body = response.text().await.unwrap_or_default();
        if is_transient_error(status) {
            warn!(status = %status, body = %body, "transient model error");
            return Err(ExtractionError::Unavailable {
                status: status.as_u16(),
                body,
            });
        }

        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => format!(
                "Gemini API error ({}): {}",
                api_err.error.status, api_err.error.message
            ),
            Err(_) => format!("API returned {status}: {body}"),
        };
        Err(ExtractionError::Provider(message))
    }
}

/// Status codes that indicate transient errors worth redelivering.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    File { file_data: FileData<'a> },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, image: Option<&'a ImagePayload>) -> Self {
        let mut parts = vec![Part::Text { text: prompt }];
        match image {
            Some(ImagePayload::Uri { mime_type, uri }) => parts.push(Part::File {
                file_data: FileData {
                    mime_type,
                    file_uri: uri,
                },
            }),
            Some(ImagePayload::Inline { mime_type, data }) => parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type,
                    data: STANDARD.encode(data),
                },
            }),
            None => {}
        }
        Self {
            contents: vec![Content { role: "user", parts }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new("test-api-key", "gemini-test")
            .unwrap()
            .with_vision_model("gemini-vision-test")
            .with_base_url(base_url)
    }

    fn text_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    }

    #[tokio::test]
    async fn text_prompt_uses_text_model() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("{\"ok\":true}")))
            .mount(&server)
            .await;

        let text = test_client(&server.uri()).generate("hello", None).await.unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn image_prompt_sends_file_data_to_vision_model() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-vision-test:generateContent"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [
                    {"text": "read this"},
                    {"file_data": {"mime_type": "image/png", "file_uri": "https://x/r1.png"}}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("done")))
            .expect(1)
            .mount(&server)
            .await;

        let image = ImagePayload::from_url("https://x/r1.png");
        let text = test_client(&server.uri())
            .generate("read this", Some(&image))
            .await
            .unwrap();
        assert_eq!(text, "done");
    }

    #[tokio::test]
    async fn inline_image_is_base64_encoded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [
                    {"text": "read this"},
                    {"inline_data": {"mime_type": "image/jpeg", "data": "AQID"}}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let image = ImagePayload::inline("image/jpeg", vec![1, 2, 3]);
        test_client(&server.uri())
            .generate("read this", Some(&image))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).generate("hi", None).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unavailable { status: 429, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn bad_request_is_not_transient() {
        let server = MockServer::start().await;

        let error_body = serde_json::json!({
            "error": {"code": 400, "status": "INVALID_ARGUMENT", "message": "bad model"}
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(&error_body))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).generate("hi", None).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("INVALID_ARGUMENT"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_candidates_are_a_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).generate("hi", None).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Provider(_)));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", DEFAULT_MODEL),
            Err(ExtractionError::Config(_))
        ));
    }
}
