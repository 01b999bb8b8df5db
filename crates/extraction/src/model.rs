use async_trait::async_trait;

use crate::error::ExtractionError;

/// Image attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Reference the model fetches itself (object-storage URL).
    Uri { mime_type: String, uri: String },
    /// Raw bytes sent inline.
    Inline { mime_type: String, data: Vec<u8> },
}

impl ImagePayload {
    /// Reference an image by URL, inferring its MIME type from the extension.
    pub fn from_url(url: impl Into<String>) -> Self {
        let uri = url.into();
        Self::Uri {
            mime_type: mime_from_path(&uri).to_string(),
            uri,
        }
    }

    pub fn inline(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Inline {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            ImagePayload::Uri { mime_type, .. } | ImagePayload::Inline { mime_type, .. } => {
                mime_type
            }
        }
    }
}

/// Falls back to JPEG, the format phone cameras produce.
fn mime_from_path(path: &str) -> &'static str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// An opaque text generator: prompt (+ optional image) in, free text out.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<String, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(ImagePayload::from_url("https://x/r1.png").mime_type(), "image/png");
        assert_eq!(
            ImagePayload::from_url("https://x/r1.WEBP?token=abc").mime_type(),
            "image/webp"
        );
        assert_eq!(ImagePayload::from_url("https://x/r1.jpg").mime_type(), "image/jpeg");
        assert_eq!(ImagePayload::from_url("https://x/r1").mime_type(), "image/jpeg");
    }
}
