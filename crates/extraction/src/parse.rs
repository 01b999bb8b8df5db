use serde::de::DeserializeOwned;

use crate::error::ExtractionError;

/// Return the body of the first Markdown code fence, or the trimmed text if unfenced.
///
/// Text that already opens as a JSON object or array is unfenced, even when a string
/// value inside it contains backticks. The language tag on the opening fence
/// (```` ```json ````) is dropped. An opening fence with no closing fence yields
/// everything after the opening line.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_open = &trimmed[open + 3..];
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Parse a model reply into `T`, tolerating a code fence around the JSON.
///
/// The reply is tried as-is first; the fenced body is only used when that fails.
pub fn parse_model_output<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionError> {
    let trimmed = raw.trim();
    match serde_json::from_str(trimmed) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            let body = strip_code_fences(trimmed);
            if body == trimmed {
                return Err(ExtractionError::malformed(raw, e));
            }
            serde_json::from_str(body).map_err(|e| ExtractionError::malformed(raw, e))
        }
    }
}
