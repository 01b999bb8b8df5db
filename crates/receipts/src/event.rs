use serde::{Deserialize, Serialize};

use raseed_core::{OwnerId, QueryId, ReceiptId};
use raseed_events::{Event, Topic};

/// Published on `receipt-processing` after an image upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptUploaded {
    pub receipt_id: ReceiptId,
    pub user_id: OwnerId,
    pub image_url: String,
}

impl Event for ReceiptUploaded {
    const TOPIC: Topic = Topic::ReceiptProcessing;

    fn event_type(&self) -> &'static str {
        "receipt.uploaded"
    }
}

/// Published on `query-processing` when a user asks a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySubmitted {
    pub query_id: QueryId,
    pub user_id: OwnerId,
    pub query: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Event for QuerySubmitted {
    const TOPIC: Topic = Topic::QueryProcessing;

    fn event_type(&self) -> &'static str {
        "query.submitted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_defaults_to_english() {
        let ev: QuerySubmitted = serde_json::from_value(json!({
            "query_id": "q1",
            "user_id": "u1",
            "query": "What can I cook tonight?"
        }))
        .unwrap();
        assert_eq!(ev.language, "en");
    }
}
