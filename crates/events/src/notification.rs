use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use raseed_core::OwnerId;

use crate::event::Event;
use crate::topic::Topic;

/// Kind of user-facing notification requested by a pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StockExpiry,
}

/// Published on `notification-events`; delivery to devices happens downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequested {
    pub user_id: OwnerId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: JsonValue,
}

impl Event for NotificationRequested {
    const TOPIC: Topic = Topic::NotificationEvents;

    fn event_type(&self) -> &'static str {
        "notification.requested"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_uses_type_field() {
        let n = NotificationRequested {
            user_id: OwnerId::new("u1"),
            kind: NotificationKind::StockExpiry,
            title: "Item Expiry Alert".into(),
            message: "Milk is expired".into(),
            data: json!({"item_id": "s1"}),
        };

        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "stock_expiry");
        assert_eq!(v["user_id"], "u1");
    }
}
