use serde::{Deserialize, Serialize};

use raseed_core::{OwnerId, StockItemId};
use raseed_events::{Event, Topic};

use crate::item::FreshnessStatus;

/// Mutation performed by the request layer on a stock item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    Created,
    Updated,
    Deleted,
}

/// Published on `stock-management` after every stock mutation.
///
/// `status` is the freshness computed at mutation time; it may be missing on deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMutated {
    pub item_id: StockItemId,
    pub user_id: OwnerId,
    pub action: StockAction,
    #[serde(default)]
    pub status: Option<FreshnessStatus>,
}

impl Event for StockMutated {
    const TOPIC: Topic = Topic::StockManagement;

    fn event_type(&self) -> &'static str {
        match self.action {
            StockAction::Created => "stock.created",
            StockAction::Updated => "stock.updated",
            StockAction::Deleted => "stock.deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_wire_payload() {
        let ev: StockMutated = serde_json::from_value(json!({
            "item_id": "s1",
            "user_id": "u1",
            "action": "updated",
            "status": "expiring_soon"
        }))
        .unwrap();

        assert_eq!(ev.action, StockAction::Updated);
        assert_eq!(ev.status, Some(FreshnessStatus::ExpiringSoon));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let res = serde_json::from_value::<StockMutated>(json!({
            "item_id": "s1",
            "user_id": "u1",
            "action": "archived"
        }));
        assert!(res.is_err());
    }
}
