use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use raseed_core::{Entity, OwnerId, PassId};

/// Kind of wallet pass (stored as `type`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Receipt,
    Cooking,
    Shopping,
    Insight,
    StockItem,
    ThirdPartyBill,
    ThirdPartyIntegration,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Receipt => "receipt",
            PassKind::Cooking => "cooking",
            PassKind::Shopping => "shopping",
            PassKind::Insight => "insight",
            PassKind::StockItem => "stock_item",
            PassKind::ThirdPartyBill => "third_party_bill",
            PassKind::ThirdPartyIntegration => "third_party_integration",
        }
    }
}

impl core::fmt::Display for PassKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display-ready summary surfaced to an external wallet system.
///
/// `data` is opaque to the pipelines once written; it carries whatever the
/// wallet renderer needs for the specific kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPass {
    pub id: PassId,
    pub user_id: OwnerId,
    #[serde(rename = "type")]
    pub kind: PassKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletPass {
    pub fn new(
        id: PassId,
        user_id: OwnerId,
        kind: PassKind,
        title: impl Into<String>,
        description: impl Into<String>,
        data: JsonValue,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            kind,
            title: title.into(),
            description: description.into(),
            data,
            created_at: now,
            updated_at: None,
        }
    }

    /// Merge a freshly derived pass into an already stored one.
    ///
    /// The stored `created_at` survives; everything else comes from `fresh`.
    pub fn refreshed_by(self, fresh: WalletPass) -> WalletPass {
        let now = fresh.created_at;
        WalletPass {
            created_at: self.created_at,
            updated_at: Some(now),
            ..fresh
        }
    }
}

impl Entity for WalletPass {
    type Id = PassId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
