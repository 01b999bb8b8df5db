use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use raseed_core::{BillId, Entity, OwnerId};

/// Supported third-party services.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTag {
    Zomato,
    Blinkit,
}

impl ServiceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTag::Zomato => "zomato",
            ServiceTag::Blinkit => "blinkit",
        }
    }
}

impl core::fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Placed,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Placed => "placed",
            DeliveryStatus::OutForDelivery => "out_for_delivery",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
}

/// A normalized bill (`third_party_bills` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirdPartyBill {
    pub id: BillId,
    pub user_id: OwnerId,
    pub service: ServiceTag,
    pub order_id: String,
    pub vendor: String,
    pub total_amount: f64,
    pub items: Vec<BillItem>,
    pub order_date: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl ThirdPartyBill {
    /// Bill key: one document per (service, external order).
    pub fn derive_id(service: ServiceTag, order_id: &str) -> BillId {
        BillId::new(format!("{}_{}", service.as_str(), order_id))
    }
}

impl Entity for ThirdPartyBill {
    type Id = BillId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_ids_are_stable_per_order() {
        assert_eq!(
            ThirdPartyBill::derive_id(ServiceTag::Blinkit, "BLK789012").as_str(),
            "blinkit_BLK789012"
        );
    }
}
