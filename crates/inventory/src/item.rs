use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use raseed_core::{Entity, OwnerId, StockItemId};

use crate::category::PerishableCategory;

/// Items expiring within this many days are `expiring_soon`.
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 7;

/// Freshness of a stock item relative to "now".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Fresh,
    ExpiringSoon,
    Expired,
}

impl FreshnessStatus {
    /// Classify an expiry date against `now`.
    ///
    /// - `expired` if `expiry < now`
    /// - `expiring_soon` if `now <= expiry < now + 7 days`
    /// - `fresh` otherwise
    pub fn classify(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if expiry < now {
            FreshnessStatus::Expired
        } else if expiry < now + Duration::days(EXPIRING_SOON_WINDOW_DAYS) {
            FreshnessStatus::ExpiringSoon
        } else {
            FreshnessStatus::Fresh
        }
    }

    /// Whether the owner should be told about this item.
    pub fn needs_attention(&self) -> bool {
        matches!(self, FreshnessStatus::ExpiringSoon | FreshnessStatus::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessStatus::Fresh => "fresh",
            FreshnessStatus::ExpiringSoon => "expiring_soon",
            FreshnessStatus::Expired => "expired",
        }
    }
}

impl core::fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A household inventory entry (`stock_items` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: StockItemId,
    pub user_id: OwnerId,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit: String,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: FreshnessStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Build a new item with its status already classified against `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: StockItemId,
        user_id: OwnerId,
        name: impl Into<String>,
        category: impl Into<String>,
        quantity: u32,
        unit: impl Into<String>,
        purchase_date: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            category: category.into(),
            quantity,
            unit: unit.into(),
            purchase_date,
            expiry_date,
            status: FreshnessStatus::classify(expiry_date, now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-derive `status` after a mutation (quantity, expiry, ...).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.status = FreshnessStatus::classify(self.expiry_date, now);
        self.updated_at = now;
    }

    pub fn perishable_category(&self) -> Option<PerishableCategory> {
        PerishableCategory::classify(&self.category)
    }

    /// `YYYY-MM-DD` rendering used in pass descriptions.
    pub fn expiry_day(&self) -> String {
        self.expiry_date.format("%Y-%m-%d").to_string()
    }
}

impl Entity for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn item(expiry: DateTime<Utc>) -> StockItem {
        StockItem::new(
            StockItemId::new("s1"),
            OwnerId::new("u1"),
            "Milk",
            "dairy",
            2,
            "l",
            now() - Duration::days(1),
            expiry,
            now(),
        )
    }

    #[test]
    fn boundaries() {
        assert_eq!(FreshnessStatus::classify(now(), now()), FreshnessStatus::ExpiringSoon);
        assert_eq!(
            FreshnessStatus::classify(now() - Duration::seconds(1), now()),
            FreshnessStatus::Expired
        );
        assert_eq!(
            FreshnessStatus::classify(now() + Duration::days(7), now()),
            FreshnessStatus::Fresh
        );
        assert_eq!(
            FreshnessStatus::classify(now() + Duration::days(7) - Duration::seconds(1), now()),
            FreshnessStatus::ExpiringSoon
        );
    }

    #[test]
    fn touch_reclassifies_on_update() {
        let mut it = item(now() + Duration::days(3));
        assert_eq!(it.status, FreshnessStatus::ExpiringSoon);

        it.touch(now() + Duration::days(4));
        assert_eq!(it.status, FreshnessStatus::Expired);
        assert_eq!(it.updated_at, now() + Duration::days(4));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(FreshnessStatus::ExpiringSoon).unwrap(),
            serde_json::json!("expiring_soon")
        );
    }

    #[test]
    fn expiry_day_is_calendar_date() {
        assert_eq!(item(now() + Duration::days(2)).expiry_day(), "2026-10-21");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: status on creation and on update matches the expiry window exactly.
        #[test]
        fn status_matches_expiry_window(
            offset_secs in -30i64 * 86_400..30i64 * 86_400,
            later_secs in 0i64..30 * 86_400,
        ) {
            let expiry = now() + Duration::seconds(offset_secs);
            let mut it = item(expiry);

            let expect = |at: DateTime<Utc>| {
                if expiry < at {
                    FreshnessStatus::Expired
                } else if expiry < at + Duration::days(7) {
                    FreshnessStatus::ExpiringSoon
                } else {
                    FreshnessStatus::Fresh
                }
            };

            prop_assert_eq!(it.status, expect(now()));

            let later = now() + Duration::seconds(later_secs);
            it.touch(later);
            prop_assert_eq!(it.status, expect(later));
        }
    }
}
