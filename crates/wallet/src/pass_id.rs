//! Wallet-pass key derivation.
//!
//! One pure function per source kind. The derived id is the document key in
//! `wallet_passes`, so every pipeline that re-processes the same source record
//! lands on the same document.
//!
//! | source            | id                                   |
//! |-------------------|--------------------------------------|
//! | receipt           | `receipt_<receipt id>`               |
//! | query             | `query_<query id>`                   |
//! | stock item        | `stock_<item id>`                    |
//! | third-party bill  | `bill_<bill id>`                     |
//! | integration       | `integration_<service>_<unix nanos>` |
//!
//! Integration passes are the exception: they embed a timestamp and are
//! intentionally not idempotent.

use chrono::{DateTime, Utc};

use raseed_core::{BillId, PassId, QueryId, ReceiptId, StockItemId};

pub const RECEIPT_PREFIX: &str = "receipt_";
pub const QUERY_PREFIX: &str = "query_";
pub const STOCK_PREFIX: &str = "stock_";
pub const BILL_PREFIX: &str = "bill_";
pub const INTEGRATION_PREFIX: &str = "integration_";

pub fn receipt_pass_id(receipt_id: &ReceiptId) -> PassId {
    PassId::new(format!("{RECEIPT_PREFIX}{receipt_id}"))
}

pub fn query_pass_id(query_id: &QueryId) -> PassId {
    PassId::new(format!("{QUERY_PREFIX}{query_id}"))
}

pub fn stock_pass_id(item_id: &StockItemId) -> PassId {
    PassId::new(format!("{STOCK_PREFIX}{item_id}"))
}

pub fn bill_pass_id(bill_id: &BillId) -> PassId {
    PassId::new(format!("{BILL_PREFIX}{bill_id}"))
}

/// Non-deterministic: two calls with different instants yield different ids.
pub fn integration_pass_id(service: &str, at: DateTime<Utc>) -> PassId {
    let nanos = at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));
    PassId::new(format!("{INTEGRATION_PREFIX}{service}_{nanos}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn fixed_prefixes_per_kind() {
        assert_eq!(receipt_pass_id(&ReceiptId::new("r1")).as_str(), "receipt_r1");
        assert_eq!(query_pass_id(&QueryId::new("q1")).as_str(), "query_q1");
        assert_eq!(stock_pass_id(&StockItemId::new("s1")).as_str(), "stock_s1");
        assert_eq!(bill_pass_id(&BillId::new("zomato_ZOM1")).as_str(), "bill_zomato_ZOM1");
    }

    #[test]
    fn integration_ids_embed_service_and_time() {
        let a = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let b = a + chrono::Duration::nanoseconds(1);

        let id_a = integration_pass_id("zomato", a);
        let id_b = integration_pass_id("zomato", b);

        assert!(id_a.as_str().starts_with("integration_zomato_"));
        assert_ne!(id_a, id_b);
    }

    proptest! {
        /// Property: derivation is deterministic and injective per kind.
        #[test]
        fn receipt_ids_are_deterministic_and_distinct(a in "[a-zA-Z0-9]{1,16}", b in "[a-zA-Z0-9]{1,16}") {
            let pa = receipt_pass_id(&ReceiptId::new(a.clone()));
            prop_assert_eq!(&pa, &receipt_pass_id(&ReceiptId::new(a.clone())));
            if a != b {
                prop_assert_ne!(pa, receipt_pass_id(&ReceiptId::new(b)));
            }
        }

        #[test]
        fn stock_ids_keep_the_source_id_as_suffix(id in "[a-z0-9_-]{1,24}") {
            let pass = stock_pass_id(&StockItemId::new(id.clone()));
            prop_assert_eq!(pass.as_str().strip_prefix(STOCK_PREFIX), Some(id.as_str()));
        }
    }
}
