use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use raseed_core::{DomainError, DomainResult, Entity, OwnerId, ReceiptId};

/// Processing state of a receipt.
///
/// `uploaded` is set by the request layer; the receipt pipeline moves it to
/// `extracted` together with the extracted fields and to `finalized` once the
/// wallet pass exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    #[default]
    Uploaded,
    Extracted,
    Finalized,
}

/// A line item on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
}

/// A receipt document (`receipts` collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub user_id: OwnerId,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub image_url: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: ReceiptStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// A freshly uploaded receipt: only the image reference is known.
    pub fn uploaded(
        id: ReceiptId,
        user_id: OwnerId,
        image_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            store_name: String::new(),
            total_amount: 0.0,
            tax_amount: 0.0,
            items: Vec::new(),
            date: None,
            image_url: image_url.into(),
            location: None,
            status: ReceiptStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Receipt {
    type Id = ReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Schema the receipt-extraction prompt asks the model to fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub store_name: String,
    pub total_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Unreadable dates (`""`, `"unknown"`, `null`) come back as `None`.
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(JsonValue::as_str).and_then(parse_receipt_date))
}

/// `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
fn parse_receipt_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.date_naive()))
}

impl ExtractedReceipt {
    /// Reject values that parse as JSON but cannot be a real receipt.
    pub fn validate(&self) -> DomainResult<()> {
        if self.store_name.trim().is_empty() {
            return Err(DomainError::validation("store_name is empty"));
        }
        check_amount("total_amount", self.total_amount)?;
        check_amount("tax_amount", self.tax_amount)?;
        for item in &self.items {
            check_amount("items[].price", item.price)?;
        }
        Ok(())
    }
}

fn check_amount(field: &str, value: f64) -> DomainResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DomainError::validation(format!("{field} must be a non-negative number, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracted_receipt_parses_model_schema() {
        let ex: ExtractedReceipt = serde_json::from_value(json!({
            "store_name": "Pizza Palace",
            "total_amount": 45.99,
            "tax_amount": 2.03,
            "items": [{"name": "Margherita Pizza", "price": 25.99, "quantity": 1, "category": "food"}],
            "date": "2026-10-18"
        }))
        .unwrap();

        assert_eq!(ex.items.len(), 1);
        assert_eq!(ex.date, NaiveDate::from_ymd_opt(2026, 10, 18));
        assert!(ex.validate().is_ok());
    }

    #[test]
    fn unreadable_dates_become_none() {
        for date in [json!(""), json!("unknown"), json!("18/10/2026"), json!(20261018), JsonValue::Null] {
            let ex: ExtractedReceipt = serde_json::from_value(json!({
                "store_name": "Pizza Palace",
                "total_amount": 45.99,
                "date": date
            }))
            .unwrap();
            assert_eq!(ex.date, None, "date {date}");
            assert_eq!(ex.store_name, "Pizza Palace");
        }
    }

    #[test]
    fn timestamp_dates_keep_their_day() {
        let ex: ExtractedReceipt = serde_json::from_value(json!({
            "store_name": "Quick Mart",
            "total_amount": 12.5,
            "date": "2026-10-18T19:30:00+05:30"
        }))
        .unwrap();
        assert_eq!(ex.date, NaiveDate::from_ymd_opt(2026, 10, 18));
    }

    #[test]
    fn negative_quantities_do_not_parse() {
        let res = serde_json::from_value::<ExtractedReceipt>(json!({
            "store_name": "X",
            "total_amount": 1.0,
            "items": [{"name": "a", "price": 1.0, "quantity": -1}]
        }));
        assert!(res.is_err());
    }

    #[test]
    fn validation_rejects_blank_store_and_negative_totals() {
        let mut ex = ExtractedReceipt {
            store_name: " ".into(),
            total_amount: 10.0,
            tax_amount: 0.0,
            items: vec![],
            date: None,
        };
        assert!(ex.validate().is_err());

        ex.store_name = "Quick Mart".into();
        ex.total_amount = -3.0;
        assert!(ex.validate().is_err());
    }

    #[test]
    fn uploaded_receipt_starts_empty() {
        let r = Receipt::uploaded(
            ReceiptId::new("r1"),
            OwnerId::new("u1"),
            "https://x/r1.jpg",
            Utc::now(),
        );
        assert_eq!(r.status, ReceiptStatus::Uploaded);
        assert_eq!(r.total_amount, 0.0);
        assert!(r.items.is_empty());
    }
}
