//! Blinkit order dialect (quick-commerce groceries).

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use raseed_core::{DomainError, DomainResult, OwnerId};

use crate::bill::{BillItem, DeliveryStatus, ServiceTag, ThirdPartyBill};

#[derive(Debug, Deserialize)]
struct Order {
    order_no: String,
    merchant: String,
    grand_total: f64,
    cart: Vec<CartLine>,
    ordered_hours_ago: i64,
    delivery: String,
}

#[derive(Debug, Deserialize)]
struct CartLine {
    product: String,
    mrp: f64,
    units: u32,
    #[serde(default)]
    category: String,
}

pub(crate) fn normalize(
    owner: &OwnerId,
    raw: JsonValue,
    now: DateTime<Utc>,
) -> DomainResult<ThirdPartyBill> {
    let order: Order = serde_json::from_value(raw)
        .map_err(|e| DomainError::validation(format!("blinkit order: {e}")))?;

    let status = match order.delivery.as_str() {
        "confirmed" => DeliveryStatus::Placed,
        "dispatched" => DeliveryStatus::OutForDelivery,
        "delivered" => DeliveryStatus::Delivered,
        "cancelled" => DeliveryStatus::Cancelled,
        other => return Err(DomainError::unrecognized("blinkit delivery", other)),
    };

    Ok(ThirdPartyBill {
        id: ThirdPartyBill::derive_id(ServiceTag::Blinkit, &order.order_no),
        user_id: owner.clone(),
        service: ServiceTag::Blinkit,
        order_id: order.order_no,
        vendor: order.merchant,
        total_amount: order.grand_total,
        items: order
            .cart
            .into_iter()
            .map(|l| BillItem {
                name: l.product,
                price: l.mrp,
                quantity: l.units,
                category: l.category,
            })
            .collect(),
        order_date: now - Duration::hours(order.ordered_hours_ago),
        status,
        created_at: now,
    })
}

pub(crate) fn fixture_orders() -> Vec<JsonValue> {
    vec![json!({
        "order_no": "BLK789012",
        "merchant": "Quick Mart",
        "grand_total": 67.25,
        "cart": [
            {"product": "Milk", "mrp": 4.99, "units": 2, "category": "dairy"},
            {"product": "Bread", "mrp": 3.99, "units": 1, "category": "bakery"},
            {"product": "Eggs", "mrp": 5.99, "units": 1, "category": "dairy"},
            {"product": "Bananas", "mrp": 2.99, "units": 1, "category": "fruits"},
            {"product": "Rice", "mrp": 12.99, "units": 1, "category": "grains"},
            {"product": "Tomatoes", "mrp": 3.99, "units": 1, "category": "vegetables"},
            {"product": "Delivery Fee", "mrp": 2.99, "units": 1, "category": "service"},
            {"product": "Tax", "mrp": 3.32, "units": 1, "category": "tax"}
        ],
        "ordered_hours_ago": 12,
        "delivery": "delivered"
    })]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_lines_map_to_bill_items() {
        let bill = normalize(&OwnerId::new("u1"), fixture_orders().remove(0), Utc::now()).unwrap();
        assert_eq!(bill.id.as_str(), "blinkit_BLK789012");
        assert_eq!(bill.items.len(), 8);
        assert_eq!(bill.items[0].quantity, 2);
    }

    #[test]
    fn missing_fields_are_a_validation_error() {
        let err = normalize(&OwnerId::new("u1"), json!({"order_no": "X"}), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
