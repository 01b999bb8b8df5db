//! Zomato order dialect (restaurant delivery).

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use raseed_core::{DomainError, DomainResult, OwnerId};

use crate::bill::{BillItem, DeliveryStatus, ServiceTag, ThirdPartyBill};

#[derive(Debug, Deserialize)]
struct Order {
    order_id: String,
    restaurant: Restaurant,
    order_total: f64,
    dishes: Vec<Dish>,
    #[serde(default)]
    charges: Vec<Charge>,
    placed_hours_ago: i64,
    order_state: String,
}

#[derive(Debug, Deserialize)]
struct Restaurant {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Dish {
    dish_name: String,
    unit_cost: f64,
    qty: u32,
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Charge {
    label: String,
    amount: f64,
}

pub(crate) fn normalize(
    owner: &OwnerId,
    raw: JsonValue,
    now: DateTime<Utc>,
) -> DomainResult<ThirdPartyBill> {
    let order: Order = serde_json::from_value(raw)
        .map_err(|e| DomainError::validation(format!("zomato order: {e}")))?;

    let status = match order.order_state.as_str() {
        "PLACED" => DeliveryStatus::Placed,
        "ON_THE_WAY" => DeliveryStatus::OutForDelivery,
        "DELIVERED" => DeliveryStatus::Delivered,
        "CANCELLED" => DeliveryStatus::Cancelled,
        other => return Err(DomainError::unrecognized("zomato order_state", other)),
    };

    let mut items: Vec<BillItem> = order
        .dishes
        .into_iter()
        .map(|d| BillItem {
            name: d.dish_name,
            price: d.unit_cost,
            quantity: d.qty,
            category: d.kind,
        })
        .collect();

    // Fees and taxes are listed as single-unit lines.
    items.extend(order.charges.into_iter().map(|c| BillItem {
        category: if c.label.eq_ignore_ascii_case("tax") {
            "tax".to_string()
        } else {
            "service".to_string()
        },
        name: c.label,
        price: c.amount,
        quantity: 1,
    }));

    Ok(ThirdPartyBill {
        id: ThirdPartyBill::derive_id(ServiceTag::Zomato, &order.order_id),
        user_id: owner.clone(),
        service: ServiceTag::Zomato,
        order_id: order.order_id,
        vendor: order.restaurant.name,
        total_amount: order.order_total,
        items,
        order_date: now - Duration::hours(order.placed_hours_ago),
        status,
        created_at: now,
    })
}

pub(crate) fn fixture_orders() -> Vec<JsonValue> {
    vec![
        json!({
            "order_id": "ZOM123456",
            "restaurant": {"name": "Pizza Palace"},
            "order_total": 45.99,
            "dishes": [
                {"dish_name": "Margherita Pizza", "unit_cost": 25.99, "qty": 1, "kind": "food"},
                {"dish_name": "Garlic Bread", "unit_cost": 8.99, "qty": 1, "kind": "food"},
                {"dish_name": "Coke", "unit_cost": 3.99, "qty": 2, "kind": "beverage"}
            ],
            "charges": [
                {"label": "Delivery Fee", "amount": 4.99},
                {"label": "Tax", "amount": 2.03}
            ],
            "placed_hours_ago": 24,
            "order_state": "DELIVERED"
        }),
        json!({
            "order_id": "ZOM123457",
            "restaurant": {"name": "Burger House"},
            "order_total": 32.50,
            "dishes": [
                {"dish_name": "Chicken Burger", "unit_cost": 18.99, "qty": 1, "kind": "food"},
                {"dish_name": "French Fries", "unit_cost": 6.99, "qty": 1, "kind": "food"},
                {"dish_name": "Milkshake", "unit_cost": 4.99, "qty": 1, "kind": "beverage"}
            ],
            "charges": [
                {"label": "Delivery Fee", "amount": 3.99},
                {"label": "Tax", "amount": 1.54}
            ],
            "placed_hours_ago": 48,
            "order_state": "DELIVERED"
        }),
    ]
}
