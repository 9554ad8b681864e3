//! Request and response schemas of the order API.

use std::fmt::Write as _;

use ququ_core::{DeliveryOption, OrderId, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payment method recorded on orders paid through PayPal.
pub const PAYMENT_METHOD_PAYPAL: &str = "PayPal";

/// One purchased line as stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    pub image: String,
}

/// Delivery address as stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    pub delivery_option: DeliveryOption,
}

/// The part of the order API's create response this service relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedOrder {
    #[serde(rename = "_id", alias = "id")]
    pub id: OrderId,
}

/// Body of `PUT /api/orders/{id}/payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub payment_id: String,
    /// Provider status, lowercased (`completed`).
    pub status: String,
}

/// Error body returned by the order API on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    /// Field errors, either a map of field to message (or `{message}` object)
    /// or a plain list.
    #[serde(default)]
    pub errors: Option<Value>,
}

impl ApiErrorBody {
    /// Field error messages (map values in key order, or list order).
    #[must_use]
    pub fn field_messages(&self) -> Vec<String> {
        let values: Vec<&Value> = match &self.errors {
            Some(Value::Object(map)) => map.values().collect(),
            Some(Value::Array(list)) => list.iter().collect(),
            Some(other) => vec![other],
            None => Vec::new(),
        };
        values
            .into_iter()
            .filter_map(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    /// The most specific message available: the server message (followed by
    /// any field errors), else the field errors joined by commas.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        let fields = self.field_messages().join(", ");
        match self.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => {
                let mut out = message.to_owned();
                if !fields.is_empty() {
                    let _ = write!(out, " {fields}");
                }
                Some(out)
            }
            _ if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}
