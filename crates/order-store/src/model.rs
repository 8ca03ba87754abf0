//! Order, line-item, and payment-record types.

use chrono::{DateTime, Utc};
use common::{MealId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::OrderStatus;

/// A single line item on an order.
///
/// Display fields (meal name, unit price) are resolved at read time through
/// the catalog, not stored with the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The catalog meal this line refers to.
    pub meal_id: MealId,

    /// Quantity ordered, always positive.
    pub quantity: u32,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(meal_id: impl Into<MealId>, quantity: u32) -> Self {
        Self {
            meal_id: meal_id.into(),
            quantity,
        }
    }
}

/// The fields required to insert a new order row.
///
/// The status always starts as [`OrderStatus::Pending`] and `created_at`
/// is set by the store, so neither appears here.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub shipping_address: String,
    pub idempotency_key: Option<String>,
}

/// A persisted order with its line items eagerly attached.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub idempotency_key: Option<String>,
    /// Line items in insertion order.
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// How a payment was (or will be) collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Collected on delivery.
    Cash,
    /// Charged through the card gateway.
    Card,
}

impl PaymentMethod {
    /// Returns the method name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown payment method string.
#[derive(Debug, Error)]
#[error("unknown payment method: {0}")]
pub struct ParsePaymentMethodError(pub String);

impl std::str::FromStr for PaymentMethod {
    type Err = ParsePaymentMethodError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            other => Err(ParsePaymentMethodError(other.to_string())),
        }
    }
}

/// The settlement state of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Cash payments start here: the money is collected on delivery.
    Pending,
    /// Card payments are recorded only after the gateway approved them.
    Completed,
}

impl PaymentStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown payment status string.
#[derive(Debug, Error)]
#[error("unknown payment status: {0}")]
pub struct ParsePaymentStatusError(pub String);

impl std::str::FromStr for PaymentStatus {
    type Err = ParsePaymentStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(ParsePaymentStatusError(other.to_string())),
        }
    }
}

/// A recorded payment attempt outcome for an order.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}
