//! Order status state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The externally observable status of an order.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Confirmed ──► Cancelled
///           ├──► Paid
///           └──► Cancelled
/// ```
///
/// The checkout saga finalizes a `Pending` order exactly once: `Confirmed`
/// for cash on delivery, `Paid` for a completed card charge, `Cancelled` on
/// compensation. Administrative updates go through the same machine, with
/// re-setting the current status treated as an idempotent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order and items persisted, payment outcome not yet applied.
    #[default]
    Pending,

    /// Cash-on-delivery order accepted; payment collected on delivery.
    Confirmed,

    /// Card charge completed (terminal state).
    Paid,

    /// Order cancelled, by compensation or by an operator (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can move from this status to `next`.
    ///
    /// A same-status write is not a transition; callers treat it as a
    /// no-op before consulting this check.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Cancelled)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Error)]
#[error("unknown order status: {0}")]
pub struct ParseOrderStatusError(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "paid" => Ok(OrderStatus::Paid),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseOrderStatusError(other.to_string())),
        }
    }
}
