//! Checkout saga error types.

use common::OrderId;
use order_store::StoreError;
use payment::PaymentFailure;
use thiserror::Error;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request was rejected before any write happened.
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// The payment attempt was rejected. The order exists and was
    /// compensated to `cancelled`; the caller may retry with different
    /// payment details.
    #[error("Payment rejected for order {order_id}: {}", failure.message())]
    PaymentRejected {
        order_id: OrderId,
        failure: PaymentFailure,
    },

    /// A store fault occurred. If an order row had already been written
    /// it was compensated to `cancelled` before this was returned.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),

    /// A finalize-or-compensate write failed after the payment outcome
    /// was already known. The order's recorded status and the payment
    /// outcome disagree; manual reconciliation is required.
    #[error("Reconciliation anomaly for order {order_id} at step '{step}': {details}")]
    ReconciliationAnomaly {
        order_id: OrderId,
        step: &'static str,
        details: String,
    },
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
