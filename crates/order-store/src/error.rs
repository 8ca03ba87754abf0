//! Order store error types.

use common::{OrderId, UserId};
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying store could not be reached. Callers must not
    /// proceed with writes that depend on the failed operation.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// An order with this id already exists. The allocator makes this
    /// unreachable in normal operation, but it is surfaced rather than
    /// ignored when it does happen.
    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(OrderId),

    /// A line-item insert failed partway through. The index reports how
    /// far insertion got so partial writes are never silently dropped.
    #[error("Item insert failed for order {order_id} at item {index} of {total}: {reason}")]
    ItemInsertFailed {
        order_id: OrderId,
        index: usize,
        total: usize,
        reason: String,
    },

    /// Another order already holds this user's idempotency key. Raised
    /// when a concurrent replay races past the pre-insert lookup; the
    /// existing order is the one to answer with, not a new row.
    #[error("Idempotency key '{key}' already used by user {user_id}")]
    IdempotencyKeyConflict { user_id: UserId, key: String },

    /// The requested status change is not reachable from the current state.
    #[error("Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
