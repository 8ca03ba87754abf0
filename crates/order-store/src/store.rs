use async_trait::async_trait;
use common::{OrderId, UserId};

use crate::{NewOrder, Order, OrderItem, OrderStatus, PaymentRecord, Result};

/// Core trait for order store implementations.
///
/// The store persists orders, their line items, and payment records, and
/// hands out order ids. All writes are durable on return and no method
/// performs implicit retries. Implementations must be thread-safe
/// (Send + Sync); operations on different orders may run fully in
/// parallel, id allocation is the only point of cross-order serialization.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Allocates the next order id.
    ///
    /// Every call returns an id strictly greater than all previously
    /// allocated ids, even under concurrent callers. Implemented as an
    /// atomic increment, never as an unguarded read-max-plus-one.
    ///
    /// Fails with [`StoreError::Unavailable`](crate::StoreError::Unavailable)
    /// when the store cannot be reached; the caller must not proceed to
    /// create an order.
    async fn allocate_order_id(&self) -> Result<OrderId>;

    /// Inserts a new order row with status [`OrderStatus::Pending`] and
    /// no items.
    ///
    /// Fails with [`StoreError::DuplicateOrderId`](crate::StoreError::DuplicateOrderId)
    /// if the id already exists.
    async fn create_order(&self, order: NewOrder) -> Result<()>;

    /// Inserts one row per item for an existing order.
    ///
    /// Any failure is surfaced as
    /// [`StoreError::ItemInsertFailed`](crate::StoreError::ItemInsertFailed)
    /// reporting how far insertion got; partial writes are never silently
    /// dropped.
    async fn add_items(&self, order_id: OrderId, items: &[OrderItem]) -> Result<()>;

    /// Updates an order's status.
    ///
    /// Returns `false` (not an error) when the order does not exist.
    /// Writing the current status again is an idempotent no-op returning
    /// `true`. Any other change must be reachable per
    /// [`OrderStatus::can_transition_to`] or the call fails with
    /// [`StoreError::InvalidStatusTransition`](crate::StoreError::InvalidStatusTransition).
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<bool>;

    /// Loads an order with its items eagerly attached.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads all orders for a user, newest first (order id descending),
    /// each with items eagerly attached.
    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Inserts a payment record. The store sets `created_at` on write.
    async fn insert_payment(&self, record: PaymentRecord) -> Result<()>;

    /// Loads the most recent payment record for an order, if any.
    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<PaymentRecord>>;

    /// Finds a user's order carrying the given idempotency key.
    ///
    /// Used to short-circuit a replayed create to its prior outcome
    /// instead of producing a duplicate order.
    async fn find_order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>>;
}
