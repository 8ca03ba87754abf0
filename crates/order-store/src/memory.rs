use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentRecord, Result, StoreError, store::OrderStore,
};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    payments: Vec<PaymentRecord>,
}

/// In-memory order store for tests and local runs.
///
/// Provides the same interface and semantics as the PostgreSQL
/// implementation, plus fault-injection switches so saga failure paths
/// can be exercised deterministically.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
    next_order_id: Arc<AtomicI64>,
    fail_on_add_items: Arc<AtomicBool>,
    fail_on_update_status: Arc<AtomicBool>,
    fail_on_insert_payment: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `add_items` calls fail with `ItemInsertFailed`.
    pub fn set_fail_on_add_items(&self, fail: bool) {
        self.fail_on_add_items.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `update_status` calls fail with a database error.
    pub fn set_fail_on_update_status(&self, fail: bool) {
        self.fail_on_update_status.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `insert_payment` calls fail with a database error.
    pub fn set_fail_on_insert_payment(&self, fail: bool) {
        self.fail_on_insert_payment.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of stored payment records.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn allocate_order_id(&self) -> Result<OrderId> {
        // fetch_add is the whole allocator: one atomic increment, no
        // read-then-write window for concurrent callers to race in.
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderId::new(id))
    }

    async fn create_order(&self, order: NewOrder) -> Result<()> {
        let mut state = self.state.write().await;

        if state.orders.contains_key(&order.order_id) {
            return Err(StoreError::DuplicateOrderId(order.order_id));
        }
        if let Some(key) = &order.idempotency_key
            && state
                .orders
                .values()
                .any(|o| o.user_id == order.user_id && o.idempotency_key.as_deref() == Some(key))
        {
            return Err(StoreError::IdempotencyKeyConflict {
                user_id: order.user_id,
                key: key.clone(),
            });
        }

        state.orders.insert(
            order.order_id,
            Order {
                order_id: order.order_id,
                user_id: order.user_id,
                total_price: order.total_price,
                status: OrderStatus::Pending,
                shipping_address: order.shipping_address,
                idempotency_key: order.idempotency_key,
                items: Vec::new(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn add_items(&self, order_id: OrderId, items: &[OrderItem]) -> Result<()> {
        if self.fail_on_add_items.load(Ordering::SeqCst) {
            return Err(StoreError::ItemInsertFailed {
                order_id,
                index: 0,
                total: items.len(),
                reason: "injected item insert failure".to_string(),
            });
        }

        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::ItemInsertFailed {
                order_id,
                index: 0,
                total: items.len(),
                reason: "order does not exist".to_string(),
            })?;

        order.items.extend_from_slice(items);
        Ok(())
    }

    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<bool> {
        if self.fail_on_update_status.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected status update failure".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };

        if order.status == new_status {
            return Ok(true);
        }
        if !order.status.can_transition_to(new_status) {
            return Err(StoreError::InvalidStatusTransition {
                order_id,
                from: order.status,
                to: new_status,
            });
        }

        order.status = new_status;
        Ok(true)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_id.cmp(&a.order_id));
        Ok(orders)
    }

    async fn insert_payment(&self, record: PaymentRecord) -> Result<()> {
        if self.fail_on_insert_payment.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected payment insert failure".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        state.payments.push(PaymentRecord {
            created_at: Utc::now(),
            ..record
        });
        Ok(())
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .next_back()
            .cloned())
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }
}
