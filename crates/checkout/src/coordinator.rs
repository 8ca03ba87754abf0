//! Saga coordinator for order creation with payment.

use common::{Money, OrderId, UserId};
use order_store::{NewOrder, OrderItem, OrderStatus, OrderStore, StoreError};
use payment::{PaymentGateway, PaymentOutcome, PaymentProcessor, PaymentRequest};

use crate::error::CheckoutError;
use crate::steps;

/// A create-order-with-payment request as handed to the saga.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    /// Caller-declared total. Trusted as-is; the catalog is consulted for
    /// display only.
    pub total_price: Money,
    pub shipping_address: String,
    pub payment: PaymentRequest,
    /// Optional client token; a replay with the same token returns the
    /// prior outcome instead of creating a second order.
    pub idempotency_key: Option<String>,
}

/// What the saga hands back on success.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub message: String,
    /// True when an idempotency-key replay short-circuited to a prior
    /// order instead of running the saga.
    pub replayed: bool,
}

/// Orchestrates the checkout saga.
///
/// Drives allocation, order and item persistence, the payment attempt,
/// and status finalization, with a single compensating action (cancel)
/// when a step fails after the order row exists. Holds no lock shared
/// across orders: one order's gateway wait never blocks another order.
pub struct CheckoutCoordinator<S, G>
where
    S: OrderStore,
    G: PaymentGateway,
{
    store: S,
    processor: PaymentProcessor<S, G>,
}

impl<S, G> CheckoutCoordinator<S, G>
where
    S: OrderStore + Clone,
    G: PaymentGateway,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, gateway: G) -> Self {
        let processor = PaymentProcessor::new(store.clone(), gateway);
        Self { store, processor }
    }

    /// Creates a coordinator with a non-default gateway timeout.
    pub fn with_payment_timeout(store: S, gateway: G, timeout: std::time::Duration) -> Self {
        let processor = PaymentProcessor::new(store.clone(), gateway).with_timeout(timeout);
        Self { store, processor }
    }

    /// Executes the checkout saga for one request.
    ///
    /// Once the order row is persisted the saga always runs to a terminal
    /// status; there is no silent abandonment. The saga never retries a
    /// failed step, so a resubmission cannot double-charge.
    #[tracing::instrument(skip(self, request), fields(saga_type = steps::SAGA_TYPE, user_id = %request.user_id))]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<CheckoutReceipt, CheckoutError> {
        metrics::counter!("checkout_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        // Reject before any write: an order must never leave pending with
        // no items, and quantities are positive by contract.
        if request.items.is_empty() {
            return Err(CheckoutError::InvalidRequest(
                "order has no items".to_string(),
            ));
        }
        if let Some(item) = request.items.iter().find(|i| i.quantity == 0) {
            return Err(CheckoutError::InvalidRequest(format!(
                "item {} has zero quantity",
                item.meal_id
            )));
        }
        if request.total_price.is_negative() {
            return Err(CheckoutError::InvalidRequest(
                "total price is negative".to_string(),
            ));
        }

        // Idempotency-key replay: hand back the prior outcome.
        if let Some(key) = &request.idempotency_key
            && let Some(existing) = self
                .store
                .find_order_by_idempotency_key(request.user_id, key)
                .await?
        {
            let payment = self.store.get_payment_for_order(existing.order_id).await?;
            tracing::info!(order_id = %existing.order_id, key = %key, "idempotency replay");
            return Ok(CheckoutReceipt {
                order_id: existing.order_id,
                payment_id: payment.map(|p| p.payment_id),
                status: existing.status,
                message: "order already placed".to_string(),
                replayed: true,
            });
        }

        // 1. Allocate the order id. Failure aborts before any write.
        tracing::info!(step = steps::STEP_ALLOCATE_ID, "saga step started");
        let order_id = self.store.allocate_order_id().await?;

        // 2. Persist the order as pending. Failure aborts; nothing
        //    further was written.
        tracing::info!(step = steps::STEP_PERSIST_ORDER, %order_id, "saga step started");
        self.store
            .create_order(NewOrder {
                order_id,
                user_id: request.user_id,
                total_price: request.total_price,
                shipping_address: request.shipping_address.clone(),
                idempotency_key: request.idempotency_key.clone(),
            })
            .await?;

        // 3. Persist the items. From here on every failure compensates.
        tracing::info!(step = steps::STEP_PERSIST_ITEMS, %order_id, "saga step started");
        if let Err(e) = self.store.add_items(order_id, &request.items).await {
            self.compensate(order_id, steps::STEP_PERSIST_ITEMS, &e.to_string())
                .await?;
            self.record_failure(saga_start);
            return Err(e.into());
        }

        // 4. Run the payment attempt. The processor blocks only this
        //    saga's task while waiting on the gateway.
        tracing::info!(step = steps::STEP_PROCESS_PAYMENT, %order_id, "saga step started");
        let outcome = match self
            .processor
            .process(&request.payment, request.total_price, order_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // The processor only fails here while recording an
                // already-approved charge, so the money may have moved.
                tracing::error!(
                    %order_id,
                    error = %e,
                    "store fault while recording an approved payment; verify the charge during reconciliation"
                );
                self.compensate(order_id, steps::STEP_PROCESS_PAYMENT, &e.to_string())
                    .await?;
                self.record_failure(saga_start);
                return Err(e.into());
            }
        };

        match outcome {
            PaymentOutcome::Approved {
                payment_id,
                message,
            } => {
                // 5. Commit point: finalize the externally observable
                //    status. The payment already happened, so a failure
                //    here is a reconciliation anomaly, not a plain error.
                let final_status = match request.payment {
                    PaymentRequest::Cash => OrderStatus::Confirmed,
                    PaymentRequest::Card(_) => OrderStatus::Paid,
                };
                tracing::info!(step = steps::STEP_FINALIZE_STATUS, %order_id, %final_status, "saga step started");
                self.finalize(order_id, final_status, &payment_id).await?;

                let duration = saga_start.elapsed().as_secs_f64();
                metrics::histogram!("checkout_duration_seconds").record(duration);
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(%order_id, %payment_id, duration, "checkout saga completed");

                Ok(CheckoutReceipt {
                    order_id,
                    payment_id: Some(payment_id),
                    status: final_status,
                    message: message.to_string(),
                    replayed: false,
                })
            }
            PaymentOutcome::Rejected { failure } => {
                self.compensate(order_id, steps::STEP_PROCESS_PAYMENT, failure.message())
                    .await?;
                self.record_failure(saga_start);
                Err(CheckoutError::PaymentRejected { order_id, failure })
            }
        }
    }

    /// Writes the final status after an approved payment.
    async fn finalize(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        payment_id: &str,
    ) -> Result<(), CheckoutError> {
        let anomaly = |details: String| {
            metrics::counter!("checkout_reconciliation_anomalies").increment(1);
            tracing::error!(
                %order_id,
                payment_id,
                step = steps::STEP_FINALIZE_STATUS,
                details,
                "payment completed but order status is stale; manual reconciliation required"
            );
            CheckoutError::ReconciliationAnomaly {
                order_id,
                step: steps::STEP_FINALIZE_STATUS,
                details,
            }
        };

        match self.store.update_status(order_id, status).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(anomaly("order row not found at finalize".to_string())),
            Err(e) => Err(anomaly(e.to_string())),
        }
    }

    /// The single compensating action: mark the order `cancelled`.
    ///
    /// Setting `cancelled` twice is a no-op, so compensation is always
    /// safe to attempt. When even this write fails the order is stuck
    /// between states and the anomaly is surfaced, never swallowed.
    async fn compensate(
        &self,
        order_id: OrderId,
        failed_step: &'static str,
        reason: &str,
    ) -> Result<(), CheckoutError> {
        tracing::warn!(%order_id, failed_step, reason, "running compensation");

        match self.store.update_status(order_id, OrderStatus::Cancelled).await {
            Ok(true) => {
                tracing::info!(%order_id, "order cancelled");
                Ok(())
            }
            Ok(false) => {
                // The row we just created is gone: inconsistent store.
                self.raise_anomaly(order_id, failed_step, "order row not found at compensation")
            }
            Err(StoreError::InvalidStatusTransition { from, .. }) => self.raise_anomaly(
                order_id,
                failed_step,
                &format!("cannot cancel from status {from}"),
            ),
            Err(e) => self.raise_anomaly(order_id, failed_step, &e.to_string()),
        }
    }

    fn raise_anomaly(
        &self,
        order_id: OrderId,
        step: &'static str,
        details: &str,
    ) -> Result<(), CheckoutError> {
        metrics::counter!("checkout_reconciliation_anomalies").increment(1);
        tracing::error!(
            %order_id,
            step,
            details,
            "compensation failed; order left in an unknown state, manual reconciliation required"
        );
        Err(CheckoutError::ReconciliationAnomaly {
            order_id,
            step,
            details: details.to_string(),
        })
    }

    fn record_failure(&self, saga_start: std::time::Instant) {
        metrics::histogram!("checkout_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        metrics::counter!("checkout_failed").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MealId;
    use order_store::InMemoryOrderStore;
    use payment::{CardDetails, SimulatedGateway};
    use std::time::Duration;

    fn coordinator(
        store: InMemoryOrderStore,
    ) -> CheckoutCoordinator<InMemoryOrderStore, SimulatedGateway> {
        CheckoutCoordinator::new(store, SimulatedGateway::with_latency(Duration::ZERO))
    }

    fn cash_request() -> PlaceOrder {
        PlaceOrder {
            user_id: UserId::new(1),
            items: vec![OrderItem::new(1i64, 2)],
            total_price: Money::from_cents(1998),
            shipping_address: "12 Main St".to_string(),
            payment: PaymentRequest::Cash,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn empty_order_is_rejected_before_any_write() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());

        let mut request = cash_request();
        request.items.clear();

        let result = coordinator.place_order(request).await;
        assert!(matches!(result, Err(CheckoutError::InvalidRequest(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn zero_quantity_item_is_rejected() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());

        let mut request = cash_request();
        request.items = vec![OrderItem::new(MealId::new(1), 0)];

        let result = coordinator.place_order(request).await;
        assert!(matches!(result, Err(CheckoutError::InvalidRequest(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn cash_checkout_confirms_the_order() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());

        let receipt = coordinator.place_order(cash_request()).await.unwrap();
        assert_eq!(receipt.status, OrderStatus::Confirmed);
        assert_eq!(receipt.message, "cash on delivery order confirmed");
        assert!(!receipt.replayed);

        let order = store.get_order(receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test]
    async fn item_insert_failure_cancels_the_order() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());
        store.set_fail_on_add_items(true);

        let result = coordinator.place_order(cash_request()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Store(StoreError::ItemInsertFailed { .. }))
        ));

        // One order exists and it is cancelled; no payment was attempted.
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.payment_count().await, 0);
        let orders = store.get_orders_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn finalize_failure_after_approved_payment_is_an_anomaly() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());
        store.set_fail_on_update_status(true);

        let result = coordinator.place_order(cash_request()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::ReconciliationAnomaly { step, .. })
                if step == steps::STEP_FINALIZE_STATUS
        ));

        // The payment was recorded before the finalize write failed, so
        // the order and the payment outcome now disagree.
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn payment_record_fault_after_approval_is_compensated() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());
        store.set_fail_on_insert_payment(true);

        let mut request = cash_request();
        request.payment = PaymentRequest::Card(CardDetails {
            card_number: "4111111111111111".to_string(),
            expiry: "12/29".to_string(),
            cvv: "123".to_string(),
        });

        let result = coordinator.place_order(request).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Store(StoreError::Unavailable(_)))
        ));

        let orders = store.get_orders_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn failed_compensation_raises_an_anomaly() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());
        store.set_fail_on_add_items(true);
        store.set_fail_on_update_status(true);

        let result = coordinator.place_order(cash_request()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::ReconciliationAnomaly { .. })
        ));
    }

    #[tokio::test]
    async fn idempotency_key_replay_returns_prior_order() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());

        let mut request = cash_request();
        request.idempotency_key = Some("req-1".to_string());

        let first = coordinator.place_order(request.clone()).await.unwrap();
        let second = coordinator.place_order(request).await.unwrap();

        assert_eq!(second.order_id, first.order_id);
        assert_eq!(second.status, OrderStatus::Confirmed);
        assert_eq!(second.payment_id, first.payment_id);
        assert!(second.replayed);
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn gateway_timeout_compensates_to_cancelled() {
        let store = InMemoryOrderStore::new();
        let coordinator = CheckoutCoordinator::with_payment_timeout(
            store.clone(),
            SimulatedGateway::with_latency(Duration::from_secs(60)),
            Duration::from_millis(20),
        );

        let mut request = cash_request();
        request.payment = PaymentRequest::Card(CardDetails {
            card_number: "4111111111111111".to_string(),
            expiry: "12/29".to_string(),
            cvv: "123".to_string(),
        });

        let result = coordinator.place_order(request).await;
        let Err(CheckoutError::PaymentRejected { order_id, failure }) = result else {
            panic!("expected PaymentRejected");
        };
        assert_eq!(failure, payment::PaymentFailure::GatewayTimeout);

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn card_decline_compensates_to_cancelled() {
        let store = InMemoryOrderStore::new();
        let coordinator = coordinator(store.clone());

        let mut request = cash_request();
        request.payment = PaymentRequest::Card(CardDetails {
            card_number: "4111111111110000".to_string(),
            expiry: "12/29".to_string(),
            cvv: "123".to_string(),
        });

        let result = coordinator.place_order(request).await;
        let Err(CheckoutError::PaymentRejected { order_id, failure }) = result else {
            panic!("expected PaymentRejected");
        };
        assert_eq!(failure.message(), "payment declined");

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(store.get_payment_for_order(order_id).await.unwrap().is_none());
    }
}
