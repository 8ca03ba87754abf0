//! Payment processor: validation, gateway charge, and record keeping.

use std::time::Duration;

use chrono::Utc;
use common::{Money, OrderId};
use order_store::{OrderStore, PaymentMethod, PaymentRecord, PaymentStatus, StoreError};
use uuid::Uuid;

use crate::gateway::{ChargeOutcome, PaymentGateway};
use crate::validator::{self, CardDetails, PaymentRequest};

/// Why a payment attempt did not go through.
///
/// All of these are business outcomes, not system faults: the order saga
/// responds to every one of them with the same compensating cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFailure {
    /// Card fields failed validation; nothing was sent to the gateway.
    InvalidCardDetails,
    /// The gateway refused the charge.
    Declined,
    /// The gateway did not answer within the processor's timeout.
    GatewayTimeout,
    /// The gateway could not be reached at all.
    GatewayUnavailable,
}

impl PaymentFailure {
    /// The user-facing message for this failure.
    pub fn message(&self) -> &'static str {
        match self {
            PaymentFailure::InvalidCardDetails => "invalid card details",
            PaymentFailure::Declined => "payment declined",
            PaymentFailure::GatewayTimeout => "payment gateway timed out",
            PaymentFailure::GatewayUnavailable => "payment gateway unavailable",
        }
    }
}

/// The result of a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Payment went through; a payment record exists.
    Approved {
        payment_id: String,
        message: &'static str,
    },
    /// Payment did not go through; no record was stored.
    Rejected { failure: PaymentFailure },
}

impl PaymentOutcome {
    /// Returns true for an approved payment.
    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentOutcome::Approved { .. })
    }

    /// The user-facing message for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            PaymentOutcome::Approved { message, .. } => message,
            PaymentOutcome::Rejected { failure } => failure.message(),
        }
    }
}

/// Executes payment attempts and records their outcomes.
///
/// Cash payments always succeed and are recorded as pending (collected on
/// delivery). Card payments run the validator, then the gateway, bounded
/// by a timeout; a record is stored only for completed charges.
pub struct PaymentProcessor<S, G> {
    store: S,
    gateway: G,
    timeout: Duration,
}

impl<S, G> PaymentProcessor<S, G>
where
    S: OrderStore,
    G: PaymentGateway,
{
    /// Creates a processor with the default 5 second gateway timeout.
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            timeout: Duration::from_secs(5),
        }
    }

    /// Overrides the gateway timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Processes a payment attempt for the given order and amount.
    ///
    /// `Err` is reserved for store faults while recording an approved
    /// payment; declines, validation failures, and gateway trouble all
    /// come back as `Ok(PaymentOutcome::Rejected { .. })`.
    #[tracing::instrument(skip(self, request), fields(%order_id))]
    pub async fn process(
        &self,
        request: &PaymentRequest,
        amount: Money,
        order_id: OrderId,
    ) -> Result<PaymentOutcome, StoreError> {
        match request {
            PaymentRequest::Cash => self.process_cash(amount, order_id).await,
            PaymentRequest::Card(card) => self.process_card(card, amount, order_id).await,
        }
    }

    async fn process_cash(
        &self,
        amount: Money,
        order_id: OrderId,
    ) -> Result<PaymentOutcome, StoreError> {
        let payment_id = generate_payment_id();
        self.store
            .insert_payment(PaymentRecord {
                payment_id: payment_id.clone(),
                order_id,
                method: PaymentMethod::Cash,
                amount,
                status: PaymentStatus::Pending,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(%order_id, %payment_id, "cash payment recorded");
        Ok(PaymentOutcome::Approved {
            payment_id,
            message: "cash on delivery order confirmed",
        })
    }

    async fn process_card(
        &self,
        card: &CardDetails,
        amount: Money,
        order_id: OrderId,
    ) -> Result<PaymentOutcome, StoreError> {
        if validator::validate_card(card).is_err() {
            tracing::info!(%order_id, "card validation failed");
            return Ok(PaymentOutcome::Rejected {
                failure: PaymentFailure::InvalidCardDetails,
            });
        }

        let charge = tokio::time::timeout(self.timeout, self.gateway.charge(card, amount)).await;
        let outcome = match charge {
            Err(_elapsed) => {
                tracing::warn!(%order_id, timeout = ?self.timeout, "gateway charge timed out");
                return Ok(PaymentOutcome::Rejected {
                    failure: PaymentFailure::GatewayTimeout,
                });
            }
            Ok(Err(e)) => {
                tracing::warn!(%order_id, error = %e, "gateway unreachable");
                return Ok(PaymentOutcome::Rejected {
                    failure: PaymentFailure::GatewayUnavailable,
                });
            }
            Ok(Ok(outcome)) => outcome,
        };

        if outcome == ChargeOutcome::Declined {
            tracing::info!(%order_id, "card charge declined");
            return Ok(PaymentOutcome::Rejected {
                failure: PaymentFailure::Declined,
            });
        }

        let payment_id = generate_payment_id();
        self.store
            .insert_payment(PaymentRecord {
                payment_id: payment_id.clone(),
                order_id,
                method: PaymentMethod::Card,
                amount,
                status: PaymentStatus::Completed,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(%order_id, %payment_id, "card payment completed");
        Ok(PaymentOutcome::Approved {
            payment_id,
            message: "payment successful",
        })
    }
}

/// Time-based component plus a random component: collision-resistant
/// without a coordinating counter.
fn generate_payment_id() -> String {
    format!(
        "PAY-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SimulatedGateway;
    use crate::validator::CardDetails;
    use common::UserId;
    use order_store::{InMemoryOrderStore, NewOrder};

    fn card_request(number: &str) -> PaymentRequest {
        PaymentRequest::Card(CardDetails {
            card_number: number.to_string(),
            expiry: "12/29".to_string(),
            cvv: "123".to_string(),
        })
    }

    async fn setup_order(store: &InMemoryOrderStore) -> OrderId {
        let order_id = store.allocate_order_id().await.unwrap();
        store
            .create_order(NewOrder {
                order_id,
                user_id: UserId::new(1),
                total_price: Money::from_cents(1998),
                shipping_address: "12 Main St".to_string(),
                idempotency_key: None,
            })
            .await
            .unwrap();
        order_id
    }

    fn processor(
        store: InMemoryOrderStore,
    ) -> PaymentProcessor<InMemoryOrderStore, SimulatedGateway> {
        PaymentProcessor::new(store, SimulatedGateway::with_latency(Duration::ZERO))
    }

    #[tokio::test]
    async fn cash_records_pending_payment() {
        let store = InMemoryOrderStore::new();
        let order_id = setup_order(&store).await;
        let processor = processor(store.clone());

        let outcome = processor
            .process(&PaymentRequest::Cash, Money::from_cents(1998), order_id)
            .await
            .unwrap();

        assert!(outcome.is_approved());
        assert_eq!(outcome.message(), "cash on delivery order confirmed");

        let record = store.get_payment_for_order(order_id).await.unwrap().unwrap();
        assert_eq!(record.method, PaymentMethod::Cash);
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.amount.cents(), 1998);
    }

    #[tokio::test]
    async fn approved_card_records_completed_payment() {
        let store = InMemoryOrderStore::new();
        let order_id = setup_order(&store).await;
        let processor = processor(store.clone());

        let outcome = processor
            .process(
                &card_request("4111111111111111"),
                Money::from_cents(1998),
                order_id,
            )
            .await
            .unwrap();

        assert!(outcome.is_approved());
        assert_eq!(outcome.message(), "payment successful");

        let record = store.get_payment_for_order(order_id).await.unwrap().unwrap();
        assert_eq!(record.method, PaymentMethod::Card);
        assert_eq!(record.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn declined_card_stores_nothing() {
        let store = InMemoryOrderStore::new();
        let order_id = setup_order(&store).await;
        let processor = processor(store.clone());

        let outcome = processor
            .process(
                &card_request("4111111111110000"),
                Money::from_cents(1998),
                order_id,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Rejected {
                failure: PaymentFailure::Declined
            }
        );
        assert_eq!(outcome.message(), "payment declined");
        assert!(store.get_payment_for_order(order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_card_never_reaches_the_gateway() {
        let store = InMemoryOrderStore::new();
        let order_id = setup_order(&store).await;
        // A gateway that would block forever if called.
        let gateway = SimulatedGateway::with_latency(Duration::from_secs(3600));
        let processor = PaymentProcessor::new(store.clone(), gateway);

        let outcome = processor
            .process(&card_request("abc"), Money::from_cents(1998), order_id)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Rejected {
                failure: PaymentFailure::InvalidCardDetails
            }
        );
        assert!(store.get_payment_for_order(order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slow_gateway_times_out() {
        let store = InMemoryOrderStore::new();
        let order_id = setup_order(&store).await;
        let gateway = SimulatedGateway::with_latency(Duration::from_secs(60));
        let processor =
            PaymentProcessor::new(store.clone(), gateway).with_timeout(Duration::from_millis(20));

        let outcome = processor
            .process(
                &card_request("4111111111111111"),
                Money::from_cents(1998),
                order_id,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Rejected {
                failure: PaymentFailure::GatewayTimeout
            }
        );
        assert!(store.get_payment_for_order(order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn payment_ids_are_unique() {
        let a = generate_payment_id();
        let b = generate_payment_id();
        assert!(a.starts_with("PAY-"));
        assert_ne!(a, b);
    }
}
