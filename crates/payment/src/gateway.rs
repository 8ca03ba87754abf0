//! Payment gateway trait and simulated implementation.

use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use thiserror::Error;

use crate::validator::CardDetails;

/// The gateway's answer to a charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved,
    Declined,
}

/// Errors raised by the gateway itself, as opposed to a decline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("Payment gateway unreachable: {0}")]
    Unreachable(String),
}

/// Trait for card charge execution.
///
/// Kept behind a trait so a real gateway integration can replace the
/// simulation without touching the checkout saga.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to charge the card for the given amount.
    async fn charge(
        &self,
        card: &CardDetails,
        amount: Money,
    ) -> Result<ChargeOutcome, GatewayError>;
}

/// Simulated gateway for local runs and tests.
///
/// Sleeps for a configurable latency, then approves everything except the
/// forced-decline fixture: any card number ending in the digits `0000`.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    /// Creates a gateway with the default one-second simulated latency.
    pub fn new() -> Self {
        Self {
            latency: Duration::from_secs(1),
        }
    }

    /// Creates a gateway with the given simulated latency.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        card: &CardDetails,
        _amount: Money,
    ) -> Result<ChargeOutcome, GatewayError> {
        tokio::time::sleep(self.latency).await;

        if card.normalized_number().ends_with("0000") {
            return Ok(ChargeOutcome::Declined);
        }
        Ok(ChargeOutcome::Approved)
    }
}
