//! Payment validation and processing.
//!
//! A payment attempt is either cash on delivery (always accepted, settled
//! later) or a card charge. Card details pass a pure validator before the
//! charge goes to a pluggable [`PaymentGateway`]; the bundled
//! [`SimulatedGateway`] stands in for a real integration and declines any
//! card number ending in `0000`.

pub mod gateway;
pub mod processor;
pub mod validator;

pub use gateway::{ChargeOutcome, GatewayError, PaymentGateway, SimulatedGateway};
pub use processor::{PaymentFailure, PaymentOutcome, PaymentProcessor};
pub use validator::{CardDetails, InvalidCardDetails, PaymentRequest, validate, validate_card};
