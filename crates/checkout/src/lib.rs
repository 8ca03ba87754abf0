//! Checkout saga for placing an order with an attached payment attempt.
//!
//! The saga drives the order record and the payment record to a single
//! consistent final status without a transaction spanning both:
//! 1. Allocate an order id
//! 2. Persist the order as `pending`
//! 3. Persist the line items
//! 4. Run the payment attempt
//! 5. Finalize the status (`confirmed` cash / `paid` card), or cancel
//!
//! On failure after the order row exists, the single compensating action
//! is marking the order `cancelled`; when even that write fails, the true
//! state is unknown and a reconciliation anomaly is surfaced for manual
//! inspection instead of a plain success or failure.

pub mod coordinator;
pub mod error;
pub mod steps;

pub use coordinator::{CheckoutCoordinator, CheckoutReceipt, PlaceOrder};
pub use error::CheckoutError;
