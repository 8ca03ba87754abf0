//! Shared types for the checkout service.

mod money;
mod types;

pub use money::Money;
pub use types::{MealId, OrderId, UserId};
