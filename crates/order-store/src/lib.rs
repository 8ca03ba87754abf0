//! Order store: durable orders, line items, and payment records.
//!
//! This crate owns the order-id allocator, the order status state machine,
//! and the persistence operations the checkout saga drives. Two
//! implementations sit behind the [`OrderStore`] trait: an in-memory store
//! for tests and local runs, and a PostgreSQL store for production.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod status;
pub mod store;

pub use catalog::{InMemoryMealCatalog, Meal, MealCatalog, PostgresMealCatalog};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use model::{NewOrder, Order, OrderItem, PaymentMethod, PaymentRecord, PaymentStatus};
pub use postgres::PostgresOrderStore;
pub use status::OrderStatus;
pub use store::OrderStore;
