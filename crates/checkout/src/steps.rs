//! Checkout saga step names, used in logs and anomaly reports.

/// The saga type identifier for order checkout.
pub const SAGA_TYPE: &str = "OrderCheckout";

/// Step name: allocate a fresh order id.
pub const STEP_ALLOCATE_ID: &str = "allocate_order_id";

/// Step name: persist the order row as pending.
pub const STEP_PERSIST_ORDER: &str = "persist_order";

/// Step name: persist the line items.
pub const STEP_PERSIST_ITEMS: &str = "persist_items";

/// Step name: run the payment attempt.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: write the final order status.
pub const STEP_FINALIZE_STATUS: &str = "finalize_status";
