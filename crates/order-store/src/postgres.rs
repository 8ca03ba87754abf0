use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MealId, Money, OrderId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentRecord, PaymentStatus, Result,
    StoreError, store::OrderStore,
};

/// PostgreSQL-backed order store implementation.
///
/// Id allocation rides on a database sequence (`nextval` is a single
/// atomic statement), the orders table's primary key backs the uniqueness
/// invariant, and status updates read the current row under a row lock so
/// transition checks cannot race.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        Ok(Order {
            order_id: OrderId::new(row.try_get("order_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            total_price: Money::from_cents(row.try_get("total_cents")?),
            status: parse_status(row.try_get("status")?)?,
            shipping_address: row.try_get("shipping_address")?,
            idempotency_key: row.try_get("idempotency_key")?,
            items: Vec::new(),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT meal_id, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY item_id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderItem {
                    meal_id: MealId::new(row.try_get("meal_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                })
            })
            .collect()
    }

    async fn attach_items(&self, mut order: Order) -> Result<Order> {
        order.items = self.load_items(order.order_id).await?;
        Ok(order)
    }
}

/// Maps connection-level failures to `Unavailable`, everything else to
/// `Database`.
fn map_db_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(e.to_string())
        }
        sqlx::Error::Io(io) => StoreError::Unavailable(io.to_string()),
        other => StoreError::Database(other),
    }
}

fn parse_status(raw: String) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|e: crate::status::ParseOrderStatusError| {
            StoreError::Database(sqlx::Error::Decode(Box::new(e)))
        })
}

fn parse_method(raw: String) -> Result<PaymentMethod> {
    raw.parse()
        .map_err(|e: crate::model::ParsePaymentMethodError| {
            StoreError::Database(sqlx::Error::Decode(Box::new(e)))
        })
}

fn parse_payment_status(raw: String) -> Result<PaymentStatus> {
    raw.parse()
        .map_err(|e: crate::model::ParsePaymentStatusError| {
            StoreError::Database(sqlx::Error::Decode(Box::new(e)))
        })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self))]
    async fn allocate_order_id(&self) -> Result<OrderId> {
        // A sequence increment is one atomic statement. Never a
        // read-max-plus-one pair, which races under concurrent load.
        let id: i64 = sqlx::query_scalar("SELECT nextval('order_id_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(OrderId::new(id))
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create_order(&self, order: NewOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, total_cents, status, shipping_address, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(order.order_id.as_i64())
        .bind(order.user_id.as_i64())
        .bind(order.total_price.cents())
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.shipping_address)
        .bind(&order.idempotency_key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                // Two unique constraints can fire here; tell them apart
                // so an idempotency race is not reported as an allocator
                // failure.
                if db_err.constraint() == Some("orders_user_idempotency_key") {
                    return StoreError::IdempotencyKeyConflict {
                        user_id: order.user_id,
                        key: order.idempotency_key.clone().unwrap_or_default(),
                    };
                }
                return StoreError::DuplicateOrderId(order.order_id);
            }
            map_db_error(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, items), fields(%order_id, count = items.len()))]
    async fn add_items(&self, order_id: OrderId, items: &[OrderItem]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, meal_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(order_id.as_i64())
            .bind(item.meal_id.as_i64())
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::ItemInsertFailed {
                order_id,
                index,
                total: items.len(),
                reason: e.to_string(),
            })?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%order_id, %new_status))]
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row lock so a concurrent update cannot slip between the
        // transition check and the write.
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order_id.as_i64())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_db_error)?;

        let Some(current) = current else {
            return Ok(false);
        };
        let current = parse_status(current)?;

        if current == new_status {
            return Ok(true);
        }
        if !current.can_transition_to(new_status) {
            return Err(StoreError::InvalidStatusTransition {
                order_id,
                from: current,
                to: new_status,
            });
        }

        sqlx::query("UPDATE orders SET status = $1 WHERE order_id = $2")
            .bind(new_status.as_str())
            .bind(order_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(true)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, total_cents, status, shipping_address, idempotency_key, created_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => {
                let order = Self::row_to_order(&row)?;
                Ok(Some(self.attach_items(order).await?))
            }
            None => Ok(None),
        }
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, user_id, total_cents, status, shipping_address, idempotency_key, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY order_id DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order = Self::row_to_order(row)?;
            orders.push(self.attach_items(order).await?);
        }
        Ok(orders)
    }

    #[tracing::instrument(skip(self, record), fields(order_id = %record.order_id, payment_id = %record.payment_id))]
    async fn insert_payment(&self, record: PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, order_id, method, amount_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(&record.payment_id)
        .bind(record.order_id.as_i64())
        .bind(record.method.as_str())
        .bind(record.amount.cents())
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT payment_id, order_id, method, amount_cents, status, created_at
            FROM payments
            WHERE order_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => Ok(Some(PaymentRecord {
                payment_id: row.try_get("payment_id")?,
                order_id: OrderId::new(row.try_get("order_id")?),
                method: parse_method(row.try_get("method")?)?,
                amount: Money::from_cents(row.try_get("amount_cents")?),
                status: parse_payment_status(row.try_get("status")?)?,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, total_cents, status, shipping_address, idempotency_key, created_at
            FROM orders
            WHERE user_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(user_id.as_i64())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match row {
            Some(row) => {
                let order = Self::row_to_order(&row)?;
                Ok(Some(self.attach_items(order).await?))
            }
            None => Ok(None),
        }
    }
}
