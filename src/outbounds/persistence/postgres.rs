//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// PostgreSQL implementation of the order store, using sqlx with the schema in `migrations/`.
//
// | Name                     | Description                                  | Key Methods       |
// |--------------------------|----------------------------------------------|-------------------|
// | PostgresOrderRepository  | Orders and items in two tables, one          | connect, migrate  |
// |                          | transaction per write                        | create, update    |
// | OrderRow, OrderItemRow   | Raw rows, mapped to domain types             | into_order        |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    models::{Order, OrderItem, OrderStatus},
    ports::{OrderRepository, RepositoryError},
};

const ORDER_COLUMNS: &str =
    "id, customer_name, customer_email, status, total_amount, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_name, quantity, unit_price, total_price";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    customer_email: String,
    status: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, RepositoryError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            RepositoryError::Decode(format!("item {} has quantity {}", self.id, self.quantity))
        })?;

        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_name: self.product_name,
            quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|err| RepositoryError::Decode(format!("order {}: {}", self.id, err)))?;

        Ok(Order {
            id: self.id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            status,
            total_amount: self.total_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items
                .into_iter()
                .map(OrderItemRow::into_item)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::Decode(err.to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

/// Order store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection URL
    /// * `max_connections` - Upper bound on pooled connections
    ///
    /// # Errors
    /// Returns `RepositoryError::Database` if no connection can be established
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to order store");
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    /// Returns `RepositoryError::Database` if a migration fails
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| RepositoryError::Database(err.to_string()))?;

        info!("Order store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItemRow>>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, line_no"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row);
        }
        Ok(by_order)
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO NOTHING"
        ))
        .bind(order.id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::AlreadyExists(order.id));
        }

        for (line_no, item) in order.items.iter().enumerate() {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::Database(format!("quantity {} out of range", item.quantity))
            })?;
            let line_no = i32::try_from(line_no)
                .map_err(|_| RepositoryError::Database("too many order items".to_string()))?;

            sqlx::query(&format!(
                "INSERT INTO order_items ({ITEM_COLUMNS}, line_no) VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ))
            .bind(item.id)
            .bind(order.id)
            .bind(&item.product_name)
            .bind(quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(line_no)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Inserted order {} with {} items", order.id, order.items.len());

        Ok(order)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.load_items(&[id]).await?.remove(&id).unwrap_or_default();
        row.into_order(items).map(Some)
    }

    async fn get_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = self.load_items(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn update(&self, mut order: Order) -> Result<Option<Order>, RepositoryError> {
        let updated_at = Utc::now();

        let updated = sqlx::query(
            "UPDATE orders SET customer_name = $2, customer_email = $3, status = $4, \
             total_amount = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(order.id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }

        order.updated_at = Some(updated_at);
        Ok(Some(order))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}
