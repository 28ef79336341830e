//! Database operations for pending orders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use counterline_core::matching::OrderCandidate;
use counterline_core::{CustomerId, OrderId, OrderStatus, ProductId, SaleId, StoreId};

use super::RepositoryError;
use crate::models::{Order, OrderFilter, OrderItem, OrderSource};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    store_id: i32,
    status: OrderStatus,
    source: OrderSource,
    customer_id: Option<i32>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    note: Option<String>,
    total: Decimal,
    sale_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            store_id: StoreId::new(self.store_id),
            status: self.status,
            source: self.source,
            customer_id: self.customer_id.map(CustomerId::new),
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            note: self.note,
            total: self.total,
            sale_id: self.sale_id.map(SaleId::new),
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

const ORDER_COLUMNS: &str = r"
    id, store_id, status, source, customer_id, customer_name, customer_phone,
    note, total, sale_id, created_at, updated_at
";

/// A validated order ready to be written: header fields plus priced lines.
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub source: OrderSource,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub note: Option<String>,
    pub total: Decimal,
    pub items: Vec<OrderItem>,
}

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist in the store.
    pub async fn get(&self, store_id: StoreId, id: OrderId) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut conn = self.pool.acquire().await?;
        let mut items = load_items(&mut conn, &[row.id]).await?;
        let lines = items.remove(&row.id).unwrap_or_default();
        Ok(row.into_order(lines))
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 500);
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE store_id = $1 AND ($2::order_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "
        ))
        .bind(store_id)
        .bind(filter.status)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut conn = self.pool.acquire().await?;
        let mut items = load_items(&mut conn, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }

    /// Write a new pending order and its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a referenced customer or product vanished.
    pub async fn insert(
        conn: &mut PgConnection,
        store_id: StoreId,
        order: &PricedOrder,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (store_id, source, customer_id, customer_name, customer_phone, note, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(order.source)
        .bind(order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.note)
        .bind(order.total)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "order"))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepositoryError::from_write(e, "order item"))?;
        }

        Ok(row.into_order(order.items.clone()))
    }

    /// Lock an order row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist in the store.
    pub async fn lock(
        conn: &mut PgConnection,
        store_id: StoreId,
        id: OrderId,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND store_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut items = load_items(conn, &[row.id]).await?;
        let lines = items.remove(&row.id).unwrap_or_default();
        Ok(row.into_order(lines))
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(conn)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark an order processed by a sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn mark_processed(
        conn: &mut PgConnection,
        id: OrderId,
        sale_id: SaleId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders SET status = 'processed', sale_id = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(sale_id)
        .execute(conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Open orders created since `since`, with their distinct products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn candidates(
        conn: &mut PgConnection,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<OrderCandidate>, RepositoryError> {
        let rows: Vec<(i32, DateTime<Utc>, Vec<i32>)> = sqlx::query_as(
            r"
            SELECT o.id, o.created_at,
                   COALESCE(array_agg(DISTINCT i.product_id) FILTER (WHERE i.product_id IS NOT NULL), '{}')
            FROM orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            WHERE o.store_id = $1
              AND o.status IN ('pending', 'processing')
              AND o.created_at >= $2
            GROUP BY o.id, o.created_at
            ",
        )
        .bind(store_id)
        .bind(since)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, created_at, products)| OrderCandidate {
                id: OrderId::new(id),
                created_at,
                product_ids: products.into_iter().map(ProductId::new).collect(),
            })
            .collect())
    }

    /// Expire pending orders created before `cutoff`, across all stores.
    ///
    /// Returns how many orders were expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders SET status = 'expired', updated_at = NOW()
            WHERE status = 'pending' AND created_at < $1
            ",
        )
        .bind(cutoff)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[i32],
) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT order_id, product_id, product_name, quantity, unit_price, line_total
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, id
        ",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.into());
    }
    Ok(grouped)
}
