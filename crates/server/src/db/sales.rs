//! Database operations for finalized sales.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use counterline_core::checkout::SaleSettlement;
use counterline_core::{
    CashSessionId, CustomerId, OrderId, PaymentMethod, ProductId, SaleId, StoreId,
};

use super::RepositoryError;
use crate::models::{Sale, SaleFilter, SaleItem, SalePayment};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: i32,
    store_id: i32,
    cash_session_id: i32,
    customer_id: Option<i32>,
    order_id: Option<i32>,
    subtotal: Decimal,
    total: Decimal,
    paid: Decimal,
    change_given: Decimal,
    balance_due: Decimal,
    is_credit: bool,
    credit_due_date: Option<NaiveDate>,
    credit_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>, payments: Vec<SalePayment>) -> Sale {
        Sale {
            id: SaleId::new(self.id),
            store_id: StoreId::new(self.store_id),
            cash_session_id: CashSessionId::new(self.cash_session_id),
            customer_id: self.customer_id.map(CustomerId::new),
            order_id: self.order_id.map(OrderId::new),
            subtotal: self.subtotal,
            total: self.total,
            paid: self.paid,
            change: self.change_given,
            balance_due: self.balance_due,
            is_credit: self.is_credit,
            credit_due_date: self.credit_due_date,
            credit_note: self.credit_note,
            items,
            payments,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    sale_id: i32,
    product_id: Option<i32>,
    product_name: String,
    quantity: Decimal,
    unit_price: Decimal,
    wholesale: bool,
    line_total: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct SalePaymentRow {
    sale_id: i32,
    method: PaymentMethod,
    amount: Decimal,
    reference: Option<String>,
}

const SALE_COLUMNS: &str = r"
    id, store_id, cash_session_id, customer_id, order_id, subtotal, total, paid,
    change_given, balance_due, is_credit, credit_due_date, credit_note, created_at
";

/// Everything needed to write a sale in one go.
#[derive(Debug)]
pub struct SaleRecord<'a> {
    pub settlement: &'a SaleSettlement,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub credit_due_date: Option<NaiveDate>,
    pub credit_note: Option<&'a str>,
    pub items: &'a [SaleItem],
    /// Tendered payments as entered (cash before change).
    pub payments: &'a [SalePayment],
}

/// Repository for sales, their lines and payments.
pub struct SaleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SaleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a sale with lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the sale does not exist in the store.
    pub async fn get(&self, store_id: StoreId, id: SaleId) -> Result<Sale, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut sales = self.attach(vec![row]).await?;
        sales.pop().ok_or(RepositoryError::NotFound)
    }

    /// List sales, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &SaleFilter,
    ) -> Result<Vec<Sale>, RepositoryError> {
        let limit = filter.limit.unwrap_or(100).clamp(1, 500);
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            SELECT {SALE_COLUMNS} FROM sales
            WHERE store_id = $1
              AND ($2::int IS NULL OR cash_session_id = $2)
              AND ($3::int IS NULL OR customer_id = $3)
              AND (NOT $4 OR balance_due > 0)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "
        ))
        .bind(store_id)
        .bind(filter.session_id)
        .bind(filter.customer_id)
        .bind(filter.credit_only)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        self.attach(rows).await
    }

    async fn attach(&self, rows: Vec<SaleRow>) -> Result<Vec<Sale>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

        let item_rows = sqlx::query_as::<_, SaleItemRow>(
            r"
            SELECT sale_id, product_id, product_name, quantity, unit_price, wholesale, line_total
            FROM sale_items WHERE sale_id = ANY($1) ORDER BY sale_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        let payment_rows = sqlx::query_as::<_, SalePaymentRow>(
            r"
            SELECT sale_id, method, amount, reference
            FROM sale_payments WHERE sale_id = ANY($1) ORDER BY sale_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<i32, Vec<SaleItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.sale_id).or_default().push(SaleItem {
                product_id: row.product_id.map(ProductId::new),
                product_name: row.product_name,
                quantity: row.quantity,
                unit_price: row.unit_price,
                wholesale: row.wholesale,
                line_total: row.line_total,
            });
        }
        let mut payments: HashMap<i32, Vec<SalePayment>> = HashMap::new();
        for row in payment_rows {
            payments.entry(row.sale_id).or_default().push(SalePayment {
                method: row.method,
                amount: row.amount,
                reference: row.reference,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                let paid = payments.remove(&row.id).unwrap_or_default();
                row.into_sale(lines, paid)
            })
            .collect())
    }

    /// Write a sale with its lines and payments.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn insert(
        conn: &mut PgConnection,
        store_id: StoreId,
        record: &SaleRecord<'_>,
    ) -> Result<Sale, RepositoryError> {
        let s = record.settlement;
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            INSERT INTO sales (
                store_id, cash_session_id, customer_id, order_id, subtotal, total, paid,
                change_given, balance_due, is_credit, credit_due_date, credit_note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(s.session_id)
        .bind(record.customer_id)
        .bind(record.order_id)
        .bind(s.subtotal)
        .bind(s.total)
        .bind(s.paid)
        .bind(s.change)
        .bind(s.balance_due)
        .bind(s.is_credit)
        .bind(record.credit_due_date)
        .bind(record.credit_note)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "sale"))?;

        for item in record.items {
            sqlx::query(
                r"
                INSERT INTO sale_items (sale_id, product_id, product_name, quantity, unit_price, wholesale, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.wholesale)
            .bind(item.line_total)
            .execute(&mut *conn)
            .await?;
        }

        for payment in record.payments.iter().filter(|p| p.amount > Decimal::ZERO) {
            sqlx::query(
                "INSERT INTO sale_payments (sale_id, method, amount, reference) VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(payment.method)
            .bind(payment.amount)
            .bind(&payment.reference)
            .execute(&mut *conn)
            .await?;
        }

        Ok(row.into_sale(record.items.to_vec(), record.payments.to_vec()))
    }
}
