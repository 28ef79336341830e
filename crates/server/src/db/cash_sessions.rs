//! Database operations for cash sessions (tills).
//!
//! The ledger is stored denormalised on the session row: per-method totals as
//! JSONB and the recorded sale ids as an integer array. Services lock the row,
//! apply [`SessionLedger`] rules in memory and write the ledger back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use counterline_core::cash::{PaymentTotals, SessionLedger};
use counterline_core::{CashSessionId, CashSessionStatus, SaleId, StoreId};

use super::RepositoryError;
use crate::models::CashSession;

#[derive(Debug, sqlx::FromRow)]
struct CashSessionRow {
    id: i32,
    store_id: i32,
    series: Option<String>,
    status: CashSessionStatus,
    opening_balance: Decimal,
    transactions: Json<PaymentTotals>,
    sale_ids: Vec<i32>,
    credit_total: Decimal,
    counted_cash: Option<Decimal>,
    calculated_cash: Option<Decimal>,
    difference: Option<Decimal>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl From<CashSessionRow> for CashSession {
    fn from(row: CashSessionRow) -> Self {
        Self {
            id: CashSessionId::new(row.id),
            store_id: StoreId::new(row.store_id),
            series: row.series,
            ledger: SessionLedger {
                opening_balance: row.opening_balance,
                transactions: row.transactions.0,
                sale_ids: row.sale_ids.into_iter().map(SaleId::new).collect(),
                credit_total: row.credit_total,
                status: row.status,
                counted_cash: row.counted_cash,
                calculated_cash: row.calculated_cash,
                difference: row.difference,
            },
            opened_at: row.opened_at,
            closed_at: row.closed_at,
        }
    }
}

const SESSION_COLUMNS: &str = r"
    id, store_id, series, status, opening_balance, transactions, sale_ids, credit_total,
    counted_cash, calculated_cash, difference, opened_at, closed_at
";

/// Repository for cash sessions.
pub struct CashSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CashSessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session does not exist in the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: CashSessionId,
    ) -> Result<CashSession, RepositoryError> {
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// The open session of a till, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current(
        &self,
        store_id: StoreId,
        series: Option<&str>,
    ) -> Result<Option<CashSession>, RepositoryError> {
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM cash_sessions
            WHERE store_id = $1 AND COALESCE(series, '') = COALESCE($2, '') AND status = 'open'
            "
        ))
        .bind(store_id)
        .bind(series)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Recent sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        limit: i64,
    ) -> Result<Vec<CashSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, CashSessionRow>(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM cash_sessions
            WHERE store_id = $1
            ORDER BY opened_at DESC, id DESC
            LIMIT $2
            "
        ))
        .bind(store_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a new open session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the till already has an open session.
    pub async fn insert(
        conn: &mut PgConnection,
        store_id: StoreId,
        series: Option<&str>,
        ledger: &SessionLedger,
    ) -> Result<CashSession, RepositoryError> {
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            r"
            INSERT INTO cash_sessions (store_id, series, status, opening_balance, transactions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(series)
        .bind(ledger.status)
        .bind(ledger.opening_balance)
        .bind(Json(&ledger.transactions))
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "open cash session"))?;
        Ok(row.into())
    }

    /// Lock the open session of a till.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_open(
        conn: &mut PgConnection,
        store_id: StoreId,
        series: Option<&str>,
    ) -> Result<Option<CashSession>, RepositoryError> {
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM cash_sessions
            WHERE store_id = $1 AND COALESCE(series, '') = COALESCE($2, '') AND status = 'open'
            FOR UPDATE
            "
        ))
        .bind(store_id)
        .bind(series)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Lock a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session does not exist in the store.
    pub async fn lock(
        conn: &mut PgConnection,
        store_id: StoreId,
        id: CashSessionId,
    ) -> Result<CashSession, RepositoryError> {
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = $1 AND store_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Write the ledger back to a locked session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session does not exist.
    pub async fn save_ledger(
        conn: &mut PgConnection,
        id: CashSessionId,
        ledger: &SessionLedger,
        closed_at: Option<DateTime<Utc>>,
    ) -> Result<CashSession, RepositoryError> {
        let sale_ids: Vec<i32> = ledger.sale_ids.iter().map(SaleId::as_i32).collect();
        let row = sqlx::query_as::<_, CashSessionRow>(&format!(
            r"
            UPDATE cash_sessions
            SET status = $2, transactions = $3, sale_ids = $4, credit_total = $5,
                counted_cash = $6, calculated_cash = $7, difference = $8, closed_at = $9
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(ledger.status)
        .bind(Json(&ledger.transactions))
        .bind(sale_ids)
        .bind(ledger.credit_total)
        .bind(ledger.counted_cash)
        .bind(ledger.calculated_cash)
        .bind(ledger.difference)
        .bind(closed_at)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }
}
