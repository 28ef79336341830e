//! Database operations for exchange-rate history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use counterline_core::{CurrencyCode, CurrencyRateId, StoreId};

use super::RepositoryError;
use crate::models::{CurrencyRate, NewCurrencyRate};

#[derive(Debug, sqlx::FromRow)]
struct CurrencyRateRow {
    id: i32,
    store_id: i32,
    currency_code: CurrencyCode,
    rate: Decimal,
    effective_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<CurrencyRateRow> for CurrencyRate {
    fn from(row: CurrencyRateRow) -> Self {
        Self {
            id: CurrencyRateId::new(row.id),
            store_id: StoreId::new(row.store_id),
            currency_code: row.currency_code,
            rate: row.rate,
            effective_at: row.effective_at,
            created_at: row.created_at,
        }
    }
}

const COLUMNS: &str = "id, store_id, currency_code, rate, effective_at, created_at";

pub struct CurrencyRateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CurrencyRateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Rate history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<CurrencyRate>, RepositoryError> {
        let rows = sqlx::query_as::<_, CurrencyRateRow>(&format!(
            r"
            SELECT {COLUMNS} FROM currency_rates
            WHERE store_id = $1
            ORDER BY effective_at DESC, id DESC
            LIMIT 200
            "
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Record a rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &NewCurrencyRate,
    ) -> Result<CurrencyRate, RepositoryError> {
        let row = sqlx::query_as::<_, CurrencyRateRow>(&format!(
            r"
            INSERT INTO currency_rates (store_id, currency_code, rate, effective_at)
            VALUES ($1, $2, $3, COALESCE($4, NOW()))
            RETURNING {COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.currency_code)
        .bind(input.rate)
        .bind(input.effective_at)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Latest effective rate for one currency.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no rate was ever recorded.
    pub async fn latest(
        &self,
        store_id: StoreId,
        currency: CurrencyCode,
    ) -> Result<CurrencyRate, RepositoryError> {
        let row = sqlx::query_as::<_, CurrencyRateRow>(&format!(
            r"
            SELECT {COLUMNS} FROM currency_rates
            WHERE store_id = $1 AND currency_code = $2 AND effective_at <= NOW()
            ORDER BY effective_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(store_id)
        .bind(currency)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }
}
