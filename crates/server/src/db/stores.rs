//! Store profile, settings and PIN hash.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use counterline_core::{CurrencyCode, StoreEnvironment, StoreId};

use super::RepositoryError;
use crate::models::{StoreProfile, StoreProfileUpdate};

#[derive(Debug, sqlx::FromRow)]
struct StoreProfileRow {
    id: i32,
    name: String,
    legal_name: Option<String>,
    tax_id: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    currency_code: CurrencyCode,
    environment: StoreEnvironment,
    has_pin: bool,
    ticket_width: i32,
    ticket_footer: Option<String>,
    low_stock_threshold: Decimal,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreProfileRow> for StoreProfile {
    type Error = RepositoryError;

    fn try_from(row: StoreProfileRow) -> Result<Self, Self::Error> {
        let ticket_width = usize::try_from(row.ticket_width).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative ticket width for store {}", row.id))
        })?;
        Ok(Self {
            id: StoreId::new(row.id),
            name: row.name,
            legal_name: row.legal_name,
            tax_id: row.tax_id,
            address: row.address,
            phone: row.phone,
            email: row.email,
            currency_code: row.currency_code,
            environment: row.environment,
            has_pin: row.has_pin,
            ticket_width,
            ticket_footer: row.ticket_footer,
            low_stock_threshold: row.low_stock_threshold,
            updated_at: row.updated_at,
        })
    }
}

const PROFILE_SELECT: &str = r"
    SELECT s.id, s.name, s.legal_name, s.tax_id, s.address, s.phone, s.email,
           s.currency_code, st.environment, (st.pin_hash IS NOT NULL) AS has_pin,
           st.ticket_width, st.ticket_footer, st.low_stock_threshold,
           GREATEST(s.updated_at, st.updated_at) AS updated_at
    FROM stores s
    JOIN store_settings st ON st.store_id = s.id
";

/// Repository for store profile and settings.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store's profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn get(&self, id: StoreId) -> Result<StoreProfile, RepositoryError> {
        let row = sqlx::query_as::<_, StoreProfileRow>(&format!("{PROFILE_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    /// Update profile and settings together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(
        &self,
        id: StoreId,
        input: &StoreProfileUpdate,
    ) -> Result<StoreProfile, RepositoryError> {
        let width = i32::try_from(input.ticket_width)
            .map_err(|_| RepositoryError::Conflict("ticket width out of range".to_string()))?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE stores
            SET name = $2, legal_name = $3, tax_id = $4, address = $5, phone = $6,
                email = $7, currency_code = $8, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.legal_name)
        .bind(&input.tax_id)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(input.email.as_ref())
        .bind(input.currency_code)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE store_settings
            SET ticket_width = $2, ticket_footer = $3, low_stock_threshold = $4, updated_at = NOW()
            WHERE store_id = $1
            ",
        )
        .bind(id)
        .bind(width)
        .bind(&input.ticket_footer)
        .bind(input.low_stock_threshold)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }

    /// Stored argon2 hash of the store PIN, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn pin_hash(&self, id: StoreId) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT pin_hash FROM store_settings WHERE store_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace the PIN hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn set_pin_hash(&self, id: StoreId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_settings SET pin_hash = $2, updated_at = NOW() WHERE store_id = $1",
        )
        .bind(id)
        .bind(hash)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the store environment inside a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn set_environment(
        conn: &mut PgConnection,
        id: StoreId,
        environment: StoreEnvironment,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE store_settings SET environment = $2, updated_at = NOW() WHERE store_id = $1",
        )
        .bind(id)
        .bind(environment)
        .execute(conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a store's sales, payments, cash sessions and orders.
    ///
    /// Returns the number of sales removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a delete fails.
    pub async fn purge_transactions(
        conn: &mut PgConnection,
        id: StoreId,
    ) -> Result<u64, RepositoryError> {
        sqlx::query("DELETE FROM orders WHERE store_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        // Items and payments cascade
        let sales = sqlx::query("DELETE FROM sales WHERE store_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM cash_sessions WHERE store_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(sales)
    }

    /// Object keys of images belonging to demo products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn demo_image_keys(
        conn: &mut PgConnection,
        id: StoreId,
    ) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT i.object_key, i.thumbnail_key
            FROM product_images i
            JOIN products p ON p.id = i.product_id
            WHERE p.store_id = $1 AND p.is_demo
            ",
        )
        .bind(id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().flat_map(|(a, b)| [a, b]).collect())
    }

    /// Delete every demo-flagged record of a store.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a demo record is still
    /// referenced by real data.
    pub async fn purge_demo(conn: &mut PgConnection, id: StoreId) -> Result<u64, RepositoryError> {
        // Products first; they reference the taxonomy tables
        let mut removed = 0;
        for table in ["products", "customers", "ads", "units", "families", "warehouses"] {
            removed += sqlx::query(&format!(
                "DELETE FROM {table} WHERE store_id = $1 AND is_demo"
            ))
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepositoryError::from_write(e, "demo record"))?
            .rows_affected();
        }
        Ok(removed)
    }
}
