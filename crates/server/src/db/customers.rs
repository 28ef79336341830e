//! Database operations for customers.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use counterline_core::{CustomerId, Email, PhoneNumber, StoreId};

use super::RepositoryError;
use crate::models::{Customer, CustomerFilter, CustomerInput};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    store_id: i32,
    name: String,
    document_id: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    is_demo: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let phone = row
            .phone
            .as_deref()
            .map(PhoneNumber::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid phone in database: {e}")))?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            id: CustomerId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            document_id: row.document_id,
            phone,
            email,
            address: row.address,
            notes: row.notes,
            is_demo: row.is_demo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CUSTOMER_COLUMNS: &str = r"
    id, store_id, name, document_id, phone, email, address, notes, is_demo,
    created_at, updated_at
";

/// Repository for customer records.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist in the store.
    pub async fn get(&self, store_id: StoreId, id: CustomerId) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    /// List customers, optionally filtered by a search term.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &CustomerFilter,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let pattern = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{q}%"));
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS} FROM customers
            WHERE store_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2 OR document_id ILIKE $2)
            ORDER BY name ASC, id ASC
            "
        ))
        .bind(store_id)
        .bind(pattern)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        Self::insert(&mut *self.pool.acquire().await?, store_id, input, false).await
    }

    /// Insert a customer on a caller-owned connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        conn: &mut PgConnection,
        store_id: StoreId,
        input: &CustomerInput,
        is_demo: bool,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO customers (store_id, name, document_id, phone, email, address, notes, is_demo)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.document_id)
        .bind(input.phone.as_ref())
        .bind(input.email.as_ref())
        .bind(&input.address)
        .bind(&input.notes)
        .bind(is_demo)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "customer"))?;
        row.try_into()
    }

    /// Replace a customer's details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE customers
            SET name = $3, document_id = $4, phone = $5, email = $6, address = $7,
                notes = $8, updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.document_id)
        .bind(input.phone.as_ref())
        .bind(input.email.as_ref())
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }

    /// Delete a customer. Past sales keep their totals but lose the link.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn delete(&self, store_id: StoreId, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND store_id = $2")
            .bind(id)
            .bind(store_id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "customer"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
