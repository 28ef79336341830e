//! Database operations for units, families and warehouses.
//!
//! The three tables share one shape, so a single repository serves all of
//! them; table names come from [`TaxonomyKind::table`] and are never user input.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use counterline_core::StoreId;

use super::RepositoryError;
use crate::models::{TaxonomyEntry, TaxonomyInput, TaxonomyKind};

#[derive(Debug, sqlx::FromRow)]
struct TaxonomyRow {
    id: i32,
    store_id: i32,
    name: String,
    description: Option<String>,
    is_demo: bool,
    created_at: DateTime<Utc>,
}

impl TaxonomyRow {
    fn into_entry(self, kind: TaxonomyKind) -> TaxonomyEntry {
        TaxonomyEntry {
            id: self.id,
            kind,
            store_id: StoreId::new(self.store_id),
            name: self.name,
            description: self.description,
            is_demo: self.is_demo,
            created_at: self.created_at,
        }
    }
}

const COLUMNS: &str = "id, store_id, name, description, is_demo, created_at";

/// Repository for the flat product taxonomies.
pub struct TaxonomyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxonomyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all entries of one kind, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        kind: TaxonomyKind,
        store_id: StoreId,
    ) -> Result<Vec<TaxonomyEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxonomyRow>(&format!(
            "SELECT {COLUMNS} FROM {} WHERE store_id = $1 ORDER BY name",
            kind.table()
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.into_entry(kind)).collect())
    }

    /// Create an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is already taken.
    pub async fn create(
        &self,
        kind: TaxonomyKind,
        store_id: StoreId,
        input: &TaxonomyInput,
    ) -> Result<TaxonomyEntry, RepositoryError> {
        Self::insert(&mut *self.pool.acquire().await?, kind, store_id, input, false).await
    }

    /// Insert an entry on a caller-owned connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is already taken.
    pub async fn insert(
        conn: &mut PgConnection,
        kind: TaxonomyKind,
        store_id: StoreId,
        input: &TaxonomyInput,
        is_demo: bool,
    ) -> Result<TaxonomyEntry, RepositoryError> {
        let row = sqlx::query_as::<_, TaxonomyRow>(&format!(
            r"
            INSERT INTO {} (store_id, name, description, is_demo)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            ",
            kind.table()
        ))
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(is_demo)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, kind.label()))?;
        Ok(row.into_entry(kind))
    }

    /// Rename or re-describe an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn update(
        &self,
        kind: TaxonomyKind,
        store_id: StoreId,
        id: i32,
        input: &TaxonomyInput,
    ) -> Result<TaxonomyEntry, RepositoryError> {
        let row = sqlx::query_as::<_, TaxonomyRow>(&format!(
            r"
            UPDATE {} SET name = $3, description = $4
            WHERE id = $1 AND store_id = $2
            RETURNING {COLUMNS}
            ",
            kind.table()
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, kind.label()))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into_entry(kind))
    }

    /// Delete an entry. Products referencing it are left unassigned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn delete(
        &self,
        kind: TaxonomyKind,
        store_id: StoreId,
        id: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND store_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(store_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
