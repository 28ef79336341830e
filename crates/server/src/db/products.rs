//! Database operations for products and stock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, QueryBuilder};

use counterline_core::{FamilyId, ProductId, ProductStatus, StoreId, UnitId, WarehouseId};

use super::RepositoryError;
use crate::models::{CatalogProduct, Product, ProductFilter, ProductInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    store_id: i32,
    sku: String,
    barcode: Option<String>,
    name: String,
    description: Option<String>,
    family_id: Option<i32>,
    unit_id: Option<i32>,
    warehouse_id: Option<i32>,
    price: Decimal,
    wholesale_price: Option<Decimal>,
    cost: Option<Decimal>,
    stock: Decimal,
    track_stock: bool,
    status: ProductStatus,
    primary_image_index: i32,
    is_demo: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            store_id: StoreId::new(row.store_id),
            sku: row.sku,
            barcode: row.barcode,
            name: row.name,
            description: row.description,
            family_id: row.family_id.map(FamilyId::new),
            unit_id: row.unit_id.map(UnitId::new),
            warehouse_id: row.warehouse_id.map(WarehouseId::new),
            price: row.price,
            wholesale_price: row.wholesale_price,
            cost: row.cost,
            stock: row.stock,
            track_stock: row.track_stock,
            status: row.status,
            // CHECK constraint keeps this non-negative
            primary_image_index: usize::try_from(row.primary_image_index).unwrap_or_default(),
            is_demo: row.is_demo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogRow {
    id: i32,
    name: String,
    description: Option<String>,
    family_id: Option<i32>,
    price: Decimal,
    status: ProductStatus,
    in_stock: bool,
    image_url: Option<String>,
    thumbnail_url: Option<String>,
}

impl From<CatalogRow> for CatalogProduct {
    fn from(row: CatalogRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            family_id: row.family_id.map(FamilyId::new),
            price: row.price,
            status: row.status,
            in_stock: row.in_stock,
            image_url: row.image_url,
            thumbnail_url: row.thumbnail_url,
        }
    }
}

const PRODUCT_COLUMNS: &str = r"
    id, store_id, sku, barcode, name, description, family_id, unit_id, warehouse_id,
    price, wholesale_price, cost, stock, track_stock, status, primary_image_index,
    is_demo, created_at, updated_at
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID, scoped to a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such product exists in the store.
    pub async fn get(&self, store_id: StoreId, id: ProductId) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// List products for the back office.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut query = QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE store_id = "
        ));
        query.push_bind(store_id);

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(family_id) = filter.family_id {
            query.push(" AND family_id = ").push_bind(family_id);
        }
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{q}%");
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR barcode ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if filter.low_stock {
            query.push(
                " AND track_stock AND stock <= (SELECT low_stock_threshold FROM store_settings WHERE store_id = p.store_id)",
            );
        }
        query.push(" ORDER BY name ASC, id ASC");

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Listed products (active or on promotion) for the public catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_catalog(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<CatalogProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, CatalogRow>(
            r"
            SELECT p.id, p.name, p.description, p.family_id, p.price, p.status,
                   (NOT p.track_stock OR p.stock > 0) AS in_stock,
                   i.url AS image_url, i.thumbnail_url
            FROM products p
            LEFT JOIN product_images i
                ON i.product_id = p.id AND i.position = p.primary_image_index
            WHERE p.store_id = $1 AND p.status IN ('active', 'promotion')
            ORDER BY (p.status = 'promotion') DESC, p.name ASC
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken or a taxonomy
    /// reference is invalid.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        Self::insert(&mut *self.pool.acquire().await?, store_id, input, false).await
    }

    /// Insert a product inside a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is taken.
    pub async fn insert(
        conn: &mut PgConnection,
        store_id: StoreId,
        input: &ProductInput,
        is_demo: bool,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (
                store_id, sku, barcode, name, description, family_id, unit_id, warehouse_id,
                price, wholesale_price, cost, stock, track_stock, status, is_demo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(input.sku.trim())
        .bind(&input.barcode)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.family_id)
        .bind(input.unit_id)
        .bind(input.warehouse_id)
        .bind(input.price)
        .bind(input.wholesale_price)
        .bind(input.cost)
        .bind(input.stock)
        .bind(input.track_stock)
        .bind(input.status)
        .bind(is_demo)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product"))?;
        Ok(row.into())
    }

    /// Update a product's catalog fields. Stock is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET sku = $3, barcode = $4, name = $5, description = $6, family_id = $7,
                unit_id = $8, warehouse_id = $9, price = $10, wholesale_price = $11,
                cost = $12, track_stock = $13, status = $14, updated_at = NOW()
            WHERE id = $1 AND store_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.sku.trim())
        .bind(&input.barcode)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.family_id)
        .bind(input.unit_id)
        .bind(input.warehouse_id)
        .bind(input.price)
        .bind(input.wholesale_price)
        .bind(input.cost)
        .bind(input.track_stock)
        .bind(input.status)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product"))?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Delete a product. Sale and order lines keep their snapshot name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, store_id: StoreId, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND store_id = $2")
            .bind(id)
            .bind(store_id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product"))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a relative stock change; stock may not go below zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` if the change would make stock negative.
    pub async fn adjust_stock(
        &self,
        store_id: StoreId,
        id: ProductId,
        delta: Decimal,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock(&mut *tx, store_id, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound)?;
        if current.stock + delta < Decimal::ZERO {
            return Err(RepositoryError::Conflict(format!(
                "stock for {} would drop below zero (current {})",
                current.sku, current.stock
            )));
        }
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    // =========================================================================
    // Transactional helpers
    // =========================================================================

    /// Lock the given products (`FOR UPDATE`) for the rest of the transaction.
    ///
    /// Products missing from the store are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(
        conn: &mut PgConnection,
        store_id: StoreId,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE store_id = $1 AND id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "
        ))
        .bind(store_id)
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Subtract sold quantities from stock-tracked products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE products SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND track_stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Store the primary image index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_primary_image(
        conn: &mut PgConnection,
        id: ProductId,
        index: usize,
    ) -> Result<(), RepositoryError> {
        let index = i32::try_from(index)
            .map_err(|_| RepositoryError::Conflict("primary index out of range".to_string()))?;
        sqlx::query("UPDATE products SET primary_image_index = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(index)
            .execute(conn)
            .await?;
        Ok(())
    }
}
