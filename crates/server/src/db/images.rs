//! Database operations for product images.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use counterline_core::{ProductId, ProductImageId};

use super::RepositoryError;
use crate::models::ProductImage;

#[derive(Debug, sqlx::FromRow)]
struct ProductImageRow {
    id: i32,
    product_id: i32,
    position: i32,
    object_key: String,
    thumbnail_key: String,
    url: String,
    thumbnail_url: String,
    content_type: String,
    byte_size: i32,
    created_at: DateTime<Utc>,
}

impl From<ProductImageRow> for ProductImage {
    fn from(row: ProductImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            position: usize::try_from(row.position).unwrap_or_default(),
            url: row.url,
            thumbnail_url: row.thumbnail_url,
            object_key: row.object_key,
            thumbnail_key: row.thumbnail_key,
            content_type: row.content_type,
            byte_size: usize::try_from(row.byte_size).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

const IMAGE_COLUMNS: &str = r"
    id, product_id, position, object_key, thumbnail_key, url, thumbnail_url,
    content_type, byte_size, created_at
";

/// An image that has been written to the object store but not yet recorded.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub object_key: String,
    pub thumbnail_key: String,
    pub url: String,
    pub thumbnail_url: String,
    pub content_type: String,
    pub byte_size: usize,
}

/// Repository for product image rows.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Images of a product in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        Self::list_in(&mut *self.pool.acquire().await?, product_id).await
    }

    /// Same as [`Self::list`], on a caller-owned connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in(
        conn: &mut PgConnection,
        product_id: ProductId,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id = $1 ORDER BY position"
        ))
        .bind(product_id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append images after the current last position.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn append(
        conn: &mut PgConnection,
        product_id: ProductId,
        start_position: usize,
        images: &[StoredImage],
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut inserted = Vec::with_capacity(images.len());
        for (offset, image) in images.iter().enumerate() {
            let position = to_i32(start_position + offset)?;
            let size = to_i32(image.byte_size)?;
            let row = sqlx::query_as::<_, ProductImageRow>(&format!(
                r"
                INSERT INTO product_images (
                    product_id, position, object_key, thumbnail_key, url, thumbnail_url,
                    content_type, byte_size
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {IMAGE_COLUMNS}
                "
            ))
            .bind(product_id)
            .bind(position)
            .bind(&image.object_key)
            .bind(&image.thumbnail_key)
            .bind(&image.url)
            .bind(&image.thumbnail_url)
            .bind(&image.content_type)
            .bind(size)
            .fetch_one(&mut *conn)
            .await?;
            inserted.push(row.into());
        }
        Ok(inserted)
    }

    /// Rewrite positions so `ordered[i]` sits at position `i`.
    ///
    /// Relies on the deferred unique constraint on `(product_id, position)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an update fails.
    pub async fn set_positions(
        conn: &mut PgConnection,
        product_id: ProductId,
        ordered: &[ProductImageId],
    ) -> Result<(), RepositoryError> {
        for (position, id) in ordered.iter().enumerate() {
            sqlx::query("UPDATE product_images SET position = $3 WHERE id = $1 AND product_id = $2")
                .bind(id)
                .bind(product_id)
                .bind(to_i32(position)?)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete one image row and return it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not belong to the product.
    pub async fn delete(
        conn: &mut PgConnection,
        product_id: ProductId,
        id: ProductImageId,
    ) -> Result<ProductImage, RepositoryError> {
        let row = sqlx::query_as::<_, ProductImageRow>(&format!(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Object keys of every image of a product (for cleanup after delete).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn object_keys(&self, product_id: ProductId) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT object_key, thumbnail_key FROM product_images WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().flat_map(|(a, b)| [a, b]).collect())
    }
}

fn to_i32(value: usize) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("{value} does not fit in INTEGER")))
}
