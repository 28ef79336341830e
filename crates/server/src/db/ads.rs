//! Database operations for catalog banners.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use counterline_core::{AdId, StoreId};

use super::RepositoryError;
use crate::models::Ad;

#[derive(Debug, sqlx::FromRow)]
struct AdRow {
    id: i32,
    store_id: i32,
    title: String,
    image_url: Option<String>,
    link_url: Option<String>,
    active: bool,
    views: i64,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

impl From<AdRow> for Ad {
    fn from(row: AdRow) -> Self {
        Self {
            id: AdId::new(row.id),
            store_id: StoreId::new(row.store_id),
            title: row.title,
            image_url: row.image_url,
            link_url: row.link_url,
            active: row.active,
            views: row.views,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        }
    }
}

pub struct AdRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Ads currently running: active and inside their date window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, store_id: StoreId) -> Result<Vec<Ad>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdRow>(
            r"
            SELECT id, store_id, title, image_url, link_url, active, views, starts_at, ends_at
            FROM ads
            WHERE store_id = $1 AND active
              AND (starts_at IS NULL OR starts_at <= NOW())
              AND (ends_at IS NULL OR ends_at > NOW())
            ORDER BY id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count one impression.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ad does not exist in the store.
    pub async fn record_view(&self, store_id: StoreId, id: AdId) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE ads SET views = views + 1 WHERE id = $1 AND store_id = $2 RETURNING views",
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Insert a demo banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_demo(
        conn: &mut PgConnection,
        store_id: StoreId,
        title: &str,
        image_url: Option<&str>,
        link_url: Option<&str>,
    ) -> Result<AdId, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO ads (store_id, title, image_url, link_url, is_demo)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id
            ",
        )
        .bind(store_id)
        .bind(title)
        .bind(image_url)
        .bind(link_url)
        .fetch_one(conn)
        .await?;
        Ok(AdId::new(id))
    }
}
