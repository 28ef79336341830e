//! In-memory cache of the public catalog.
//!
//! The catalog endpoint is polled by every customer device, so the listed
//! products of each store are kept in a `moka` cache. Any write touching
//! products, stock or images invalidates the store's entry.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use counterline_core::StoreId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::CatalogProduct;

/// Cached catalog listings keyed by store.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<StoreId, Arc<Vec<CatalogProduct>>>,
}

impl CatalogCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(64)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Listed products for a store, loading them on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the catalog has to be loaded and the query fails.
    pub async fn products(
        &self,
        pool: &PgPool,
        store_id: StoreId,
    ) -> Result<Arc<Vec<CatalogProduct>>, RepositoryError> {
        if let Some(products) = self.cache.get(&store_id).await {
            return Ok(products);
        }

        let products = Arc::new(ProductRepository::new(pool).list_catalog(store_id).await?);
        self.cache.insert(store_id, Arc::clone(&products)).await;
        tracing::debug!(store_id = %store_id, count = products.len(), "Catalog cache refreshed");
        Ok(products)
    }

    /// Drop a store's cached catalog.
    pub async fn invalidate(&self, store_id: StoreId) {
        self.cache.invalidate(&store_id).await;
    }

    /// Whether a store's catalog is currently cached.
    #[cfg(test)]
    pub async fn contains(&self, store_id: StoreId) -> bool {
        self.cache.get(&store_id).await.is_some()
    }

    /// Seed an entry directly.
    #[cfg(test)]
    pub async fn insert(&self, store_id: StoreId, products: Vec<CatalogProduct>) {
        self.cache.insert(store_id, Arc::new(products)).await;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use counterline_core::{ProductId, ProductStatus};

    use super::*;

    fn product(id: i32) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            family_id: None,
            price: Decimal::new(250, 2),
            status: ProductStatus::Active,
            in_stock: true,
            image_url: None,
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn test_invalidate_is_per_store() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache.insert(StoreId::new(1), vec![product(1)]).await;
        cache.insert(StoreId::new(2), vec![product(2)]).await;

        cache.invalidate(StoreId::new(1)).await;

        assert!(!cache.contains(StoreId::new(1)).await);
        assert!(cache.contains(StoreId::new(2)).await);
    }
}
