//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::PosConfig;
use crate::services::catalog_cache::CatalogCache;
use crate::services::image_store::{ImageStoreClient, ImageStoreError};
use crate::services::pin::PinAttempts;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PosConfig,
    pool: PgPool,
    image_store: ImageStoreClient,
    catalog: CatalogCache,
    pin_attempts: PinAttempts,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the object store client cannot be built.
    pub fn new(config: PosConfig, pool: PgPool) -> Result<Self, ImageStoreError> {
        let image_store = ImageStoreClient::new(&config.image_store)?;
        let catalog = CatalogCache::new(config.catalog_cache_ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                image_store,
                catalog,
                pin_attempts: PinAttempts::default(),
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &PosConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the object store client.
    #[must_use]
    pub fn image_store(&self) -> &ImageStoreClient {
        &self.inner.image_store
    }

    /// Get a reference to the public catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// Get a reference to the per-store PIN attempt counter.
    #[must_use]
    pub fn pin_attempts(&self) -> &PinAttempts {
        &self.inner.pin_attempts
    }
}
