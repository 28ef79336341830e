//! Database operations for the point-of-sale `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `stores`, `store_settings` - Store profile, PIN hash, environment
//! - `units`, `families`, `warehouses` - Product taxonomy
//! - `products`, `product_images` - Catalog and image sets
//! - `customers` - Registered customers (credit sales)
//! - `orders`, `order_items` - Pending orders from the catalog or the register
//! - `cash_sessions` - Till sessions and their running ledger
//! - `sales`, `sale_items`, `sale_payments` - Finalized sales
//! - `currency_rates` - Exchange-rate history
//! - `ads` - Catalog banners
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p counterline-cli -- migrate
//! ```
//!
//! Repositories holding a pool serve single-statement reads and writes.
//! Operations that must be atomic across tables take a `&mut PgConnection`
//! borrowed from a transaction owned by the calling service.

pub mod ads;
pub mod cash_sessions;
pub mod currency_rates;
pub mod customers;
pub mod images;
pub mod orders;
pub mod products;
pub mod sales;
pub mod stores;
pub mod taxonomy;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use ads::AdRepository;
pub use cash_sessions::CashSessionRepository;
pub use currency_rates::CurrencyRateRepository;
pub use customers::CustomerRepository;
pub use images::ImageRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use sales::SaleRepository;
pub use stores::StoreRepository;
pub use taxonomy::TaxonomyRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_write(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(format!("{what} references a missing or in-use record"));
            }
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
