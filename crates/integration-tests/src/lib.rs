//! Integration tests for Counterline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p counterline-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `register_day` - Core rules chained the way the server runs them
//! - `order_intake` - Server-side order pricing and matching
//! - `error_mapping` - Rule errors to HTTP status and JSON body
//! - `router_smoke` - Requests through the full router without a database
//!
//! Router tests use a lazily connected pool pointed at a closed port, so
//! anything that reaches the database fails fast with a 500/503 instead of
//! hanging.

use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use url::Url;

use counterline_core::StoreId;
use counterline_server::config::{ImageConfig, ImageStoreConfig, OrderConfig, PosConfig};
use counterline_server::state::AppState;

/// Connection string nothing listens on.
pub const UNREACHABLE_DATABASE_URL: &str = "postgres://counterline@127.0.0.1:1/counterline";

/// Configuration for router tests.
///
/// # Panics
///
/// Panics if the hard-coded URLs fail to parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> PosConfig {
    let base = Url::parse("http://127.0.0.1:1/images/").unwrap();
    PosConfig {
        database_url: SecretString::from(UNREACHABLE_DATABASE_URL),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        default_store_id: StoreId::new(1),
        image_store: ImageStoreConfig {
            base_url: base.clone(),
            public_url: base,
            token: None,
        },
        images: ImageConfig::default(),
        orders: OrderConfig::default(),
        catalog_cache_ttl: Duration::from_secs(30),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}

/// Full application over a pool that never connects.
///
/// Must be called inside a Tokio runtime.
///
/// # Panics
///
/// Panics if the state cannot be built.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_app() -> Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy(UNREACHABLE_DATABASE_URL)
        .unwrap();
    let state = AppState::new(config, pool).unwrap();
    counterline_server::app(state)
}
