//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database ping)
//!
//! # Catalog (public, rate limited)
//! GET  /api/catalog/products                - Listed products
//! GET  /api/ads                             - Active ads
//! POST /api/ads/{id}/views                  - Count an ad view
//! POST /api/orders                          - Submit a cart as a pending order
//!
//! # Products
//! GET  /api/products                        - Back-office list
//! POST /api/products                        - Create
//! GET  /api/products/{id}                   - Detail
//! PUT  /api/products/{id}                   - Update
//! DELETE /api/products/{id}                 - Delete (PIN, rate limited)
//! POST /api/products/{id}/stock             - Adjust stock
//! GET  /api/products/{id}/images            - Image set
//! POST /api/products/{id}/images            - Upload (multipart)
//! PUT  /api/products/{id}/images            - Reorder + primary
//! DELETE /api/products/{id}/images/{image}  - Remove (PIN, rate limited)
//!
//! # Orders
//! GET  /api/orders                          - Queue
//! POST /api/orders/quotes                   - Draft a register quote
//! GET  /api/orders/{id}                     - Detail
//! POST /api/orders/{id}/status              - Load / release / cancel
//!
//! # Cash sessions
//! GET  /api/cash-sessions                   - History
//! POST /api/cash-sessions                   - Open
//! GET  /api/cash-sessions/current           - Open session for ?series=
//! GET  /api/cash-sessions/{id}/report       - X/Z report
//! POST /api/cash-sessions/{id}/close        - Close, returns Z report
//!
//! # Sales
//! GET  /api/sales                           - History
//! POST /api/sales                           - Finalize
//! GET  /api/sales/{id}                      - Detail
//! GET  /api/sales/{id}/ticket               - Plain-text receipt
//!
//! # Customers
//! GET|POST /api/customers
//! GET|PUT|DELETE /api/customers/{id}        - DELETE needs the PIN (rate limited)
//!
//! # Taxonomy
//! GET|POST /api/{units,families,warehouses}
//! PUT|DELETE /api/{units,families,warehouses}/{id}  - DELETE needs the PIN (rate limited)
//!
//! # Settings
//! GET|PUT  /api/settings/store
//! GET|POST /api/settings/currency-rates
//! GET  /api/settings/currency-rates/latest
//! POST /api/settings/pin                    - Set / change
//! POST /api/settings/pin/verify             - Verify (rate limited)
//! POST /api/settings/demo-data              - Seed demo data (PIN, rate limited)
//! POST /api/settings/promote                - Promote to production (PIN, rate limited)
//! ```
//!
//! Every PIN-gated route shares one per-IP limiter. PIN checks are also
//! counted per store (`services::pin::PinAttempts`), which covers wholesale
//! lines on `POST /api/sales` as well.

pub mod cash_sessions;
pub mod catalog;
pub mod customers;
pub mod orders;
pub mod products;
pub mod sales;
pub mod settings;
pub mod taxonomy;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    handler::Handler,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::config::ImageConfig;
use crate::middleware::{RateLimiterLayer, pin_rate_limiter, public_rate_limiter};
use crate::models::TaxonomyKind;
use crate::state::AppState;

/// Multipart overhead allowed on top of the image bytes.
const UPLOAD_SLACK_BYTES: usize = 1024 * 1024;

/// Public catalog routes, rate limited per client IP.
fn catalog_routes() -> Router<AppState> {
    let limiter = public_rate_limiter();
    Router::new()
        .route(
            "/api/catalog/products",
            get(catalog::products).layer(limiter.clone()),
        )
        .route("/api/ads", get(catalog::ads).layer(limiter.clone()))
        .route(
            "/api/ads/{id}/views",
            post(catalog::record_ad_view).layer(limiter.clone()),
        )
        .route(
            "/api/orders",
            get(orders::index).post(catalog::submit_order.layer(limiter)),
        )
}

fn product_routes(images: &ImageConfig, gated: &RateLimiterLayer) -> Router<AppState> {
    let upload_limit = images.max_count * images.max_bytes + UPLOAD_SLACK_BYTES;
    Router::new()
        .route("/api/products", get(products::index).post(products::create))
        .route(
            "/api/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete.layer(gated.clone())),
        )
        .route("/api/products/{id}/stock", post(products::adjust_stock))
        .route(
            "/api/products/{id}/images",
            get(products::images)
                .post(products::upload_images)
                .put(products::reorder_images)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/products/{id}/images/{image}",
            delete(products::delete_image.layer(gated.clone())),
        )
}

fn register_routes(gated: &RateLimiterLayer) -> Router<AppState> {
    Router::new()
        .route("/api/orders/quotes", post(orders::create_quote))
        .route("/api/orders/{id}", get(orders::show))
        .route("/api/orders/{id}/status", post(orders::update_status))
        .route(
            "/api/cash-sessions",
            get(cash_sessions::index).post(cash_sessions::open),
        )
        .route("/api/cash-sessions/current", get(cash_sessions::current))
        .route("/api/cash-sessions/{id}/report", get(cash_sessions::report))
        .route("/api/cash-sessions/{id}/close", post(cash_sessions::close))
        .route("/api/sales", get(sales::index).post(sales::create))
        .route("/api/sales/{id}", get(sales::show))
        .route("/api/sales/{id}/ticket", get(sales::ticket))
        .route(
            "/api/customers",
            get(customers::index).post(customers::create),
        )
        .route(
            "/api/customers/{id}",
            get(customers::show)
                .put(customers::update)
                .delete(customers::delete.layer(gated.clone())),
        )
}

fn settings_routes(gated: &RateLimiterLayer) -> Router<AppState> {
    let mut router = Router::new()
        .route(
            "/api/settings/store",
            get(settings::store).put(settings::update_store),
        )
        .route(
            "/api/settings/currency-rates",
            get(settings::currency_rates).post(settings::create_currency_rate),
        )
        .route(
            "/api/settings/currency-rates/latest",
            get(settings::latest_currency_rate),
        )
        .route(
            "/api/settings/pin",
            post(settings::set_pin).layer(pin_rate_limiter()),
        )
        .route(
            "/api/settings/pin/verify",
            post(settings::verify_pin).layer(pin_rate_limiter()),
        )
        .route(
            "/api/settings/demo-data",
            post(settings::seed_demo_data.layer(gated.clone())),
        )
        .route(
            "/api/settings/promote",
            post(settings::promote.layer(gated.clone())),
        );

    for kind in TaxonomyKind::ALL {
        router = router.merge(taxonomy::router(kind, gated));
    }
    router
}

/// All API routes.
pub fn routes(images: &ImageConfig) -> Router<AppState> {
    let gated = pin_rate_limiter();
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(catalog_routes())
        .merge(product_routes(images, &gated))
        .merge(register_routes(&gated))
        .merge(settings_routes(&gated))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
