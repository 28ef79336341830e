//! Public catalog: listed products, ads and cart submission.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use counterline_core::AdId;

use crate::db::AdRepository;
use crate::error::Result;
use crate::middleware::StoreScope;
use crate::models::{Ad, CatalogProduct, NewOrder, Order, OrderIntake};
use crate::services::OrderService;
use crate::state::AppState;

/// Listed products, served from the catalog cache.
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
) -> Result<Json<Vec<CatalogProduct>>> {
    let products = state.catalog().products(state.pool(), store_id).await?;
    Ok(Json(products.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn ads(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
) -> Result<Json<Vec<Ad>>> {
    Ok(Json(AdRepository::new(state.pool()).list_active(store_id).await?))
}

#[derive(Debug, Serialize)]
pub struct AdViews {
    pub views: i64,
}

pub async fn record_ad_view(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<AdId>,
) -> Result<Json<AdViews>> {
    let views = AdRepository::new(state.pool()).record_view(store_id, id).await?;
    Ok(Json(AdViews { views }))
}

/// Submit a cart as a pending catalog order.
#[instrument(skip(state, order))]
pub async fn submit_order(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(order): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.pool())
        .submit(store_id, OrderIntake::catalog(order))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
