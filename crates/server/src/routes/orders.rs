//! Pending-order queue for the register.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use counterline_core::OrderId;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::StoreScope;
use crate::models::{NewQuote, Order, OrderFilter, OrderIntake, OrderStatusUpdate};
use crate::services::OrderService;
use crate::state::AppState;

/// Orders for the queue, newest first. Polled by the register.
pub async fn index(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list(store_id, &filter)
            .await?,
    ))
}

/// Draft a quote at the register. Hidden products may be quoted.
#[instrument(skip(state, quote))]
pub async fn create_quote(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(quote): Json<NewQuote>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.pool())
        .submit(store_id, OrderIntake::quote(quote))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn show(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderRepository::new(state.pool()).get(store_id, id).await?))
}

/// Load, release or cancel an order.
#[instrument(skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<OrderId>,
    Json(update): Json<OrderStatusUpdate>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .transition(store_id, id, update.status)
        .await?;
    Ok(Json(order))
}
