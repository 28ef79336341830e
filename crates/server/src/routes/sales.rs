//! Sales: finalize, history and tickets.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use counterline_core::SaleId;

use crate::db::{CustomerRepository, RepositoryError, SaleRepository, StoreRepository};
use crate::error::Result;
use crate::middleware::{PinHeader, StoreScope};
use crate::models::{NewSale, Sale, SaleFilter};
use crate::services::{CheckoutService, render_ticket};
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<Vec<Sale>>> {
    Ok(Json(
        SaleRepository::new(state.pool())
            .list(store_id, &filter)
            .await?,
    ))
}

/// Finalize a sale. The PIN header is only checked for wholesale lines or
/// inactive products.
pub async fn create(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    PinHeader(pin): PinHeader,
    Json(sale): Json<NewSale>,
) -> Result<(StatusCode, Json<Sale>)> {
    let sale = CheckoutService::new(&state)
        .finalize(store_id, sale, pin.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn show(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<SaleId>,
) -> Result<Json<Sale>> {
    Ok(Json(SaleRepository::new(state.pool()).get(store_id, id).await?))
}

/// Plain-text receipt for printing or sharing.
pub async fn ticket(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<SaleId>,
) -> Result<impl IntoResponse> {
    let pool = state.pool();
    let sale = SaleRepository::new(pool).get(store_id, id).await?;
    let store = StoreRepository::new(pool).get(store_id).await?;
    let customer = match sale.customer_id {
        Some(customer_id) => match CustomerRepository::new(pool).get(store_id, customer_id).await {
            Ok(customer) => Some(customer),
            Err(RepositoryError::NotFound) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let body = render_ticket(&store, &sale, customer.as_ref());
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body))
}
