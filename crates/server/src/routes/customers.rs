//! Customer records.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use counterline_core::CustomerId;

use crate::db::CustomerRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequirePin, StoreScope};
use crate::models::{Customer, CustomerFilter, CustomerInput};
use crate::state::AppState;

pub async fn index(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>> {
    Ok(Json(
        CustomerRepository::new(state.pool())
            .list(store_id, &filter)
            .await?,
    ))
}

#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>)> {
    input.validate().map_err(AppError::Validation)?;
    let customer = CustomerRepository::new(state.pool())
        .create(store_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn show(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>> {
    Ok(Json(
        CustomerRepository::new(state.pool()).get(store_id, id).await?,
    ))
}

#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<CustomerId>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>> {
    input.validate().map_err(AppError::Validation)?;
    Ok(Json(
        CustomerRepository::new(state.pool())
            .update(store_id, id, &input)
            .await?,
    ))
}

/// Delete a customer. PIN required; past sales keep their totals.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode> {
    CustomerRepository::new(state.pool())
        .delete(store_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
