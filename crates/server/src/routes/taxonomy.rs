//! Units, families and warehouses.
//!
//! The three taxonomies share handlers; each gets its own path prefix
//! (`/api/units`, `/api/families`, `/api/warehouses`).

use axum::{
    Json, Router,
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use crate::db::TaxonomyRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RateLimiterLayer, RequirePin, StoreScope};
use crate::models::{TaxonomyEntry, TaxonomyInput, TaxonomyKind};
use crate::state::AppState;

/// Routes for one taxonomy. Deletes go through the shared PIN limiter.
pub fn router(kind: TaxonomyKind, gated: &RateLimiterLayer) -> Router<AppState> {
    let base = format!("/api/{}", kind.table());
    let item = format!("{base}/{{id}}");

    Router::new()
        .route(
            &base,
            get(move |state: State<AppState>, scope: StoreScope| list(kind, state, scope)).post(
                move |state: State<AppState>, scope: StoreScope, body: Json<TaxonomyInput>| {
                    create(kind, state, scope, body)
                },
            ),
        )
        .route(
            &item,
            put(
                move |state: State<AppState>,
                      scope: StoreScope,
                      id: Path<i32>,
                      body: Json<TaxonomyInput>| { update(kind, state, scope, id, body) },
            )
            .delete(
                (move |state: State<AppState>, pin: RequirePin, id: Path<i32>| {
                    delete(kind, state, pin, id)
                })
                .layer(gated.clone()),
            ),
        )
}

async fn list(
    kind: TaxonomyKind,
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
) -> Result<Json<Vec<TaxonomyEntry>>> {
    Ok(Json(
        TaxonomyRepository::new(state.pool())
            .list(kind, store_id)
            .await?,
    ))
}

#[instrument(skip(state, input))]
async fn create(
    kind: TaxonomyKind,
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(input): Json<TaxonomyInput>,
) -> Result<(StatusCode, Json<TaxonomyEntry>)> {
    input.validate().map_err(AppError::Validation)?;
    let entry = TaxonomyRepository::new(state.pool())
        .create(kind, store_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state, input))]
async fn update(
    kind: TaxonomyKind,
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<i32>,
    Json(input): Json<TaxonomyInput>,
) -> Result<Json<TaxonomyEntry>> {
    input.validate().map_err(AppError::Validation)?;
    Ok(Json(
        TaxonomyRepository::new(state.pool())
            .update(kind, store_id, id, &input)
            .await?,
    ))
}

/// Products pointing at the entry keep existing with the reference cleared.
#[instrument(skip(state))]
async fn delete(
    kind: TaxonomyKind,
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    TaxonomyRepository::new(state.pool())
        .delete(kind, store_id, id)
        .await?;
    state.catalog().invalidate(store_id).await;
    Ok(StatusCode::NO_CONTENT)
}
