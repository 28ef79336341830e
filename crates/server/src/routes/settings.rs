//! Store settings: profile, exchange rates, PIN, demo data and promotion.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::db::{CurrencyRateRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequirePin, StoreScope};
use crate::models::{
    CurrencyRate, LatestRateQuery, NewCurrencyRate, StoreProfile, StoreProfileUpdate,
};
use crate::services::demo_data::{PromoteSummary, SeedSummary};
use crate::services::{DemoDataService, DemoDataSet, PinService};
use crate::state::AppState;

pub async fn store(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
) -> Result<Json<StoreProfile>> {
    Ok(Json(StoreRepository::new(state.pool()).get(store_id).await?))
}

#[instrument(skip(state, update))]
pub async fn update_store(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(update): Json<StoreProfileUpdate>,
) -> Result<Json<StoreProfile>> {
    update.validate().map_err(AppError::Validation)?;
    let profile = StoreRepository::new(state.pool())
        .update(store_id, &update)
        .await?;
    state.catalog().invalidate(store_id).await;
    Ok(Json(profile))
}

// =============================================================================
// Currency rates
// =============================================================================

pub async fn currency_rates(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
) -> Result<Json<Vec<CurrencyRate>>> {
    Ok(Json(
        CurrencyRateRepository::new(state.pool())
            .list(store_id)
            .await?,
    ))
}

#[instrument(skip(state, input), fields(currency = %input.currency_code, rate = %input.rate))]
pub async fn create_currency_rate(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(input): Json<NewCurrencyRate>,
) -> Result<(StatusCode, Json<CurrencyRate>)> {
    input.validate().map_err(AppError::Validation)?;
    let rate = CurrencyRateRepository::new(state.pool())
        .create(store_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

pub async fn latest_currency_rate(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(query): Query<LatestRateQuery>,
) -> Result<Json<CurrencyRate>> {
    Ok(Json(
        CurrencyRateRepository::new(state.pool())
            .latest(store_id, query.currency)
            .await?,
    ))
}

// =============================================================================
// PIN
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SetPinRequest {
    /// Required once a PIN exists.
    #[serde(default)]
    pub current_pin: Option<String>,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub pin: String,
}

/// Set the first PIN or change the existing one.
pub async fn set_pin(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(request): Json<SetPinRequest>,
) -> Result<StatusCode> {
    PinService::new(state.pool(), state.pin_attempts())
        .set(store_id, request.current_pin.as_deref(), request.pin.trim())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Check a PIN before the client unlocks a gated screen.
pub async fn verify_pin(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(request): Json<VerifyPinRequest>,
) -> Result<StatusCode> {
    PinService::new(state.pool(), state.pin_attempts())
        .verify(store_id, Some(request.pin.trim()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Environment
// =============================================================================

/// Load the embedded demo catalog. PIN required.
#[instrument(skip(state))]
pub async fn seed_demo_data(
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
) -> Result<Json<SeedSummary>> {
    let data = DemoDataSet::embedded().map_err(AppError::Internal)?;
    let summary = DemoDataService::new(state.pool())
        .seed(store_id, &data)
        .await?;
    state.catalog().invalidate(store_id).await;
    Ok(Json(summary))
}

/// Wipe demo and transactional data and go live. PIN required.
#[instrument(skip(state))]
pub async fn promote(
    State(state): State<AppState>,
    RequirePin(store_id): RequirePin,
) -> Result<Json<PromoteSummary>> {
    let summary = DemoDataService::new(state.pool()).promote(store_id).await?;
    state
        .image_store()
        .delete_all(&summary.orphaned_objects)
        .await;
    state.catalog().invalidate(store_id).await;
    info!(store_id = %store_id, "Promotion complete");
    Ok(Json(summary))
}
