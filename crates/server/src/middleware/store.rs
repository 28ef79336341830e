//! Store scoping and PIN extractors.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use counterline_core::StoreId;

use crate::error::AppError;
use crate::services::pin::PinService;
use crate::state::AppState;

/// Header carrying the store PIN on gated requests.
pub const PIN_HEADER: &str = "x-pos-pin";

#[derive(Debug, Default, Deserialize)]
struct StoreQuery {
    store_id: Option<StoreId>,
}

/// The store a request operates on: `?store_id=`, or the configured default.
///
/// # Example
///
/// ```rust,ignore
/// async fn list(State(state): State<AppState>, StoreScope(store_id): StoreScope) { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StoreScope(pub StoreId);

impl FromRequestParts<AppState> for StoreScope {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<StoreQuery>::try_from_uri(&parts.uri)
            .map_err(|_| AppError::BadRequest("invalid store_id".to_string()))?;
        Ok(Self(
            query.0.store_id.unwrap_or(state.config().default_store_id),
        ))
    }
}

/// The raw PIN header, if sent. Used where only some requests need the PIN.
#[derive(Debug, Clone, Default)]
pub struct PinHeader(pub Option<String>);

impl<S> FromRequestParts<S> for PinHeader
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(PIN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        ))
    }
}

/// Extractor that requires a valid store PIN.
///
/// Rejects with 403 when the header is missing, the PIN is wrong, or the
/// store has no PIN configured, and with 429 once the store has used up its
/// PIN attempts.
#[derive(Debug, Clone, Copy)]
pub struct RequirePin(pub StoreId);

impl FromRequestParts<AppState> for RequirePin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let StoreScope(store_id) = StoreScope::from_request_parts(parts, state).await?;
        let Ok(PinHeader(pin)) = PinHeader::from_request_parts(parts, state).await;
        PinService::new(state.pool(), state.pin_attempts())
            .verify(store_id, pin.as_deref())
            .await?;
        Ok(Self(store_id))
    }
}
