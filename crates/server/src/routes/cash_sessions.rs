//! Till sessions: open, current, history, X/Z reports and close.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use counterline_core::CashSessionId;

use crate::error::Result;
use crate::middleware::StoreScope;
use crate::models::{
    CashSession, CloseSessionRequest, OpenSessionRequest, ReportQuery, SeriesQuery,
    SessionReportView, normalize_series,
};
use crate::services::CashSessionService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn index(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CashSession>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(
        CashSessionService::new(state.pool())
            .list(store_id, limit)
            .await?,
    ))
}

/// The open session for `?series=`, or `null` when the till is closed.
pub async fn current(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<Option<CashSession>>> {
    let series = normalize_series(query.series);
    Ok(Json(
        CashSessionService::new(state.pool())
            .current(store_id, series.as_deref())
            .await?,
    ))
}

pub async fn open(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<CashSession>)> {
    let series = normalize_series(request.series);
    let session = CashSessionService::new(state.pool())
        .open(store_id, series.as_deref(), request.opening_balance)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// X report for an open session, Z report for a closed one (or `?kind=`).
pub async fn report(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<CashSessionId>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SessionReportView>> {
    Ok(Json(
        CashSessionService::new(state.pool())
            .report(store_id, id, query.kind)
            .await?,
    ))
}

/// Close against the counted drawer; returns the Z report.
pub async fn close(
    State(state): State<AppState>,
    StoreScope(store_id): StoreScope,
    Path(id): Path<CashSessionId>,
    Json(request): Json<CloseSessionRequest>,
) -> Result<Json<SessionReportView>> {
    Ok(Json(
        CashSessionService::new(state.pool())
            .close(store_id, id, request.counted_cash)
            .await?,
    ))
}
