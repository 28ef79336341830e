//! Till sessions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use counterline_core::cash::{SessionLedger, SessionReport};
use counterline_core::{CashSessionId, ReportKind, StoreId};

/// A cash session row with its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashSession {
    pub id: CashSessionId,
    pub store_id: StoreId,
    pub series: Option<String>,
    #[serde(flatten)]
    pub ledger: SessionLedger,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionRequest {
    pub opening_balance: Decimal,
    #[serde(default)]
    pub series: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseSessionRequest {
    pub counted_cash: Decimal,
}

/// Query for the current session of a till.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesQuery {
    #[serde(default)]
    pub series: Option<String>,
}

/// Query for a report; the kind defaults to X for open sessions and Z for closed ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub kind: Option<ReportKind>,
}

/// A report together with the session it describes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReportView {
    pub session_id: CashSessionId,
    pub store_id: StoreId,
    pub series: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: SessionReport,
}

impl SessionReportView {
    #[must_use]
    pub fn new(session: &CashSession, report: SessionReport) -> Self {
        Self {
            session_id: session.id,
            store_id: session.store_id,
            series: session.series.clone(),
            opened_at: session.opened_at,
            closed_at: session.closed_at,
            generated_at: Utc::now(),
            report,
        }
    }
}

/// Normalise a series name: blank means the default till.
#[must_use]
pub fn normalize_series(series: Option<String>) -> Option<String> {
    series
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
