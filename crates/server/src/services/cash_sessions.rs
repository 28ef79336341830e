//! Cash-session orchestration: open, current, report, close.
//!
//! Ledger rules live in `counterline_core::cash`; this service loads and locks
//! session rows, applies those rules and writes the result back in one
//! transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};

use counterline_core::cash::SessionLedger;
use counterline_core::{CashSessionId, ReportKind, StoreId};

use crate::db::{CashSessionRepository, RepositoryError};
use crate::error::AppError;
use crate::models::{CashSession, SessionReportView};

/// Cash-session service.
pub struct CashSessionService<'a> {
    pool: &'a PgPool,
    sessions: CashSessionRepository<'a>,
}

impl<'a> CashSessionService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            sessions: CashSessionRepository::new(pool),
        }
    }

    /// Open a session for a till.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a negative float and a conflict when
    /// the till already has an open session.
    #[instrument(skip(self))]
    pub async fn open(
        &self,
        store_id: StoreId,
        series: Option<&str>,
        opening_balance: Decimal,
    ) -> Result<CashSession, AppError> {
        let ledger = SessionLedger::open(opening_balance)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        if let Some(open) = CashSessionRepository::lock_open(&mut tx, store_id, series).await? {
            return Err(AppError::Conflict(format!(
                "cash session {} is already open for this register",
                open.id
            )));
        }
        // The partial unique index catches a concurrent open that slipped past the check
        let session = CashSessionRepository::insert(&mut tx, store_id, series, &ledger).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(session_id = %session.id, series = ?series, "Cash session opened");
        Ok(session)
    }

    /// The open session of a till, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn current(
        &self,
        store_id: StoreId,
        series: Option<&str>,
    ) -> Result<Option<CashSession>, AppError> {
        Ok(self.sessions.current(store_id, series).await?)
    }

    /// Session history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, store_id: StoreId, limit: i64) -> Result<Vec<CashSession>, AppError> {
        Ok(self.sessions.list(store_id, limit).await?)
    }

    /// X or Z report for a session.
    ///
    /// Without an explicit kind, open sessions get an X report and closed
    /// sessions a Z report.
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict when the kind does not fit the status.
    #[instrument(skip(self))]
    pub async fn report(
        &self,
        store_id: StoreId,
        id: CashSessionId,
        kind: Option<ReportKind>,
    ) -> Result<SessionReportView, AppError> {
        let session = self.sessions.get(store_id, id).await?;
        let kind = kind.unwrap_or(if session.ledger.is_open() {
            ReportKind::X
        } else {
            ReportKind::Z
        });
        let report = session.ledger.report(kind)?;
        Ok(SessionReportView::new(&session, report))
    }

    /// Close a session against the counted drawer and return its Z report.
    ///
    /// # Errors
    ///
    /// Returns not found, a conflict if the session is already closed, or a
    /// validation error for a negative count.
    #[instrument(skip(self))]
    pub async fn close(
        &self,
        store_id: StoreId,
        id: CashSessionId,
        counted_cash: Decimal,
    ) -> Result<SessionReportView, AppError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut session = CashSessionRepository::lock(&mut tx, store_id, id).await?;

        let report = session.ledger.close(counted_cash)?;
        let closed = CashSessionRepository::save_ledger(
            &mut tx,
            session.id,
            &session.ledger,
            Some(Utc::now()),
        )
        .await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            session_id = %closed.id,
            expected = %report.expected_cash,
            counted = ?report.counted_cash,
            difference = ?report.difference,
            "Cash session closed"
        );
        Ok(SessionReportView::new(&closed, report))
    }
}
