//! One open cash session per store and till series, against a real database.
//!
//! These tests require a `PostgreSQL` server reachable through `DATABASE_URL`;
//! `sqlx::test` creates a fresh database per test and applies the server
//! migrations.
//!
//! Run with: `cargo test -p counterline-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rust_decimal::Decimal;
use sqlx::PgPool;

use counterline_core::StoreId;
use counterline_core::cash::SessionLedger;
use counterline_server::db::{CashSessionRepository, RepositoryError};
use counterline_server::services::CashSessionService;

/// Seeded by the first migration.
const STORE: StoreId = StoreId::new(1);

fn float() -> Decimal {
    Decimal::new(10_000, 2)
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_second_open_on_same_series_conflicts(pool: PgPool) {
    let sessions = CashSessionService::new(&pool);
    sessions.open(STORE, Some("till-1"), float()).await.unwrap();

    let err = sessions
        .open(STORE, Some("till-1"), float())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_series_are_independent(pool: PgPool) {
    let sessions = CashSessionService::new(&pool);
    let a = sessions.open(STORE, Some("till-1"), float()).await.unwrap();
    let b = sessions.open(STORE, Some("till-2"), float()).await.unwrap();
    let unnamed = sessions.open(STORE, None, float()).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(
        sessions.current(STORE, Some("till-2")).await.unwrap().map(|s| s.id),
        Some(b.id)
    );
    assert_eq!(
        sessions.current(STORE, None).await.unwrap().map(|s| s.id),
        Some(unnamed.id)
    );
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_missing_and_empty_series_are_the_same_till(pool: PgPool) {
    let sessions = CashSessionService::new(&pool);
    sessions.open(STORE, None, float()).await.unwrap();

    let err = sessions.open(STORE, Some(""), float()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_unique_index_backs_the_check(pool: PgPool) {
    // Straight to the repository, as a concurrent open would after both
    // passed the service check
    let ledger = SessionLedger::open(float()).unwrap();
    let mut conn = pool.acquire().await.unwrap();
    CashSessionRepository::insert(&mut conn, STORE, None, &ledger)
        .await
        .unwrap();

    let err = CashSessionRepository::insert(&mut conn, STORE, Some(""), &ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)), "{err:?}");
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_closed_session_frees_the_series(pool: PgPool) {
    let sessions = CashSessionService::new(&pool);
    let first = sessions.open(STORE, Some("till-1"), float()).await.unwrap();
    sessions.close(STORE, first.id, float()).await.unwrap();

    let second = sessions.open(STORE, Some("till-1"), float()).await.unwrap();
    assert_ne!(first.id, second.id);
}
