//! What clients see when a rule rejects a request.

#![allow(clippy::unwrap_used)]

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rust_decimal::Decimal;

use counterline_core::cash::CashSessionError;
use counterline_core::checkout::CheckoutError;
use counterline_core::images::ImageRuleError;
use counterline_core::ProductId;
use counterline_server::db::RepositoryError;
use counterline_server::error::AppError;
use counterline_server::services::pin::PinError;

async fn respond(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_unpaid_balance_explains_itself() {
    let (status, body) = respond(CheckoutError::UnpaidBalance(Decimal::new(1500, 2)).into()).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");
    assert_eq!(
        body["error"],
        "a balance of 15.00 is unpaid; mark the sale as credit to continue"
    );
}

#[tokio::test]
async fn test_stock_shortage_names_the_product() {
    let (status, body) = respond(
        CheckoutError::InsufficientStock {
            product_id: ProductId::new(42),
            requested: Decimal::from(3),
            available: Decimal::from(2),
        }
        .into(),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("product 42"));
}

#[tokio::test]
async fn test_session_state_conflicts() {
    let (status, body) = respond(CheckoutError::NoOpenSession.into()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = respond(CashSessionError::SessionStillOpen.into()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = respond(CashSessionError::NegativeOpeningBalance.into()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_duplicate_sku_message_is_shown() {
    let (status, body) =
        respond(RepositoryError::Conflict("product SKU-1 already exists".to_string()).into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "product SKU-1 already exists");
}

#[tokio::test]
async fn test_database_details_hidden() {
    let (status, body) =
        respond(RepositoryError::DataCorruption("bad ledger json".to_string()).into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["code"], "internal");
}

#[tokio::test]
async fn test_pin_errors() {
    let (status, body) = respond(PinError::Incorrect.into()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "incorrect PIN");

    let (status, body) = respond(PinError::Repository(RepositoryError::NotFound).into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Store not found");

    let (status, _) = respond(PinError::CurrentPinRequired.into()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pin_lockout_is_rate_limited() {
    let (status, body) = respond(PinError::TooManyAttempts.into()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
}

#[tokio::test]
async fn test_out_of_range_amounts() {
    let (status, body) = respond(CheckoutError::QuantityOutOfRange(ProductId::new(4)).into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("product 4"));

    let (status, _) = respond(CheckoutError::PaymentOutOfRange.into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = respond(CheckoutError::AmountOutOfRange.into()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "the sale amounts are too large to record");

    let (status, _) = respond(CashSessionError::AmountOutOfRange.into()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_image_limits() {
    let (status, body) = respond(
        ImageRuleError::TooManyImages {
            max: 8,
            existing: 7,
            incoming: 2,
        }
        .into(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "a product can have at most 8 images (7 already stored, 2 uploaded)"
    );

    let (status, _) = respond(ImageRuleError::PrimaryOutOfRange { index: 4, len: 2 }.into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
