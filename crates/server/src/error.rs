//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding. Every handler returns `Result<T, AppError>`, and every
//! error leaves as JSON: `{"error": "<message>", "code": "<kind>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use counterline_core::cash::CashSessionError;
use counterline_core::checkout::CheckoutError;
use counterline_core::images::ImageRuleError;

use crate::db::RepositoryError;
use crate::services::image_store::ImageStoreError;
use crate::services::pin::PinError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cash-session rule violated.
    #[error("{0}")]
    CashSession(#[from] CashSessionError),

    /// Sale rejected by checkout rules.
    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    /// Image upload or edit rejected.
    #[error("{0}")]
    Images(#[from] ImageRuleError),

    /// PIN check failed.
    #[error("{0}")]
    Pin(#[from] PinError),

    /// Object store operation failed.
    #[error("Image store error: {0}")]
    ImageStore(#[from] ImageStoreError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed request that fails a field rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Action not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::CashSession(err) => match err {
                CashSessionError::NegativeOpeningBalance
                | CashSessionError::NegativeCountedCash
                | CashSessionError::AmountOutOfRange => StatusCode::UNPROCESSABLE_ENTITY,
                CashSessionError::SessionNotOpen
                | CashSessionError::SessionStillOpen
                | CashSessionError::SaleAlreadyRecorded(_) => StatusCode::CONFLICT,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InvalidQuantity(_)
                | CheckoutError::NegativePrice(_)
                | CheckoutError::QuantityOutOfRange(_)
                | CheckoutError::InvalidPayment
                | CheckoutError::PaymentOutOfRange => StatusCode::BAD_REQUEST,
                CheckoutError::NoOpenSession | CheckoutError::SessionMismatch { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::InsufficientStock { .. }
                | CheckoutError::UnpaidBalance(_)
                | CheckoutError::CreditRequiresCustomer
                | CheckoutError::CreditRequiresPhone
                | CheckoutError::Overpayment(_)
                | CheckoutError::AmountOutOfRange => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Images(err) => match err {
                ImageRuleError::EmptyBatch
                | ImageRuleError::NotAPermutation
                | ImageRuleError::PrimaryOutOfRange { .. } => StatusCode::BAD_REQUEST,
                ImageRuleError::TooManyImages { .. }
                | ImageRuleError::FileTooLarge { .. }
                | ImageRuleError::UnsupportedType { .. }
                | ImageRuleError::ContentMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Pin(err) => match err {
                PinError::InvalidFormat => StatusCode::BAD_REQUEST,
                PinError::Missing
                | PinError::Incorrect
                | PinError::NotConfigured
                | PinError::CurrentPinRequired => StatusCode::FORBIDDEN,
                PinError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
                PinError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                PinError::Hash | PinError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::ImageStore(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::UNPROCESSABLE_ENTITY => "validation",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::CONFLICT => "conflict",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::BAD_GATEWAY => "bad_gateway",
            StatusCode::TOO_MANY_REQUESTS => "rate_limited",
            _ => "internal",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Pin(PinError::Repository(RepositoryError::NotFound)) => {
                "Store not found".to_string()
            }
            Self::Pin(PinError::Hash | PinError::Repository(_)) => {
                "Internal server error".to_string()
            }
            Self::ImageStore(_) => "Image storage is unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        // Don't expose internal error details to clients
        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for register actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Sale finalized", Some(&[("sale_id", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use counterline_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict("sku".to_string()))),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rule_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::NoOpenSession.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                CheckoutError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: Decimal::TWO,
                    available: Decimal::ONE,
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(CashSessionError::SessionNotOpen.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ImageRuleError::NotAPermutation.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(PinError::Missing.into()), StatusCode::FORBIDDEN);
        assert_eq!(get_status(PinError::NotConfigured.into()), StatusCode::FORBIDDEN);
        assert_eq!(get_status(PinError::InvalidFormat.into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_codes() {
        assert_eq!(AppError::Conflict("x".to_string()).code(), "conflict");
        assert_eq!(AppError::Validation("x".to_string()).code(), "validation");
        assert_eq!(AppError::Internal("x".to_string()).code(), "internal");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("connection string leaked".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "internal");
    }
}
