//! Requests through the full router, middleware included.
//!
//! None of these reach a live database: they stop at health checks,
//! extractors, PIN checks or rate limiting.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use counterline_integration_tests::test_app;
use counterline_server::middleware::PIN_HEADER;
use counterline_server::middleware::request_id::REQUEST_ID_HEADER;

fn request(method: Method, uri: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: Method, uri: &str, client_ip: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client_ip)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", "192.0.2.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_readiness_without_database() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health/ready", "192.0.2.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_generated() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", "192.0.2.1"))
        .await
        .unwrap();

    let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(!id.is_empty());
}

#[tokio::test]
async fn test_request_id_echoed() {
    let mut req = request(Method::GET, "/health", "192.0.2.1");
    req.headers_mut()
        .insert(REQUEST_ID_HEADER, "till-7-req-0042".parse().unwrap());

    let response = test_app().oneshot(req).await.unwrap();

    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "till-7-req-0042"
    );
}

#[tokio::test]
async fn test_unknown_route() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/nope", "192.0.2.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Extractors
// =============================================================================

#[tokio::test]
async fn test_invalid_store_id() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/products?store_id=abc", "192.0.2.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "bad_request");
    assert_eq!(body["error"], "Bad request: invalid store_id");
}

#[tokio::test]
async fn test_malformed_order_json() {
    let response = test_app()
        .oneshot(json_request(Method::POST, "/api/orders", "192.0.2.2", "{"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_order_quantity_rejected() {
    let response = test_app()
        .oneshot(json_request(
            Method::POST,
            "/api/orders",
            "192.0.2.2",
            r#"{"items": [{"product_id": 1, "quantity": "79228162514264337593543950335"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn test_order_queue_and_intake_share_a_path() {
    // GET is the register queue, POST the public intake; PUT matches neither
    let response = test_app()
        .oneshot(request(Method::PUT, "/api/orders", "192.0.2.3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// PIN gating
// =============================================================================

#[tokio::test]
async fn test_delete_customer_without_pin() {
    let response = test_app()
        .oneshot(request(Method::DELETE, "/api/customers/5", "192.0.2.4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "forbidden");
    assert_eq!(body["error"], "this action requires the store PIN");
}

#[tokio::test]
async fn test_promote_without_pin() {
    let response = test_app()
        .oneshot(request(Method::POST, "/api/settings/promote", "192.0.2.4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_blank_pin_header_counts_as_missing() {
    let mut req = request(Method::DELETE, "/api/units/3", "192.0.2.4");
    req.headers_mut().insert(PIN_HEADER, "   ".parse().unwrap());

    let response = test_app().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pin_verify_rate_limited() {
    let app = test_app();

    // Burst of 5, then the limiter answers before the handler
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/settings/pin/verify",
                "198.51.100.20",
                r#"{"pin": ""}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/settings/pin/verify",
            "198.51.100.20",
            r#"{"pin": ""}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other clients are unaffected
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/settings/pin/verify",
            "198.51.100.21",
            r#"{"pin": ""}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_gated_routes_share_ip_limit() {
    let app = test_app();
    let paths = [
        "/api/customers/5",
        "/api/units/3",
        "/api/products/9",
        "/api/families/2",
        "/api/warehouses/1",
    ];

    for path in paths {
        let response = app
            .clone()
            .oneshot(request(Method::DELETE, path, "198.51.100.30"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }

    let response = app
        .oneshot(request(Method::POST, "/api/settings/promote", "198.51.100.30"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_pin_guesses_counted_per_store() {
    let app = test_app();
    let guess = |ip: String| {
        let mut req = request(Method::DELETE, "/api/products/999999", &ip);
        req.headers_mut().insert(PIN_HEADER, "1234".parse().unwrap());
        req
    };

    // A new address for every guess keeps the per-IP limiter out of the way
    for i in 1..=5 {
        let response = app
            .clone()
            .oneshot(guess(format!("203.0.113.{i}")))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app.oneshot(guess("203.0.113.6".to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["error"], "too many incorrect PIN attempts; try again later");
}
