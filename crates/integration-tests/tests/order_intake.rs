//! Order intake and fulfilment: server-side pricing of submitted carts and
//! matching a finished sale back to the order it served.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use counterline_core::matching::{OrderCandidate, find_matching_order};
use counterline_core::{CustomerId, OrderId, OrderStatus, ProductId, ProductStatus, StoreId};
use counterline_server::error::AppError;
use counterline_server::models::{NewOrder, NewQuote, OrderIntake, OrderSource, Product};
use counterline_server::services::orders::{orderable, price_order};

fn product(id: i32, price: Decimal, status: ProductStatus) -> Product {
    let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    Product {
        id: ProductId::new(id),
        store_id: StoreId::new(1),
        sku: format!("SKU-{id}"),
        barcode: None,
        name: format!("Product {id}"),
        description: None,
        family_id: None,
        unit_id: None,
        warehouse_id: None,
        price,
        wholesale_price: None,
        cost: None,
        stock: Decimal::from(10),
        track_stock: true,
        status,
        primary_image_index: 0,
        is_demo: false,
        created_at: at,
        updated_at: at,
    }
}

fn catalog() -> HashMap<ProductId, Product> {
    [
        product(1, Decimal::new(250, 2), ProductStatus::Active),
        product(2, Decimal::new(1999, 2), ProductStatus::Promotion),
        product(3, Decimal::new(500, 2), ProductStatus::Hidden),
        product(4, Decimal::new(100, 2), ProductStatus::Inactive),
    ]
    .into_iter()
    .map(|p| (p.id, p))
    .collect()
}

// =============================================================================
// Pricing
// =============================================================================

#[test]
fn test_client_prices_are_never_used() {
    // The request only carries ids and quantities; prices come from the catalog
    let (items, total) = price_order(
        OrderSource::Catalog,
        &[
            (ProductId::new(1), Decimal::from(3)),
            (ProductId::new(2), Decimal::new(15, 1)),
        ],
        &catalog(),
    )
    .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].unit_price, Decimal::new(250, 2));
    assert_eq!(items[0].line_total, Decimal::new(750, 2));
    // 1.5 * 19.99 = 29.985, rounded
    assert_eq!(items[1].line_total.scale(), 2);
    assert_eq!(total, items[0].line_total + items[1].line_total);
}

#[test]
fn test_catalog_order_rejects_hidden_and_inactive() {
    for id in [3, 4] {
        let result = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(id), Decimal::ONE)],
            &catalog(),
        );
        assert!(matches!(result, Err(AppError::Validation(_))), "product {id}");
    }
}

#[test]
fn test_register_quote_may_include_hidden() {
    let (items, _) = price_order(
        OrderSource::Pos,
        &[(ProductId::new(3), Decimal::ONE)],
        &catalog(),
    )
    .unwrap();
    assert_eq!(items[0].product_name, "Product 3");

    assert!(!orderable(OrderSource::Pos, ProductStatus::Inactive));
}

fn requested(intake: &OrderIntake) -> Vec<(ProductId, Decimal)> {
    intake
        .items
        .iter()
        .map(|i| (i.product_id, i.quantity))
        .collect()
}

#[test]
fn test_public_intake_cannot_claim_register_source() {
    let order: NewOrder = serde_json::from_value(serde_json::json!({
        "source": "pos",
        "customer_id": 7,
        "items": [{"product_id": 3, "quantity": "1"}],
    }))
    .unwrap();

    let intake = OrderIntake::catalog(order);
    assert_eq!(intake.source, OrderSource::Catalog);
    assert_eq!(intake.customer_id, None);

    // Product 3 is hidden
    assert!(matches!(
        price_order(intake.source, &requested(&intake), &catalog()),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn test_register_quote_keeps_customer() {
    let quote: NewQuote = serde_json::from_value(serde_json::json!({
        "customer_id": 7,
        "items": [{"product_id": 3, "quantity": "2"}],
    }))
    .unwrap();

    let intake = OrderIntake::quote(quote);
    assert_eq!(intake.source, OrderSource::Pos);
    assert_eq!(intake.customer_id, Some(CustomerId::new(7)));
    let (items, total) = price_order(intake.source, &requested(&intake), &catalog()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(total, Decimal::new(1000, 2));
}

#[test]
fn test_empty_and_zero_quantity_orders() {
    assert!(matches!(
        price_order(OrderSource::Catalog, &[], &catalog()),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        price_order(
            OrderSource::Catalog,
            &[(ProductId::new(1), Decimal::ZERO)],
            &catalog()
        ),
        Err(AppError::Validation(_))
    ));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_order_lifecycle() {
    // Loaded onto a register, released, loaded again, then sold
    let path = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Processed,
    ];
    for pair in path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
    assert!(OrderStatus::Processed.is_terminal());
}

#[test]
fn test_finished_orders_stay_finished() {
    for terminal in [OrderStatus::Processed, OrderStatus::Cancelled, OrderStatus::Expired] {
        for next in [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Cancelled] {
            assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
        }
    }
    assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Expired));
}

// =============================================================================
// Matching
// =============================================================================

#[test]
fn test_sale_matches_most_similar_recent_order() {
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
    let candidates = [
        OrderCandidate {
            id: OrderId::new(1),
            created_at: now - Duration::hours(3),
            product_ids: vec![ProductId::new(1), ProductId::new(2), ProductId::new(3)],
        },
        OrderCandidate {
            id: OrderId::new(2),
            created_at: now - Duration::hours(1),
            product_ids: vec![ProductId::new(1), ProductId::new(2)],
        },
        OrderCandidate {
            id: OrderId::new(3),
            created_at: now,
            product_ids: vec![ProductId::new(7), ProductId::new(8)],
        },
    ];

    let sale = [ProductId::new(1), ProductId::new(2), ProductId::new(9)];
    assert_eq!(find_matching_order(&sale, &candidates), Some(OrderId::new(2)));
}

#[test]
fn test_sale_without_overlap_matches_nothing() {
    let candidates = [OrderCandidate {
        id: OrderId::new(1),
        created_at: Utc::now(),
        product_ids: vec![ProductId::new(1), ProductId::new(2), ProductId::new(3)],
    }];

    // 1 of 3 is below the threshold
    assert_eq!(find_matching_order(&[ProductId::new(1)], &candidates), None);
    assert_eq!(find_matching_order(&[], &candidates), None);
}
