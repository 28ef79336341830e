//! Pending orders: intake, status transitions and expiry.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use counterline_core::{
    OrderId, OrderStatus, ProductId, ProductStatus, StoreId, checked_line_total,
    checked_sum_money, is_storable_quantity,
};

use crate::db::orders::PricedOrder;
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::AppError;
use crate::models::{Order, OrderIntake, OrderItem, OrderSource, Product};

/// How often the background sweep looks for stale orders.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

/// Whether a product may appear on an order from `source`.
///
/// Catalog orders only carry listed products; register quotes may also
/// carry hidden ones. Inactive products never qualify.
#[must_use]
pub const fn orderable(source: OrderSource, status: ProductStatus) -> bool {
    match source {
        OrderSource::Catalog => status.is_listed(),
        OrderSource::Pos => !matches!(status, ProductStatus::Inactive),
    }
}

/// Reject an empty cart and quantities that are not positive or do not fit
/// a quantity column.
///
/// # Errors
///
/// Returns a validation error naming the first bad line.
pub fn check_quantities(requested: &[(ProductId, Decimal)]) -> Result<(), AppError> {
    if requested.is_empty() {
        return Err(AppError::Validation("order has no items".to_string()));
    }
    for &(product_id, quantity) in requested {
        if quantity <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "quantity for product {product_id} must be greater than zero"
            )));
        }
        if !is_storable_quantity(quantity) {
            return Err(AppError::Validation(format!(
                "quantity for product {product_id} is too large or has more than 3 decimal places"
            )));
        }
    }
    Ok(())
}

/// Price order lines from current product data.
///
/// # Errors
///
/// Returns a validation error for a cart rejected by [`check_quantities`],
/// a product that is missing or not orderable, or a total too large to
/// record.
pub fn price_order(
    source: OrderSource,
    requested: &[(ProductId, Decimal)],
    products: &HashMap<ProductId, Product>,
) -> Result<(Vec<OrderItem>, Decimal), AppError> {
    check_quantities(requested)?;
    let mut items = Vec::with_capacity(requested.len());
    for &(product_id, quantity) in requested {
        let product = products
            .get(&product_id)
            .filter(|p| orderable(source, p.status))
            .ok_or_else(|| {
                AppError::Validation(format!("product {product_id} is not available"))
            })?;
        let line_total = checked_line_total(quantity, product.price).ok_or_else(too_large)?;
        items.push(OrderItem {
            product_id: Some(product.id),
            product_name: product.name.clone(),
            quantity,
            unit_price: product.price,
            line_total,
        });
    }
    let total = checked_sum_money(items.iter().map(|i| i.line_total)).ok_or_else(too_large)?;
    Ok((items, total))
}

fn too_large() -> AppError {
    AppError::Validation("order total is too large to record".to_string())
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// Create a pending order priced from current product prices.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the cart is empty or contains products
    /// that cannot be ordered.
    #[instrument(skip(self, order), fields(items = order.items.len(), source = ?order.source))]
    pub async fn submit(&self, store_id: StoreId, order: OrderIntake) -> Result<Order, AppError> {
        let requested: Vec<(ProductId, Decimal)> = order
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();
        check_quantities(&requested)?;
        let mut ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let products: HashMap<ProductId, Product> = ProductRepository::lock(&mut tx, store_id, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let (items, total) = price_order(order.source, &requested, &products)?;

        let priced = PricedOrder {
            source: order.source,
            customer_id: order.customer_id,
            customer_name: order
                .customer_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            customer_phone: order.customer_phone.map(String::from),
            note: order.note,
            total,
            items,
        };
        let created = OrderRepository::insert(&mut tx, store_id, &priced).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(order_id = %created.id, total = %created.total, "Order received");
        Ok(created)
    }

    /// Move an order to a new status.
    ///
    /// `processed` is reserved for sales; every other transition follows
    /// [`OrderStatus::can_transition_to`].
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict for a transition that is not allowed.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        store_id: StoreId,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        if next == OrderStatus::Processed {
            return Err(AppError::Validation(
                "orders are marked processed by finalizing a sale".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut order = OrderRepository::lock(&mut tx, store_id, id).await?;
        if !order.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "cannot move order {id} from {} to {next}",
                order.status
            )));
        }
        OrderRepository::set_status(&mut tx, id, next).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        order.status = next;
        Ok(order)
    }

    /// Expire pending orders older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns error if the database update fails.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, max_age: chrono::Duration) -> Result<u64, AppError> {
        let cutoff = Utc::now() - max_age;
        let count = self.orders.expire_stale(cutoff).await?;
        if count > 0 {
            info!(count = %count, "Expired stale pending orders");
        }
        Ok(count)
    }
}

/// Run the expiry sweep on a fixed interval until the runtime shuts down.
pub fn spawn_expiry_task(
    pool: PgPool,
    max_age: chrono::Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = OrderService::new(&pool).expire_stale(max_age).await {
                warn!(error = %e, "Order expiry sweep failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use counterline_core::StoreId;

    use super::*;

    fn product(id: i32, price: i64, status: ProductStatus) -> Product {
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
            price: Decimal::new(price, 2),
            wholesale_price: None,
            cost: None,
            stock: Decimal::from(10),
            track_stock: true,
            status,
            primary_image_index: 0,
            is_demo: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn test_prices_come_from_products() {
        let products = catalog(vec![
            product(1, 350, ProductStatus::Active),
            product(2, 1000, ProductStatus::Promotion),
        ]);
        let (items, total) = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(1), Decimal::from(2)), (ProductId::new(2), Decimal::ONE)],
            &products,
        )
        .unwrap();
        assert_eq!(items[0].unit_price, Decimal::new(350, 2));
        assert_eq!(items[0].line_total, Decimal::new(700, 2));
        assert_eq!(total, Decimal::new(1700, 2));
    }

    #[test]
    fn test_catalog_rejects_hidden_products() {
        let products = catalog(vec![product(1, 100, ProductStatus::Hidden)]);
        let err = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(1), Decimal::ONE)],
            &products,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // The register may quote hidden products
        assert!(
            price_order(OrderSource::Pos, &[(ProductId::new(1), Decimal::ONE)], &products).is_ok()
        );
    }

    #[test]
    fn test_rejects_empty_and_non_positive() {
        let products = catalog(vec![product(1, 100, ProductStatus::Active)]);
        assert!(price_order(OrderSource::Catalog, &[], &products).is_err());
        assert!(
            price_order(
                OrderSource::Catalog,
                &[(ProductId::new(1), Decimal::ZERO)],
                &products
            )
            .is_err()
        );
    }

    #[test]
    fn test_oversized_quantity_rejected_without_panic() {
        let products = catalog(vec![product(1, 200, ProductStatus::Active)]);
        let huge: Decimal = "79228162514264337593543950335".parse().unwrap();
        let err = price_order(OrderSource::Catalog, &[(ProductId::new(1), huge)], &products)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(1), Decimal::new(1_0005, 4))],
            &products,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_order_total_too_large() {
        let products = catalog(vec![product(1, 99_999, ProductStatus::Active)]);
        let err = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(1), counterline_core::MAX_QUANTITY)],
            &products,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: order total is too large to record");
    }

    #[test]
    fn test_unknown_product_rejected() {
        let err = price_order(
            OrderSource::Catalog,
            &[(ProductId::new(9), Decimal::ONE)],
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("product 9"));
    }

    #[test]
    fn test_orderable() {
        assert!(orderable(OrderSource::Catalog, ProductStatus::Active));
        assert!(!orderable(OrderSource::Catalog, ProductStatus::Inactive));
        assert!(!orderable(OrderSource::Pos, ProductStatus::Inactive));
        assert!(orderable(OrderSource::Pos, ProductStatus::Hidden));
    }
}
