//! Pending orders submitted from the catalog or drafted at the register.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use counterline_core::{CustomerId, OrderId, OrderStatus, PhoneNumber, ProductId, SaleId, StoreId};

/// Where an order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, sqlx::Type)]
#[sqlx(type_name = "order_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    #[default]
    Catalog,
    /// A quote drafted at the register.
    Pos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub note: Option<String>,
    pub total: Decimal,
    /// Sale that fulfilled the order, once processed.
    pub sale_id: Option<SaleId>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Distinct products on the order, in item order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.items.len());
        for id in self.items.iter().filter_map(|i| i.product_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart submitted from the public catalog.
///
/// Prices are never taken from the client; each line is priced from the
/// product's current price when the order is created. The body cannot pick
/// the order source or a registered customer; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<PhoneNumber>,
    #[serde(default)]
    pub note: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// Quote drafted at the register, optionally for a registered customer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuote {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<PhoneNumber>,
    #[serde(default)]
    pub note: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// A cart on its way into the order queue, with where it came from.
#[derive(Debug, Clone)]
pub struct OrderIntake {
    pub source: OrderSource,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<PhoneNumber>,
    pub note: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl OrderIntake {
    /// A public catalog order: listed products only, no registered customer.
    #[must_use]
    pub fn catalog(order: NewOrder) -> Self {
        Self {
            source: OrderSource::Catalog,
            customer_id: None,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            note: order.note,
            items: order.items,
        }
    }

    /// A register quote.
    #[must_use]
    pub fn quote(quote: NewQuote) -> Self {
        Self {
            source: OrderSource::Pos,
            customer_id: quote.customer_id,
            customer_name: quote.customer_name,
            customer_phone: quote.customer_phone,
            note: quote.note,
            items: quote.items,
        }
    }
}

/// Requested order status change.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Query filter for the order queue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
}
