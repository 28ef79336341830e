//! Catalog products and their images.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use counterline_core::{
    FamilyId, ProductId, ProductImageId, ProductStatus, StoreId, UnitId, WarehouseId,
    is_storable_money, is_storable_quantity,
};

/// A product as managed from the back office.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub family_id: Option<FamilyId>,
    pub unit_id: Option<UnitId>,
    pub warehouse_id: Option<WarehouseId>,
    pub price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub stock: Decimal,
    /// Untracked products (services, made to order) never block a sale.
    pub track_stock: bool,
    pub status: ProductStatus,
    pub primary_image_index: usize,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Available stock if the product tracks inventory.
    #[must_use]
    pub const fn tracked_stock(&self) -> Option<Decimal> {
        if self.track_stock {
            Some(self.stock)
        } else {
            None
        }
    }
}

/// Create/update payload for a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub family_id: Option<FamilyId>,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    pub price: Decimal,
    #[serde(default)]
    pub wholesale_price: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    /// Initial stock; ignored on update (use a stock adjustment).
    #[serde(default)]
    pub stock: Decimal,
    #[serde(default = "default_true")]
    pub track_stock: bool,
    #[serde(default)]
    pub status: ProductStatus,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Field-level checks that do not need the database.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.sku.trim().is_empty() {
            return Err("sku is required".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        let negative = |v: Option<Decimal>| v.is_some_and(|d| d < Decimal::ZERO);
        if self.price < Decimal::ZERO || negative(self.wholesale_price) || negative(self.cost) {
            return Err("prices cannot be negative".to_string());
        }
        let prices = [Some(self.price), self.wholesale_price, self.cost];
        if !prices.into_iter().flatten().all(is_storable_money) {
            return Err("prices must have at most 2 decimal places and fit the register's limits".to_string());
        }
        if self.stock < Decimal::ZERO {
            return Err("stock cannot be negative".to_string());
        }
        if !is_storable_quantity(self.stock) {
            return Err("stock must have at most 3 decimal places and fit the register's limits".to_string());
        }
        Ok(())
    }
}

/// Query filter for the back-office product list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub family_id: Option<FamilyId>,
    /// Matches name, SKU or barcode
    pub q: Option<String>,
    /// Only tracked products at or below the store's low-stock threshold
    #[serde(default)]
    pub low_stock: bool,
}

/// Relative stock change, e.g. a delivery (+) or shrinkage (-).
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub delta: Decimal,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StockAdjustment {
    /// # Errors
    ///
    /// Returns a message when the delta is zero or cannot be stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.delta.is_zero() {
            return Err("delta cannot be zero".to_string());
        }
        if !is_storable_quantity(self.delta) {
            return Err("delta must have at most 3 decimal places and fit the register's limits".to_string());
        }
        Ok(())
    }
}

/// Product as shown in the public catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub family_id: Option<FamilyId>,
    pub price: Decimal,
    pub status: ProductStatus,
    pub in_stock: bool,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// One stored product image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub position: usize,
    pub url: String,
    pub thumbnail_url: String,
    #[serde(skip)]
    pub object_key: String,
    #[serde(skip)]
    pub thumbnail_key: String,
    pub content_type: String,
    pub byte_size: usize,
    pub created_at: DateTime<Utc>,
}

/// A product's ordered images and which one is primary.
#[derive(Debug, Clone, Serialize)]
pub struct ProductImageSet {
    pub product_id: ProductId,
    pub primary_index: usize,
    pub images: Vec<ProductImage>,
}

impl ProductImageSet {
    #[must_use]
    pub fn primary(&self) -> Option<&ProductImage> {
        self.images.get(self.primary_index)
    }
}

/// New display order for a product's images.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageOrderUpdate {
    /// Every current image id, in the desired order.
    pub image_ids: Vec<ProductImageId>,
    /// Primary image after reordering. Defaults to following the old primary.
    #[serde(default)]
    pub primary_index: Option<usize>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(price: Decimal, stock: Decimal) -> ProductInput {
        serde_json::from_value(serde_json::json!({
            "sku": "BEAN-1",
            "name": "Coffee beans",
            "price": price.to_string(),
            "stock": stock.to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_product() {
        assert!(input(Decimal::new(1250, 2), Decimal::new(2_500, 3)).validate().is_ok());
    }

    #[test]
    fn test_price_must_fit_money_column() {
        assert!(input(Decimal::new(12_505, 3), Decimal::ONE).validate().is_err());
        assert!(input(Decimal::MAX, Decimal::ONE).validate().is_err());
    }

    #[test]
    fn test_stock_must_fit_quantity_column() {
        assert!(input(Decimal::ONE, Decimal::new(1_0005, 4)).validate().is_err());
    }

    #[test]
    fn test_stock_adjustment() {
        let adjust = |delta: Decimal| StockAdjustment { delta, reason: None }.validate();
        assert!(adjust(Decimal::new(-25, 1)).is_ok());
        assert!(adjust(Decimal::ZERO).is_err());
        assert!(adjust(Decimal::MAX).is_err());
    }
}
