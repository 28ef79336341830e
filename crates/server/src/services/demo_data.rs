//! Demo catalog seeding and promotion to production.
//!
//! A new store starts in the `demo` environment. Seeding loads a sample
//! catalog (taxonomy, products, customers, ads) flagged `is_demo`. Promoting
//! wipes every sale, payment, cash session and order, removes the demo rows
//! and switches the store to `production`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};

use counterline_core::{FamilyId, StoreEnvironment, StoreId, UnitId, WarehouseId};

use crate::db::{
    AdRepository, CustomerRepository, ProductRepository, RepositoryError, StoreRepository,
    TaxonomyRepository,
};
use crate::error::AppError;
use crate::models::{CustomerInput, ProductInput, TaxonomyInput, TaxonomyKind};

/// Demo catalog shipped with the server.
pub const EMBEDDED_DEMO_DATA: &str = include_str!("../../data/demo_data.yaml");

/// A demo product; taxonomy is referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoProduct {
    #[serde(flatten)]
    pub product: ProductInput,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub warehouse: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoAd {
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
}

/// A full demo data document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoDataSet {
    #[serde(default)]
    pub units: Vec<TaxonomyInput>,
    #[serde(default)]
    pub families: Vec<TaxonomyInput>,
    #[serde(default)]
    pub warehouses: Vec<TaxonomyInput>,
    #[serde(default)]
    pub products: Vec<DemoProduct>,
    #[serde(default)]
    pub customers: Vec<CustomerInput>,
    #[serde(default)]
    pub ads: Vec<DemoAd>,
}

impl DemoDataSet {
    /// Parse and check a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a message if the YAML is malformed, a product is invalid, or a
    /// product names a unit, family or warehouse the document does not define.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        let set: Self = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        set.check()?;
        Ok(set)
    }

    /// The demo catalog embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns a message if the embedded document fails to parse.
    pub fn embedded() -> Result<Self, String> {
        Self::from_yaml(EMBEDDED_DEMO_DATA)
    }

    fn check(&self) -> Result<(), String> {
        let defined = |entries: &[TaxonomyInput], name: Option<&str>| {
            name.is_none_or(|n| entries.iter().any(|e| e.name.trim() == n.trim()))
        };
        for demo in &self.products {
            let sku = &demo.product.sku;
            demo.product.validate().map_err(|e| format!("product {sku}: {e}"))?;
            if !defined(&self.units, demo.unit.as_deref()) {
                return Err(format!("product {sku}: unknown unit"));
            }
            if !defined(&self.families, demo.family.as_deref()) {
                return Err(format!("product {sku}: unknown family"));
            }
            if !defined(&self.warehouses, demo.warehouse.as_deref()) {
                return Err(format!("product {sku}: unknown warehouse"));
            }
        }
        Ok(())
    }
}

/// Counts of what a seed inserted.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SeedSummary {
    pub taxonomy: usize,
    pub products: usize,
    pub customers: usize,
    pub ads: usize,
}

/// What a promotion removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromoteSummary {
    pub sales_removed: u64,
    pub demo_rows_removed: u64,
    /// Image objects of removed demo products, for the caller to delete.
    #[serde(skip)]
    pub orphaned_objects: Vec<String>,
}

/// Demo data service.
pub struct DemoDataService<'a> {
    pool: &'a PgPool,
}

impl<'a> DemoDataService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Replace the store's demo rows with `data` and mark it `demo`.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the store has already been promoted, or a
    /// database error. Nothing is written on error.
    #[instrument(skip(self, data))]
    pub async fn seed(
        &self,
        store_id: StoreId,
        data: &DemoDataSet,
    ) -> Result<SeedSummary, AppError> {
        let store = StoreRepository::new(self.pool).get(store_id).await?;
        if store.environment == StoreEnvironment::Production {
            return Err(AppError::Conflict(
                "store is in production; demo data can no longer be loaded".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        StoreRepository::purge_demo(&mut tx, store_id).await?;

        let mut summary = SeedSummary::default();
        let units = insert_taxonomy(&mut tx, store_id, TaxonomyKind::Unit, &data.units).await?;
        let families =
            insert_taxonomy(&mut tx, store_id, TaxonomyKind::Family, &data.families).await?;
        let warehouses =
            insert_taxonomy(&mut tx, store_id, TaxonomyKind::Warehouse, &data.warehouses).await?;
        summary.taxonomy = units.len() + families.len() + warehouses.len();

        for demo in &data.products {
            let lookup = |map: &HashMap<String, i32>, name: Option<&str>| {
                name.and_then(|n| map.get(n.trim()).copied())
            };
            let mut input = demo.product.clone();
            input.unit_id = lookup(&units, demo.unit.as_deref()).map(UnitId::new);
            input.family_id = lookup(&families, demo.family.as_deref()).map(FamilyId::new);
            input.warehouse_id =
                lookup(&warehouses, demo.warehouse.as_deref()).map(WarehouseId::new);
            ProductRepository::insert(&mut tx, store_id, &input, true).await?;
            summary.products += 1;
        }

        for customer in &data.customers {
            CustomerRepository::insert(&mut tx, store_id, customer, true).await?;
            summary.customers += 1;
        }

        for ad in &data.ads {
            AdRepository::insert_demo(
                &mut tx,
                store_id,
                &ad.title,
                ad.image_url.as_deref(),
                ad.link_url.as_deref(),
            )
            .await?;
            summary.ads += 1;
        }

        StoreRepository::set_environment(&mut tx, store_id, StoreEnvironment::Demo).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            store_id = %store_id,
            products = summary.products,
            customers = summary.customers,
            "Demo data seeded"
        );
        Ok(summary)
    }

    /// Wipe transactional and demo data and switch the store to `production`.
    ///
    /// # Errors
    ///
    /// Returns not found for an unknown store or a database error. Nothing
    /// is removed on error.
    #[instrument(skip(self))]
    pub async fn promote(&self, store_id: StoreId) -> Result<PromoteSummary, AppError> {
        StoreRepository::new(self.pool).get(store_id).await?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let sales_removed = StoreRepository::purge_transactions(&mut tx, store_id).await?;
        let orphaned_objects = StoreRepository::demo_image_keys(&mut tx, store_id).await?;
        let demo_rows_removed = StoreRepository::purge_demo(&mut tx, store_id).await?;
        StoreRepository::set_environment(&mut tx, store_id, StoreEnvironment::Production)
            .await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            store_id = %store_id,
            sales_removed,
            demo_rows_removed,
            "Store promoted to production"
        );
        Ok(PromoteSummary {
            sales_removed,
            demo_rows_removed,
            orphaned_objects,
        })
    }
}

async fn insert_taxonomy(
    conn: &mut PgConnection,
    store_id: StoreId,
    kind: TaxonomyKind,
    entries: &[TaxonomyInput],
) -> Result<HashMap<String, i32>, AppError> {
    let mut ids = HashMap::with_capacity(entries.len());
    for input in entries {
        let entry = TaxonomyRepository::insert(&mut *conn, kind, store_id, input, true).await?;
        ids.insert(entry.name, entry.id);
    }
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use counterline_core::ProductStatus;

    use super::*;

    #[test]
    fn test_embedded_document_parses() {
        let data = DemoDataSet::embedded().unwrap();
        assert!(!data.products.is_empty());
        assert!(!data.units.is_empty());
        assert!(data.customers.iter().any(|c| c.phone.is_some()));
    }

    #[test]
    fn test_embedded_covers_statuses() {
        let data = DemoDataSet::embedded().unwrap();
        let has = |status| data.products.iter().any(|p| p.product.status == status);
        assert!(has(ProductStatus::Active));
        assert!(has(ProductStatus::Promotion));
        assert!(has(ProductStatus::Hidden));
        assert!(has(ProductStatus::Inactive));
    }

    #[test]
    fn test_unknown_family_rejected() {
        let yaml = r#"
families:
  - name: Coffee
products:
  - sku: X-1
    name: Thing
    price: "1.00"
    family: Tea
"#;
        let err = DemoDataSet::from_yaml(yaml).unwrap_err();
        assert!(err.contains("unknown family"));
    }

    #[test]
    fn test_invalid_product_rejected() {
        let yaml = r#"
products:
  - sku: X-1
    name: Thing
    price: "-1.00"
"#;
        assert!(DemoDataSet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_document() {
        let data = DemoDataSet::from_yaml("{}").unwrap();
        assert!(data.products.is_empty());
    }
}
