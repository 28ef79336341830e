//! Demo data and promotion.
//!
//! `seed` loads the embedded demo catalog (or a YAML file with the same
//! shape) into a store that has not gone live. `promote` wipes demo rows and
//! every transaction, then flips the store to production.

use std::path::Path;

use counterline_core::StoreId;
use counterline_server::services::{DemoDataService, DemoDataSet};

use super::{CliError, connect};

/// Seed demo data into a store.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the store is
/// already in production, or a database operation fails.
pub async fn seed(store_id: StoreId, file: Option<&Path>) -> Result<(), CliError> {
    let data = match file {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
            DemoDataSet::from_yaml(&content)
        }
        None => DemoDataSet::embedded(),
    }
    .map_err(CliError::DemoData)?;

    let pool = connect().await?;
    let summary = DemoDataService::new(&pool).seed(store_id, &data).await?;

    tracing::info!(
        store_id = %store_id,
        taxonomy = summary.taxonomy,
        products = summary.products,
        customers = summary.customers,
        ads = summary.ads,
        "Demo data loaded"
    );
    Ok(())
}

/// Promote a store to production.
///
/// Image objects of removed demo products are listed in the log; the object
/// store is not reachable from the CLI.
///
/// # Errors
///
/// Returns `NotConfirmed` unless `confirmed`, or a database error.
pub async fn promote(store_id: StoreId, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        tracing::warn!(
            store_id = %store_id,
            "Promotion deletes all sales, orders and cash sessions of this store"
        );
        return Err(CliError::NotConfirmed);
    }

    let pool = connect().await?;
    let summary = DemoDataService::new(&pool).promote(store_id).await?;

    tracing::info!(
        store_id = %store_id,
        sales_removed = summary.sales_removed,
        demo_rows_removed = summary.demo_rows_removed,
        "Store promoted to production"
    );
    for key in &summary.orphaned_objects {
        tracing::warn!(key = %key, "Orphaned image object, delete it from the object store");
    }
    Ok(())
}
