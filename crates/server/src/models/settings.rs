//! Store profile, exchange rates, taxonomy and catalog ads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use counterline_core::{AdId, CurrencyCode, CurrencyRateId, Email, StoreEnvironment, StoreId};

/// Store profile and settings as shown on the settings screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub id: StoreId,
    pub name: String,
    pub legal_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub currency_code: CurrencyCode,
    pub environment: StoreEnvironment,
    /// Never the hash itself.
    pub has_pin: bool,
    pub ticket_width: usize,
    pub ticket_footer: Option<String>,
    pub low_stock_threshold: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreProfileUpdate {
    pub name: String,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub currency_code: CurrencyCode,
    #[serde(default = "default_ticket_width")]
    pub ticket_width: usize,
    #[serde(default)]
    pub ticket_footer: Option<String>,
    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: Decimal,
}

/// Receipt printers are typically 42 columns wide.
pub const DEFAULT_TICKET_WIDTH: usize = 42;
pub const MIN_TICKET_WIDTH: usize = 24;
pub const MAX_TICKET_WIDTH: usize = 80;

const fn default_ticket_width() -> usize {
    DEFAULT_TICKET_WIDTH
}

fn default_low_stock() -> Decimal {
    Decimal::from(5)
}

impl StoreProfileUpdate {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if !(MIN_TICKET_WIDTH..=MAX_TICKET_WIDTH).contains(&self.ticket_width) {
            return Err(format!(
                "ticket_width must be between {MIN_TICKET_WIDTH} and {MAX_TICKET_WIDTH}"
            ));
        }
        if self.low_stock_threshold < Decimal::ZERO {
            return Err("low_stock_threshold cannot be negative".to_string());
        }
        Ok(())
    }
}

/// A recorded exchange rate: one unit of the store currency in `currency_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub id: CurrencyRateId,
    pub store_id: StoreId,
    pub currency_code: CurrencyCode,
    pub rate: Decimal,
    pub effective_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCurrencyRate {
    pub currency_code: CurrencyCode,
    pub rate: Decimal,
    /// Defaults to now.
    #[serde(default)]
    pub effective_at: Option<DateTime<Utc>>,
}

impl NewCurrencyRate {
    /// # Errors
    ///
    /// Returns a message if the rate is not positive.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate <= Decimal::ZERO {
            return Err("rate must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Query for the latest rate of one currency.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestRateQuery {
    pub currency: CurrencyCode,
}

/// The three flat product taxonomies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Unit,
    Family,
    Warehouse,
}

impl TaxonomyKind {
    pub const ALL: [Self; 3] = [Self::Unit, Self::Family, Self::Warehouse];

    /// Backing table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Unit => "units",
            Self::Family => "families",
            Self::Warehouse => "warehouses",
        }
    }

    /// Column on `products` that references this taxonomy.
    #[must_use]
    pub const fn product_column(self) -> &'static str {
        match self {
            Self::Unit => "unit_id",
            Self::Family => "family_id",
            Self::Warehouse => "warehouse_id",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Family => "family",
            Self::Warehouse => "warehouse",
        }
    }
}

/// A unit, family or warehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub id: i32,
    pub kind: TaxonomyKind,
    pub store_id: StoreId,
    pub name: String,
    pub description: Option<String>,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaxonomyInput {
    /// # Errors
    ///
    /// Returns a message if the name is blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }
}

/// A catalog banner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: AdId,
    pub store_id: StoreId,
    pub title: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub active: bool,
    pub views: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_tables() {
        let tables: Vec<_> = TaxonomyKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(tables, ["units", "families", "warehouses"]);
    }

    #[test]
    fn test_profile_update_defaults() {
        let update: StoreProfileUpdate =
            serde_json::from_str(r#"{"name": "Corner Shop"}"#).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(update.ticket_width, DEFAULT_TICKET_WIDTH);
        assert_eq!(update.currency_code, CurrencyCode::USD);
        assert_eq!(update.low_stock_threshold, Decimal::from(5));
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_profile_update_width_bounds() {
        let update: StoreProfileUpdate =
            serde_json::from_str(r#"{"name": "Corner Shop", "ticket_width": 120}"#)
                .unwrap_or_else(|e| panic!("{e}"));
        assert!(update.validate().unwrap_err().contains("ticket_width"));
    }

    #[test]
    fn test_rate_must_be_positive() {
        let rate = NewCurrencyRate {
            currency_code: CurrencyCode::USD,
            rate: Decimal::ZERO,
            effective_at: None,
        };
        assert!(rate.validate().is_err());
    }
}
