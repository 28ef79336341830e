//! Status enums for catalog, selling and store records.
//!
//! With the `postgres` feature each enum maps onto a Postgres enum type created
//! by the server migrations.

use serde::{Deserialize, Serialize};

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Promotion,
    /// Sellable at the register but never shown in the public catalog.
    Hidden,
}

impl ProductStatus {
    /// Whether the product appears in the public catalog.
    #[must_use]
    pub const fn is_listed(self) -> bool {
        matches!(self, Self::Active | Self::Promotion)
    }

    /// Whether adding the product to a sale needs the store PIN.
    #[must_use]
    pub const fn requires_pin_to_sell(self) -> bool {
        matches!(self, Self::Inactive)
    }
}

/// Lifecycle of a pending order (catalog cart or POS quote).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    /// Loaded onto a register.
    Processing,
    Processed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Cancelled | Self::Expired)
    }

    /// Whether a sale may still fulfil this order.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Processing | Self::Processed | Self::Cancelled | Self::Expired
            ) | (
                Self::Processing,
                Self::Pending | Self::Processed | Self::Cancelled
            )
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Whether a till session is accepting sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cash_session_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    MobilePayment,
    Other,
}

impl PaymentMethod {
    /// Only cash ends up in the drawer and can produce change.
    #[must_use]
    pub const fn is_cash(self) -> bool {
        matches!(self, Self::Cash)
    }

    /// Label printed on tickets and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Card => "Card",
            Self::Transfer => "Transfer",
            Self::MobilePayment => "Mobile payment",
            Self::Other => "Other",
        }
    }
}

/// Cash-session report flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Mid-session snapshot; the session stays open.
    X,
    /// Closing report; produced once the session is closed.
    Z,
}

/// Whether a store still holds demo data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store_environment", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StoreEnvironment {
    #[default]
    Demo,
    Production,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_statuses() {
        assert!(ProductStatus::Active.is_listed());
        assert!(ProductStatus::Promotion.is_listed());
        assert!(!ProductStatus::Inactive.is_listed());
        assert!(!ProductStatus::Hidden.is_listed());
    }

    #[test]
    fn test_only_inactive_needs_pin() {
        assert!(ProductStatus::Inactive.requires_pin_to_sell());
        assert!(!ProductStatus::Hidden.requires_pin_to_sell());
        assert!(!ProductStatus::Promotion.requires_pin_to_sell());
    }

    #[test]
    fn test_order_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Pending));
        assert!(Processing.can_transition_to(Processed));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Processing.can_transition_to(Expired));
        assert!(!Processed.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Processed,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
        ];
        for from in all.into_iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)), "{from}");
        }
    }

    #[test]
    fn test_payment_method_serde() {
        let json = serde_json::to_string(&PaymentMethod::MobilePayment).unwrap_or_default();
        assert_eq!(json, "\"mobile_payment\"");
    }

    #[test]
    fn test_report_kind_serde() {
        let json = serde_json::to_string(&ReportKind::Z).unwrap_or_default();
        assert_eq!(json, "\"z\"");
    }
}
