//! Finalized sales.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use counterline_core::checkout::{CreditTerms, PaymentInput};
use counterline_core::{
    CashSessionId, CustomerId, OrderId, PaymentMethod, ProductId, SaleId, StoreId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub store_id: StoreId,
    pub cash_session_id: CashSessionId,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub change: Decimal,
    pub balance_due: Decimal,
    pub is_credit: bool,
    pub credit_due_date: Option<NaiveDate>,
    pub credit_note: Option<String>,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub wholesale: bool,
    pub line_total: Decimal,
}

/// A tendered payment as recorded (cash before change).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalePayment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: Option<String>,
}

/// Sale submitted by the register.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    /// Till the sale is rung up on; `None` is the store's default till.
    #[serde(default)]
    pub series: Option<String>,
    /// Session the register believes is open; checked against the real one.
    #[serde(default)]
    pub cash_session_id: Option<CashSessionId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Pending order loaded onto the register, if any.
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub lines: Vec<NewSaleLine>,
    #[serde(default)]
    pub payments: Vec<PaymentInput>,
    #[serde(default)]
    pub credit: Option<CreditTerms>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSaleLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Sell at the product's wholesale price (PIN required).
    #[serde(default)]
    pub wholesale: bool,
}

/// Query filter for the sales list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub session_id: Option<CashSessionId>,
    pub customer_id: Option<CustomerId>,
    /// Only sales with an outstanding balance
    #[serde(default)]
    pub credit_only: bool,
    pub limit: Option<i64>,
}
