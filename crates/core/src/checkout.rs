//! Sale validation and settlement.
//!
//! [`validate_sale`] runs the register's business rules in a fixed order and
//! either returns the first violation or a [`SaleSettlement`] describing how
//! the sale was paid.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cash::PaymentTotals;
use crate::types::{
    CashSessionId, CustomerId, PaymentMethod, PhoneNumber, ProductId, checked_line_total,
    checked_sum_money, is_storable_money, is_storable_quantity, round_money,
};

/// Why a sale cannot be finalized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("the cart is empty")]
    EmptyCart,
    #[error("quantity for product {0} must be greater than zero")]
    InvalidQuantity(ProductId),
    #[error("quantity for product {0} is too large or has more than 3 decimal places")]
    QuantityOutOfRange(ProductId),
    #[error("unit price for product {0} cannot be negative")]
    NegativePrice(ProductId),
    #[error("no cash session is open for this register")]
    NoOpenSession,
    #[error("cash session {requested} is not the open session ({open})")]
    SessionMismatch {
        requested: CashSessionId,
        open: CashSessionId,
    },
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: Decimal,
        available: Decimal,
    },
    #[error("payment amounts must be greater than zero")]
    InvalidPayment,
    #[error("payment amounts must have at most 2 decimal places and fit the register's limits")]
    PaymentOutOfRange,
    #[error("the sale amounts are too large to record")]
    AmountOutOfRange,
    #[error("a balance of {0} is unpaid; mark the sale as credit to continue")]
    UnpaidBalance(Decimal),
    #[error("credit sales require a registered customer")]
    CreditRequiresCustomer,
    #[error("credit sales require a customer with a phone number")]
    CreditRequiresPhone,
    #[error("payments exceed the total by {0}, which is more than the cash tendered")]
    Overpayment(Decimal),
}

/// One priced line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Available stock when the product tracks inventory; `None` otherwise.
    pub tracked_stock: Option<Decimal>,
}

impl CartLine {
    /// `quantity * unit_price`, rounded.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AmountOutOfRange`] when the total overflows or
    /// does not fit a money column.
    pub fn line_total(&self) -> Result<Decimal, CheckoutError> {
        checked_line_total(self.quantity, self.unit_price).ok_or(CheckoutError::AmountOutOfRange)
    }
}

/// A tendered payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Terms recorded when part of a sale is left on credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTerms {
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

/// The customer attached to a sale, as far as the rules care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub id: CustomerId,
    pub phone: Option<PhoneNumber>,
}

/// Everything needed to decide whether a sale can be finalized.
#[derive(Debug, Clone, Copy)]
pub struct SaleDraft<'a> {
    pub lines: &'a [CartLine],
    pub payments: &'a [PaymentInput],
    pub credit: Option<&'a CreditTerms>,
    pub customer: Option<&'a CustomerSnapshot>,
    /// The open session for the store/series, if any.
    pub open_session: Option<CashSessionId>,
    /// The session the register believes it is using, if it sent one.
    pub requested_session: Option<CashSessionId>,
}

/// Outcome of a valid sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSettlement {
    pub session_id: CashSessionId,
    /// Rounded total of each cart line, in cart order.
    pub line_totals: Vec<Decimal>,
    pub subtotal: Decimal,
    pub total: Decimal,
    /// Sum of tendered payments before change.
    pub paid: Decimal,
    pub change: Decimal,
    pub balance_due: Decimal,
    pub is_credit: bool,
    /// Per-method amounts kept by the store (cash net of change).
    pub net_payments: PaymentTotals,
}

/// Validate a sale and compute its settlement.
///
/// Checks run in this order and the first failure is returned:
/// cart contents, open session, stock, payment amounts, totals, unpaid
/// balance and credit requirements, overpayment.
///
/// Quantities and payments with more precision than their columns, or too
/// large to store, are rejected rather than rounded.
///
/// # Errors
///
/// Returns the first [`CheckoutError`] encountered.
pub fn validate_sale(draft: &SaleDraft<'_>) -> Result<SaleSettlement, CheckoutError> {
    if draft.lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    for line in draft.lines {
        if line.quantity <= Decimal::ZERO {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }
        if !is_storable_quantity(line.quantity) {
            return Err(CheckoutError::QuantityOutOfRange(line.product_id));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(CheckoutError::NegativePrice(line.product_id));
        }
    }

    let session_id = match (draft.open_session, draft.requested_session) {
        (None, _) => return Err(CheckoutError::NoOpenSession),
        (Some(open), Some(requested)) if open != requested => {
            return Err(CheckoutError::SessionMismatch { requested, open });
        }
        (Some(open), _) => open,
    };

    check_stock(draft.lines)?;

    if draft.payments.iter().any(|p| p.amount <= Decimal::ZERO) {
        return Err(CheckoutError::InvalidPayment);
    }
    if draft.payments.iter().any(|p| !is_storable_money(p.amount)) {
        return Err(CheckoutError::PaymentOutOfRange);
    }

    let line_totals = draft
        .lines
        .iter()
        .map(CartLine::line_total)
        .collect::<Result<Vec<_>, _>>()?;
    let subtotal = checked_sum_money(line_totals.iter().copied())
        .ok_or(CheckoutError::AmountOutOfRange)?;
    let total = subtotal;
    let paid = checked_sum_money(draft.payments.iter().map(|p| p.amount))
        .ok_or(CheckoutError::AmountOutOfRange)?;
    let cash_tendered = checked_sum_money(
        draft
            .payments
            .iter()
            .filter(|p| p.method.is_cash())
            .map(|p| p.amount),
    )
    .ok_or(CheckoutError::AmountOutOfRange)?;

    let balance_due = if paid < total {
        round_money(total - paid)
    } else {
        Decimal::ZERO
    };

    if balance_due > Decimal::ZERO {
        if draft.credit.is_none() {
            return Err(CheckoutError::UnpaidBalance(balance_due));
        }
        let customer = draft.customer.ok_or(CheckoutError::CreditRequiresCustomer)?;
        if customer.phone.is_none() {
            return Err(CheckoutError::CreditRequiresPhone);
        }
    }

    let change = if paid > total {
        let excess = round_money(paid - total);
        if excess > cash_tendered {
            return Err(CheckoutError::Overpayment(excess));
        }
        excess
    } else {
        Decimal::ZERO
    };

    let mut net_payments: PaymentTotals = draft
        .payments
        .iter()
        .map(|p| (p.method, p.amount))
        .collect();
    if change > Decimal::ZERO {
        net_payments.add(PaymentMethod::Cash, -change);
    }

    Ok(SaleSettlement {
        session_id,
        line_totals,
        subtotal,
        total,
        paid,
        change,
        balance_due,
        is_credit: balance_due > Decimal::ZERO,
        net_payments,
    })
}

/// Stock check over stock-tracked lines, summing repeated products.
fn check_stock(lines: &[CartLine]) -> Result<(), CheckoutError> {
    let mut requested: BTreeMap<ProductId, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        if let Some(available) = line.tracked_stock {
            let entry = requested
                .entry(line.product_id)
                .or_insert((Decimal::ZERO, available));
            entry.0 = entry.0.saturating_add(line.quantity);
        }
    }
    for (product_id, (qty, available)) in requested {
        if qty > available {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                requested: qty,
                available,
            });
        }
    }
    Ok(())
}
