//! Cash-session (till) ledger.
//!
//! A session moves through `open -> closed`. While open, each finalized sale is
//! appended once and its payments are added to per-method running totals. At
//! close the counted drawer is compared with the calculated cash:
//!
//! ```text
//! calculated = opening_balance + net cash taken
//! difference = counted - calculated
//! ```
//!
//! An X report is a snapshot of an open session; a Z report is only produced
//! once the session has been closed.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    CashSessionStatus, PaymentMethod, ReportKind, SaleId, is_storable_money, round_money,
};

/// Errors raised by cash-session rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CashSessionError {
    #[error("opening balance must be zero or greater")]
    NegativeOpeningBalance,
    #[error("counted cash must be zero or greater")]
    NegativeCountedCash,
    #[error("amount has more than 2 decimal places or is too large to record")]
    AmountOutOfRange,
    #[error("cash session is not open")]
    SessionNotOpen,
    #[error("a Z report requires a closed session")]
    SessionStillOpen,
    #[error("sale {0} is already recorded in this session")]
    SaleAlreadyRecorded(SaleId),
}

/// Running totals keyed by payment method.
///
/// Serialises as a JSON object, e.g. `{"cash": "12.50", "card": "40.00"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentTotals(BTreeMap<PaymentMethod, Decimal>);

impl PaymentTotals {
    /// Empty totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `method`'s total.
    pub fn add(&mut self, method: PaymentMethod, amount: Decimal) {
        let entry = self.0.entry(method).or_insert(Decimal::ZERO);
        *entry = round_money(*entry + amount);
    }

    /// Add every total from `other`.
    pub fn merge(&mut self, other: &Self) {
        for (method, amount) in other.iter() {
            self.add(method, amount);
        }
    }

    /// Total for one method (zero when absent).
    #[must_use]
    pub fn get(&self, method: PaymentMethod) -> Decimal {
        self.0.get(&method).copied().unwrap_or(Decimal::ZERO)
    }

    /// Cash total.
    #[must_use]
    pub fn cash(&self) -> Decimal {
        self.get(PaymentMethod::Cash)
    }

    /// Sum across all methods.
    #[must_use]
    pub fn sum(&self) -> Decimal {
        round_money(self.0.values().copied().sum())
    }

    /// Iterate `(method, amount)` in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (PaymentMethod, Decimal)> + '_ {
        self.0.iter().map(|(m, a)| (*m, *a))
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PaymentMethod, Decimal)> for PaymentTotals {
    fn from_iter<T: IntoIterator<Item = (PaymentMethod, Decimal)>>(iter: T) -> Self {
        let mut totals = Self::new();
        for (method, amount) in iter {
            totals.add(method, amount);
        }
        totals
    }
}

/// Reject negative or unstorable opening floats.
///
/// # Errors
///
/// Returns [`CashSessionError::NegativeOpeningBalance`] when `amount < 0`, or
/// [`CashSessionError::AmountOutOfRange`] when it does not fit a money column.
pub fn validate_opening_balance(amount: Decimal) -> Result<Decimal, CashSessionError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(CashSessionError::NegativeOpeningBalance);
    }
    if !is_storable_money(amount) {
        return Err(CashSessionError::AmountOutOfRange);
    }
    Ok(round_money(amount))
}

/// In-memory mirror of a cash-session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLedger {
    pub opening_balance: Decimal,
    pub transactions: PaymentTotals,
    pub sale_ids: Vec<SaleId>,
    /// Sum of balances left unpaid by credit sales.
    pub credit_total: Decimal,
    pub status: CashSessionStatus,
    pub counted_cash: Option<Decimal>,
    pub calculated_cash: Option<Decimal>,
    pub difference: Option<Decimal>,
}

impl SessionLedger {
    /// Start a new open session.
    ///
    /// # Errors
    ///
    /// Returns an error if the opening balance is negative.
    pub fn open(opening_balance: Decimal) -> Result<Self, CashSessionError> {
        Ok(Self {
            opening_balance: validate_opening_balance(opening_balance)?,
            transactions: PaymentTotals::new(),
            sale_ids: Vec::new(),
            credit_total: Decimal::ZERO,
            status: CashSessionStatus::Open,
            counted_cash: None,
            calculated_cash: None,
            difference: None,
        })
    }

    /// Whether the session accepts sales.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == CashSessionStatus::Open
    }

    /// Append a finalized sale.
    ///
    /// `payments` are net amounts per method (cash already reduced by change)
    /// and `balance_due` is what the customer still owes on credit.
    ///
    /// # Errors
    ///
    /// Fails if the session is closed or the sale was already recorded.
    pub fn record_sale(
        &mut self,
        sale_id: SaleId,
        payments: &PaymentTotals,
        balance_due: Decimal,
    ) -> Result<(), CashSessionError> {
        if !self.is_open() {
            return Err(CashSessionError::SessionNotOpen);
        }
        if self.sale_ids.contains(&sale_id) {
            return Err(CashSessionError::SaleAlreadyRecorded(sale_id));
        }
        self.sale_ids.push(sale_id);
        self.transactions.merge(payments);
        self.credit_total = round_money(self.credit_total + balance_due);
        Ok(())
    }

    /// Cash that should be in the drawer right now.
    #[must_use]
    pub fn expected_cash(&self) -> Decimal {
        round_money(self.opening_balance + self.transactions.cash())
    }

    /// Close the session against a counted drawer and return the Z report.
    ///
    /// # Errors
    ///
    /// Fails if the session is not open or the count is negative or too
    /// large to record.
    pub fn close(&mut self, counted_cash: Decimal) -> Result<SessionReport, CashSessionError> {
        if !self.is_open() {
            return Err(CashSessionError::SessionNotOpen);
        }
        if counted_cash.is_sign_negative() && !counted_cash.is_zero() {
            return Err(CashSessionError::NegativeCountedCash);
        }
        if !is_storable_money(counted_cash) {
            return Err(CashSessionError::AmountOutOfRange);
        }
        let counted = round_money(counted_cash);
        let calculated = self.expected_cash();
        self.counted_cash = Some(counted);
        self.calculated_cash = Some(calculated);
        self.difference = Some(round_money(counted - calculated));
        self.status = CashSessionStatus::Closed;
        self.report(ReportKind::Z)
    }

    /// Build an X (open) or Z (closed) report.
    ///
    /// # Errors
    ///
    /// X on a closed session and Z on an open session are rejected.
    pub fn report(&self, kind: ReportKind) -> Result<SessionReport, CashSessionError> {
        match (kind, self.status) {
            (ReportKind::X, CashSessionStatus::Closed) => {
                return Err(CashSessionError::SessionNotOpen);
            }
            (ReportKind::Z, CashSessionStatus::Open) => {
                return Err(CashSessionError::SessionStillOpen);
            }
            _ => {}
        }
        Ok(SessionReport {
            kind,
            opening_balance: self.opening_balance,
            transactions: self.transactions.clone(),
            sales_count: self.sale_ids.len(),
            collected_total: self.transactions.sum(),
            credit_total: self.credit_total,
            expected_cash: self.calculated_cash.unwrap_or_else(|| self.expected_cash()),
            counted_cash: self.counted_cash,
            difference: self.difference,
        })
    }
}

/// Figures shown on an X or Z report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub kind: ReportKind,
    pub opening_balance: Decimal,
    pub transactions: PaymentTotals,
    pub sales_count: usize,
    /// Money actually taken, all methods.
    pub collected_total: Decimal,
    pub credit_total: Decimal,
    pub expected_cash: Decimal,
    pub counted_cash: Option<Decimal>,
    pub difference: Option<Decimal>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    fn cash_and_card(cash: Decimal, card: Decimal) -> PaymentTotals {
        [(PaymentMethod::Cash, cash), (PaymentMethod::Card, card)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_open_rejects_negative_float() {
        assert_eq!(
            SessionLedger::open(dec(-1, 2)),
            Err(CashSessionError::NegativeOpeningBalance)
        );
        assert!(SessionLedger::open(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_record_sale_accumulates_per_method() {
        let mut ledger = SessionLedger::open(dec(100, 0)).unwrap();
        ledger
            .record_sale(SaleId::new(1), &cash_and_card(dec(20, 0), dec(5, 0)), Decimal::ZERO)
            .unwrap();
        ledger
            .record_sale(SaleId::new(2), &cash_and_card(dec(1050, 2), Decimal::ZERO), dec(3, 0))
            .unwrap();

        assert_eq!(ledger.transactions.cash(), dec(3050, 2));
        assert_eq!(ledger.transactions.get(PaymentMethod::Card), dec(5, 0));
        assert_eq!(ledger.credit_total, dec(3, 0));
        assert_eq!(ledger.sale_ids, vec![SaleId::new(1), SaleId::new(2)]);
        assert_eq!(ledger.expected_cash(), dec(13050, 2));
    }

    #[test]
    fn test_record_same_sale_twice_fails() {
        let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
        let payments = cash_and_card(dec(1, 0), Decimal::ZERO);
        ledger.record_sale(SaleId::new(7), &payments, Decimal::ZERO).unwrap();
        assert_eq!(
            ledger.record_sale(SaleId::new(7), &payments, Decimal::ZERO),
            Err(CashSessionError::SaleAlreadyRecorded(SaleId::new(7)))
        );
        assert_eq!(ledger.transactions.cash(), dec(1, 0));
    }

    #[test]
    fn test_close_computes_difference() {
        let mut ledger = SessionLedger::open(dec(50, 0)).unwrap();
        ledger
            .record_sale(SaleId::new(1), &cash_and_card(dec(25, 0), dec(10, 0)), Decimal::ZERO)
            .unwrap();

        let report = ledger.close(dec(7350, 2)).unwrap();
        assert_eq!(report.kind, ReportKind::Z);
        assert_eq!(report.expected_cash, dec(75, 0));
        assert_eq!(report.counted_cash, Some(dec(7350, 2)));
        assert_eq!(report.difference, Some(dec(-150, 2)));
        assert_eq!(report.collected_total, dec(35, 0));
        assert_eq!(ledger.status, CashSessionStatus::Closed);
    }

    #[test]
    fn test_closed_session_rejects_sales_and_second_close() {
        let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
        ledger.close(Decimal::ZERO).unwrap();
        assert_eq!(
            ledger.record_sale(SaleId::new(1), &PaymentTotals::new(), Decimal::ZERO),
            Err(CashSessionError::SessionNotOpen)
        );
        assert_eq!(ledger.close(Decimal::ZERO), Err(CashSessionError::SessionNotOpen));
    }

    #[test]
    fn test_negative_count_rejected_and_session_stays_open() {
        let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
        assert_eq!(
            ledger.close(dec(-5, 0)),
            Err(CashSessionError::NegativeCountedCash)
        );
        assert!(ledger.is_open());
    }

    #[test]
    fn test_unstorable_amounts_rejected() {
        assert_eq!(
            SessionLedger::open(Decimal::MAX),
            Err(CashSessionError::AmountOutOfRange)
        );
        assert_eq!(
            SessionLedger::open(dec(1_005, 3)),
            Err(CashSessionError::AmountOutOfRange)
        );

        let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
        assert_eq!(
            ledger.close(Decimal::MAX),
            Err(CashSessionError::AmountOutOfRange)
        );
        assert!(ledger.is_open());
    }

    #[test]
    fn test_x_report_does_not_close() {
        let mut ledger = SessionLedger::open(dec(10, 0)).unwrap();
        ledger
            .record_sale(SaleId::new(1), &cash_and_card(dec(5, 0), Decimal::ZERO), Decimal::ZERO)
            .unwrap();

        let x = ledger.report(ReportKind::X).unwrap();
        assert_eq!(x.expected_cash, dec(15, 0));
        assert_eq!(x.counted_cash, None);
        assert!(ledger.is_open());
        assert_eq!(ledger.report(ReportKind::Z), Err(CashSessionError::SessionStillOpen));
    }

    #[test]
    fn test_payment_totals_serialize_as_object() {
        let totals = cash_and_card(dec(125, 1), Decimal::ZERO);
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json["cash"], "12.5");
        assert_eq!(json["card"], "0");
    }
}
