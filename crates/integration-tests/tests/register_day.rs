//! A register's day, run through the core rules in the order the server
//! applies them: open the till, settle sales, take an X report, close.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use counterline_core::cash::{CashSessionError, SessionLedger};
use counterline_core::checkout::{
    CartLine, CheckoutError, CreditTerms, CustomerSnapshot, PaymentInput, SaleDraft,
    SaleSettlement, validate_sale,
};
use counterline_core::{
    CashSessionId, CashSessionStatus, CustomerId, PaymentMethod, PhoneNumber, ProductId,
    ReportKind, SaleId,
};

const SESSION: CashSessionId = CashSessionId::new(11);

fn dec(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

fn line(product: i32, qty: i64, price: Decimal, stock: Option<i64>) -> CartLine {
    CartLine {
        product_id: ProductId::new(product),
        quantity: Decimal::from(qty),
        unit_price: price,
        tracked_stock: stock.map(Decimal::from),
    }
}

fn pay(method: PaymentMethod, amount: Decimal) -> PaymentInput {
    PaymentInput {
        method,
        amount,
        reference: None,
    }
}

fn settle(
    lines: &[CartLine],
    payments: &[PaymentInput],
    credit: Option<&CreditTerms>,
    customer: Option<&CustomerSnapshot>,
) -> Result<SaleSettlement, CheckoutError> {
    validate_sale(&SaleDraft {
        lines,
        payments,
        credit,
        customer,
        open_session: Some(SESSION),
        requested_session: Some(SESSION),
    })
}

#[test]
fn test_full_register_day() {
    let mut ledger = SessionLedger::open(dec(10000, 2)).unwrap();

    // Two coffees paid with a 10 note
    let coffee = settle(
        &[line(1, 2, dec(350, 2), Some(40))],
        &[pay(PaymentMethod::Cash, dec(1000, 2))],
        None,
        None,
    )
    .unwrap();
    assert_eq!(coffee.total, dec(700, 2));
    assert_eq!(coffee.change, dec(300, 2));
    ledger
        .record_sale(SaleId::new(1), &coffee.net_payments, coffee.balance_due)
        .unwrap();

    // Exact card payment on an untracked item
    let cake = settle(
        &[line(2, 1, dec(1225, 2), None)],
        &[pay(PaymentMethod::Card, dec(1225, 2))],
        None,
        None,
    )
    .unwrap();
    assert_eq!(cake.change, Decimal::ZERO);
    ledger
        .record_sale(SaleId::new(2), &cake.net_payments, cake.balance_due)
        .unwrap();

    // Part-paid credit sale for a registered customer
    let customer = CustomerSnapshot {
        id: CustomerId::new(3),
        phone: Some(PhoneNumber::parse("+58 412 555 0199").unwrap()),
    };
    let terms = CreditTerms::default();
    let beans = settle(
        &[line(3, 2, dec(1000, 2), Some(5))],
        &[pay(PaymentMethod::Cash, dec(500, 2))],
        Some(&terms),
        Some(&customer),
    )
    .unwrap();
    assert!(beans.is_credit);
    assert_eq!(beans.balance_due, dec(1500, 2));
    ledger
        .record_sale(SaleId::new(3), &beans.net_payments, beans.balance_due)
        .unwrap();

    let x = ledger.report(ReportKind::X).unwrap();
    assert_eq!(x.sales_count, 3);
    assert_eq!(x.transactions.get(PaymentMethod::Cash), dec(1200, 2));
    assert_eq!(x.transactions.get(PaymentMethod::Card), dec(1225, 2));
    assert_eq!(x.collected_total, dec(2425, 2));
    assert_eq!(x.credit_total, dec(1500, 2));
    assert_eq!(x.expected_cash, dec(11200, 2));
    assert_eq!(x.counted_cash, None);

    // Drawer is 50 cents short
    let z = ledger.close(dec(11150, 2)).unwrap();
    assert_eq!(z.kind, ReportKind::Z);
    assert_eq!(z.expected_cash, dec(11200, 2));
    assert_eq!(z.counted_cash, Some(dec(11150, 2)));
    assert_eq!(z.difference, Some(dec(-50, 2)));
    assert_eq!(ledger.status, CashSessionStatus::Closed);

    // The Z report is reproducible after close
    assert_eq!(ledger.report(ReportKind::Z).unwrap(), z);
}

#[test]
fn test_closed_session_rejects_sales_and_x_reports() {
    let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
    ledger.close(Decimal::ZERO).unwrap();

    let sale = settle(
        &[line(1, 1, dec(100, 2), None)],
        &[pay(PaymentMethod::Cash, dec(100, 2))],
        None,
        None,
    )
    .unwrap();

    assert_eq!(
        ledger.record_sale(SaleId::new(9), &sale.net_payments, sale.balance_due),
        Err(CashSessionError::SessionNotOpen)
    );
    assert_eq!(
        ledger.report(ReportKind::X),
        Err(CashSessionError::SessionNotOpen)
    );
}

#[test]
fn test_same_sale_recorded_once() {
    let mut ledger = SessionLedger::open(Decimal::ZERO).unwrap();
    let sale = settle(
        &[line(1, 1, dec(100, 2), None)],
        &[pay(PaymentMethod::Transfer, dec(100, 2))],
        None,
        None,
    )
    .unwrap();

    ledger
        .record_sale(SaleId::new(5), &sale.net_payments, sale.balance_due)
        .unwrap();
    assert_eq!(
        ledger.record_sale(SaleId::new(5), &sale.net_payments, sale.balance_due),
        Err(CashSessionError::SaleAlreadyRecorded(SaleId::new(5)))
    );
    assert_eq!(ledger.transactions.get(PaymentMethod::Transfer), dec(100, 2));
}

#[test]
fn test_no_sale_without_open_session() {
    let lines = [line(1, 1, dec(100, 2), None)];
    let payments = [pay(PaymentMethod::Cash, dec(100, 2))];
    let result = validate_sale(&SaleDraft {
        lines: &lines,
        payments: &payments,
        credit: None,
        customer: None,
        open_session: None,
        requested_session: None,
    });

    assert_eq!(result, Err(CheckoutError::NoOpenSession));
}

#[test]
fn test_stale_register_session_rejected() {
    let lines = [line(1, 1, dec(100, 2), None)];
    let payments = [pay(PaymentMethod::Cash, dec(100, 2))];
    let result = validate_sale(&SaleDraft {
        lines: &lines,
        payments: &payments,
        credit: None,
        customer: None,
        open_session: Some(SESSION),
        requested_session: Some(CashSessionId::new(10)),
    });

    assert_eq!(
        result,
        Err(CheckoutError::SessionMismatch {
            requested: CashSessionId::new(10),
            open: SESSION,
        })
    );
}

#[test]
fn test_repeated_lines_share_stock() {
    let result = settle(
        &[
            line(4, 3, dec(100, 2), Some(5)),
            line(4, 3, dec(100, 2), Some(5)),
        ],
        &[pay(PaymentMethod::Cash, dec(600, 2))],
        None,
        None,
    );

    assert_eq!(
        result,
        Err(CheckoutError::InsufficientStock {
            product_id: ProductId::new(4),
            requested: Decimal::from(6),
            available: Decimal::from(5),
        })
    );
}

#[test]
fn test_credit_needs_phone() {
    let customer = CustomerSnapshot {
        id: CustomerId::new(3),
        phone: None,
    };
    let terms = CreditTerms::default();
    let result = settle(
        &[line(1, 1, dec(1000, 2), None)],
        &[],
        Some(&terms),
        Some(&customer),
    );

    assert_eq!(result, Err(CheckoutError::CreditRequiresPhone));
}

#[test]
fn test_card_overpayment_rejected() {
    let result = settle(
        &[line(1, 1, dec(1000, 2), None)],
        &[pay(PaymentMethod::Card, dec(1200, 2))],
        None,
        None,
    );

    assert_eq!(result, Err(CheckoutError::Overpayment(dec(200, 2))));
}
