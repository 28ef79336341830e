//! Plain-text sale tickets for receipt printers and sharing.
//!
//! Layout is fixed-width: the store's ticket width (42 columns by default)
//! with labels left-aligned and amounts right-aligned.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use counterline_core::CurrencyCode;

use crate::models::settings::{MAX_TICKET_WIDTH, MIN_TICKET_WIDTH};
use crate::models::{Customer, Sale, StoreProfile};

struct TicketWriter {
    width: usize,
    out: String,
}

impl TicketWriter {
    fn new(width: usize) -> Self {
        Self {
            width: width.clamp(MIN_TICKET_WIDTH, MAX_TICKET_WIDTH),
            out: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text.trim_end());
        self.out.push('\n');
    }

    fn center(&mut self, text: &str) {
        for line in wrap(text, self.width) {
            let pad = self.width.saturating_sub(line.chars().count()) / 2;
            self.line(&format!("{}{line}", " ".repeat(pad)));
        }
    }

    fn wrapped(&mut self, text: &str) {
        for line in wrap(text, self.width) {
            self.line(&line);
        }
    }

    fn separator(&mut self) {
        let rule = "-".repeat(self.width);
        self.line(&rule);
    }

    /// Label on the left, value on the right; wraps the label when both do not fit.
    fn pair(&mut self, label: &str, value: &str) {
        let label_len = label.chars().count();
        let value_len = value.chars().count();
        if label_len + value_len < self.width {
            let gap = self.width - label_len - value_len;
            self.line(&format!("{label}{}{value}", " ".repeat(gap)));
            return;
        }
        for line in wrap(label, self.width.saturating_sub(value_len + 1).max(8)) {
            self.line(&line);
        }
        let pad = self.width.saturating_sub(value_len);
        self.line(&format!("{}{value}", " ".repeat(pad)));
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    for token in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(token);
            continue;
        }
        if line.chars().count() + 1 + token.chars().count() > width.max(8) {
            out.push(std::mem::take(&mut line));
            line.push_str(token);
        } else {
            line.push(' ');
            line.push_str(token);
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    out
}

fn quantity(q: Decimal) -> String {
    q.normalize().to_string()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Render a sale ticket.
#[must_use]
pub fn render_ticket(store: &StoreProfile, sale: &Sale, customer: Option<&Customer>) -> String {
    let currency: CurrencyCode = store.currency_code;
    let money = |amount: Decimal| currency.format(amount);
    let mut t = TicketWriter::new(store.ticket_width);

    t.center(&store.name);
    if let Some(legal) = store.legal_name.as_deref() {
        t.center(legal);
    }
    if let Some(tax_id) = store.tax_id.as_deref() {
        t.center(&format!("Tax ID {tax_id}"));
    }
    if let Some(address) = store.address.as_deref() {
        t.center(address);
    }
    if let Some(phone) = store.phone.as_deref() {
        t.center(phone);
    }
    t.separator();

    t.pair(&format!("Sale #{}", sale.id), &timestamp(sale.created_at));
    if let Some(customer) = customer {
        t.wrapped(&format!("Customer: {}", customer.name));
        if let Some(doc) = customer.document_id.as_deref() {
            t.wrapped(&format!("ID: {doc}"));
        }
    }
    t.separator();

    for item in &sale.items {
        t.wrapped(&item.product_name);
        let mut detail = format!("  {} x {}", quantity(item.quantity), money(item.unit_price));
        if item.wholesale {
            detail.push_str(" (wholesale)");
        }
        t.pair(&detail, &money(item.line_total));
    }
    t.separator();

    if sale.subtotal != sale.total {
        t.pair("Subtotal", &money(sale.subtotal));
    }
    t.pair("TOTAL", &money(sale.total));
    for payment in &sale.payments {
        let mut label = payment.method.label().to_string();
        if let Some(reference) = payment.reference.as_deref() {
            let _ = write!(label, " ({reference})");
        }
        t.pair(&label, &money(payment.amount));
    }
    if sale.change > Decimal::ZERO {
        t.pair("Change", &money(sale.change));
    }
    if sale.balance_due > Decimal::ZERO {
        t.pair("Balance due", &money(sale.balance_due));
        if let Some(due) = sale.credit_due_date {
            t.pair("Due date", &due.format("%Y-%m-%d").to_string());
        }
        if let Some(note) = sale.credit_note.as_deref() {
            t.wrapped(note);
        }
    }

    if let Some(footer) = store.ticket_footer.as_deref() {
        t.blank();
        t.center(footer);
    }
    t.out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use counterline_core::{
        CashSessionId, PaymentMethod, ProductId, SaleId, StoreEnvironment, StoreId,
    };

    use super::*;
    use crate::models::{SaleItem, SalePayment};

    fn store(width: usize) -> StoreProfile {
        StoreProfile {
            id: StoreId::new(1),
            name: "Corner Shop".to_string(),
            legal_name: None,
            tax_id: Some("J-123".to_string()),
            address: None,
            phone: None,
            email: None,
            currency_code: CurrencyCode::USD,
            environment: StoreEnvironment::Production,
            has_pin: true,
            ticket_width: width,
            ticket_footer: Some("Thank you!".to_string()),
            low_stock_threshold: Decimal::from(5),
            updated_at: Utc::now(),
        }
    }

    fn sale() -> Sale {
        Sale {
            id: SaleId::new(42),
            store_id: StoreId::new(1),
            cash_session_id: CashSessionId::new(3),
            customer_id: None,
            order_id: None,
            subtotal: Decimal::new(1250, 2),
            total: Decimal::new(1250, 2),
            paid: Decimal::new(2000, 2),
            change: Decimal::new(750, 2),
            balance_due: Decimal::ZERO,
            is_credit: false,
            credit_due_date: None,
            credit_note: None,
            items: vec![SaleItem {
                product_id: Some(ProductId::new(1)),
                product_name: "Coffee beans 500g".to_string(),
                quantity: Decimal::new(2500, 3),
                unit_price: Decimal::new(500, 2),
                wholesale: false,
                line_total: Decimal::new(1250, 2),
            }],
            payments: vec![SalePayment {
                method: PaymentMethod::Cash,
                amount: Decimal::new(2000, 2),
                reference: None,
            }],
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_lines_fit_width() {
        let ticket = render_ticket(&store(42), &sale(), None);
        assert!(ticket.lines().all(|l| l.chars().count() <= 42));
        assert!(ticket.contains("Sale #42"));
        assert!(ticket.contains("2.5 x $5.00"));
        assert!(ticket.contains("Change"));
        assert!(ticket.contains("Thank you!"));
    }

    #[test]
    fn test_total_right_aligned() {
        let ticket = render_ticket(&store(32), &sale(), None);
        let total = ticket.lines().find(|l| l.starts_with("TOTAL")).unwrap();
        assert_eq!(total.chars().count(), 32);
        assert!(total.ends_with("$12.50"));
    }

    #[test]
    fn test_credit_balance_printed() {
        let mut s = sale();
        s.paid = Decimal::new(500, 2);
        s.change = Decimal::ZERO;
        s.balance_due = Decimal::new(750, 2);
        s.is_credit = true;
        s.payments[0].amount = Decimal::new(500, 2);
        let ticket = render_ticket(&store(42), &s, None);
        assert!(ticket.contains("Balance due"));
        assert!(!ticket.contains("Change"));
    }

    #[test]
    fn test_width_is_clamped() {
        let ticket = render_ticket(&store(10), &sale(), None);
        assert!(ticket.lines().any(|l| l.chars().count() == MIN_TICKET_WIDTH));
    }

    #[test]
    fn test_wrap_long_words() {
        assert_eq!(wrap("a b c", 8), vec!["a b c"]);
        assert_eq!(wrap("", 10), Vec::<String>::new());
    }
}
