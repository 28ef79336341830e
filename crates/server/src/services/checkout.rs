//! Sale finalization.
//!
//! One transaction covers the whole sale:
//!
//! 1. Lock the products on the cart and price each line (retail or wholesale)
//! 2. Check the PIN when a line is wholesale or the product is inactive
//! 3. Lock the till's open session
//! 4. Run the checkout rules (`counterline_core::checkout::validate_sale`),
//!    which also bound quantities and amounts to what the columns can hold
//! 5. Write the sale, its lines and payments; decrement tracked stock
//! 6. Append the sale to the session ledger
//! 7. Mark the linked pending order processed (explicit, or best match)
//!
//! Any failure rolls everything back.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, instrument};

use counterline_core::checkout::{
    CartLine, CheckoutError, CustomerSnapshot, SaleDraft, validate_sale,
};
use counterline_core::matching::find_matching_order;
use counterline_core::{OrderId, ProductId, StoreId};

use crate::db::sales::SaleRecord;
use crate::db::{
    CashSessionRepository, CustomerRepository, OrderRepository, ProductRepository,
    RepositoryError, SaleRepository,
};
use crate::error::{AppError, add_breadcrumb};
use crate::models::{NewSale, Product, Sale, SaleItem, SalePayment, normalize_series};
use crate::services::pin::PinService;
use crate::state::AppState;

/// Checkout service.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Finalize a sale.
    ///
    /// # Errors
    ///
    /// Returns the first checkout rule violated, a PIN rejection, or a
    /// database error. Nothing is written on error.
    #[instrument(skip(self, sale, pin), fields(lines = sale.lines.len()))]
    pub async fn finalize(
        &self,
        store_id: StoreId,
        sale: NewSale,
        pin: Option<&str>,
    ) -> Result<Sale, AppError> {
        let pool = self.state.pool();
        let series = normalize_series(sale.series.clone());

        let customer = match sale.customer_id {
            Some(id) => Some(
                CustomerRepository::new(pool)
                    .get(store_id, id)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::NotFound => {
                            AppError::Validation(format!("customer {id} does not exist"))
                        }
                        other => other.into(),
                    })?,
            ),
            None => None,
        };

        let mut tx = pool.begin().await.map_err(RepositoryError::from)?;

        // Products, locked so stock checks hold until commit
        let mut ids: Vec<ProductId> = sale.lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products: HashMap<ProductId, Product> =
            ProductRepository::lock(&mut tx, store_id, &ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();

        let mut needs_pin = false;
        let mut cart = Vec::with_capacity(sale.lines.len());
        let mut described = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            let product = products.get(&line.product_id).ok_or_else(|| {
                AppError::Validation(format!("product {} does not exist", line.product_id))
            })?;
            let unit_price = if line.wholesale {
                needs_pin = true;
                product.wholesale_price.ok_or_else(|| {
                    AppError::Validation(format!("{} has no wholesale price", product.name))
                })?
            } else {
                product.price
            };
            if product.status.requires_pin_to_sell() {
                needs_pin = true;
            }

            cart.push(CartLine {
                product_id: product.id,
                quantity: line.quantity,
                unit_price,
                tracked_stock: product.tracked_stock(),
            });
            described.push((product.name.clone(), line.wholesale));
        }

        if needs_pin {
            PinService::new(pool, self.state.pin_attempts())
                .verify(store_id, pin)
                .await?;
        }

        let session =
            CashSessionRepository::lock_open(&mut tx, store_id, series.as_deref()).await?;

        let snapshot = customer.as_ref().map(|c| CustomerSnapshot {
            id: c.id,
            phone: c.phone.clone(),
        });
        let settlement = validate_sale(&SaleDraft {
            lines: &cart,
            payments: &sale.payments,
            credit: sale.credit.as_ref(),
            customer: snapshot.as_ref(),
            open_session: session.as_ref().map(|s| s.id),
            requested_session: sale.cash_session_id,
        })?;
        // validate_sale only succeeds with an open session
        let Some(mut session) = session else {
            return Err(CheckoutError::NoOpenSession.into());
        };

        let order_id = self
            .resolve_order(&mut tx, store_id, sale.order_id, &ids)
            .await?;

        let items: Vec<SaleItem> = cart
            .iter()
            .zip(described)
            .zip(&settlement.line_totals)
            .map(|((line, (product_name, wholesale)), &line_total)| SaleItem {
                product_id: Some(line.product_id),
                product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                wholesale,
                line_total,
            })
            .collect();

        let payments: Vec<SalePayment> = sale
            .payments
            .iter()
            .map(|p| SalePayment {
                method: p.method,
                amount: p.amount,
                reference: p.reference.clone(),
            })
            .collect();
        let credit = sale.credit.as_ref().filter(|_| settlement.is_credit);
        let record = SaleRecord {
            settlement: &settlement,
            customer_id: customer.as_ref().map(|c| c.id),
            order_id,
            credit_due_date: credit.and_then(|c| c.due_date),
            credit_note: credit.and_then(|c| c.note.as_deref()),
            items: &items,
            payments: &payments,
        };
        let created = SaleRepository::insert(&mut tx, store_id, &record).await?;

        for line in &cart {
            if line.tracked_stock.is_some() {
                ProductRepository::decrement_stock(&mut tx, line.product_id, line.quantity).await?;
            }
        }

        session
            .ledger
            .record_sale(created.id, &settlement.net_payments, settlement.balance_due)?;
        CashSessionRepository::save_ledger(&mut tx, session.id, &session.ledger, None).await?;

        if let Some(order_id) = order_id {
            OrderRepository::mark_processed(&mut tx, order_id, created.id).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        self.state.catalog().invalidate(store_id).await;

        let sale_id = created.id.to_string();
        add_breadcrumb("checkout", "Sale finalized", Some(&[("sale_id", sale_id.as_str())]));
        info!(
            sale_id = %created.id,
            session_id = %session.id,
            total = %created.total,
            balance_due = %created.balance_due,
            order_id = ?order_id,
            "Sale finalized"
        );
        Ok(created)
    }

    /// The pending order this sale fulfils.
    ///
    /// An order loaded onto the register is used as-is (it must still be
    /// open). Otherwise the newest recent open order sharing enough products
    /// with the sale is picked, if any.
    async fn resolve_order(
        &self,
        conn: &mut sqlx::PgConnection,
        store_id: StoreId,
        explicit: Option<OrderId>,
        sold: &[ProductId],
    ) -> Result<Option<OrderId>, AppError> {
        if let Some(id) = explicit {
            let order = OrderRepository::lock(&mut *conn, store_id, id)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => {
                        AppError::Validation(format!("order {id} does not exist"))
                    }
                    other => other.into(),
                })?;
            if !order.status.is_open() {
                return Err(AppError::Conflict(format!(
                    "order {id} is already {}",
                    order.status
                )));
            }
            return Ok(Some(id));
        }

        let since = Utc::now() - self.state.config().orders.match_window;
        let candidates = OrderRepository::candidates(&mut *conn, store_id, since).await?;
        let Some(id) = find_matching_order(sold, &candidates) else {
            return Ok(None);
        };
        // Re-check under lock; another register may have just taken it
        let order = OrderRepository::lock(&mut *conn, store_id, id).await?;
        Ok(order.status.is_open().then_some(id))
    }
}
