//! Sales orders: goods ordered for a customer, reserved at order time and
//! collected once received.
//!
//! ## State Machine
//! ```text
//!   Draft ─submit─► Pending ─mark_ordered─► Ordered ─receive─► PartiallyReceived
//!     │               │                       │                     │ receive
//!     └───────────────┴───────cancel──────────┘                     ▼
//!                       ▼                                        Received
//!                   Cancelled                                       │ complete
//!                (reservations released)                            ▼
//!                                                               Completed
//! ```
//!
//! ## Stock
//! `reserved_stock` goes up by the ordered quantities when the order is
//! created. Receiving goods moves nothing. Completion deducts the order's
//! own lines from both `stock` and `reserved_stock`, exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{check_installment, DeferredPaymentCoordinator, InstallmentRecord, PaymentSchedule};
use crate::cart::{compute_totals, CartDiscount, CartItem};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::sale::{is_walk_in, SaleContext, SaleKind, SaleRequest};
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::types::{InstrumentRef, Payment, PaymentMethod};
use crate::validation::{validate_id, validate_payment_amount, validate_quantity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    Pending,
    Ordered,
    PartiallyReceived,
    Received,
    Completed,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            SalesOrderStatus::Draft | SalesOrderStatus::Pending | SalesOrderStatus::Ordered
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SalesOrderStatus::Completed | SalesOrderStatus::Cancelled)
    }
}

/// An ordered item and how much of it has arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub item: CartItem,
    pub received_quantity: i64,
}

impl OrderLine {
    pub fn outstanding(&self) -> i64 {
        self.item.quantity - self.received_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrder {
    pub id: String,
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLine>,
    pub schedule: PaymentSchedule,
    pub status: SalesOrderStatus,
    pub created_by: String,
    pub completion_sale_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SalesOrder {
    pub fn items(&self) -> Vec<CartItem> {
        self.lines.iter().map(|l| l.item.clone()).collect()
    }
}

/// Input to [`DeferredPaymentCoordinator::create_sales_order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderRequest {
    pub user_id: String,
    pub customer_id: Option<String>,
    pub items: Vec<CartItem>,
    /// Optional deposit taken when the order is placed.
    pub deposit: Option<Payment>,
}

/// Ordered quantity per inventory-tracked product.
fn tracked_quantities(items: &[CartItem]) -> BTreeMap<&str, i64> {
    let mut quantities = BTreeMap::new();
    for item in items.iter().filter(|i| i.track_inventory) {
        *quantities.entry(item.product_id.as_str()).or_default() += item.quantity;
    }
    quantities
}

impl<'a> DeferredPaymentCoordinator<'a> {
    /// Creates a `Draft` order, reserving stock for its lines.
    pub fn create_sales_order(
        &self,
        state: &PosState,
        request: SalesOrderRequest,
    ) -> CoreResult<Outcome<SalesOrder>> {
        validate_id("user_id", &request.user_id)?;
        let totals = compute_totals(&request.items, &CartDiscount::None, self.settings())?;
        if let Some(customer_id) = request.customer_id.as_deref() {
            if !is_walk_in(Some(customer_id)) {
                state.customer(customer_id)?;
            }
        }

        let mut changes = UnitOfWork::new();
        let now = Utc::now();
        for (product_id, qty) in tracked_quantities(&request.items) {
            let mut product = state.product(product_id)?.clone();
            if !product.can_sell(qty) {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.available_stock(),
                    requested: qty,
                });
            }
            if product.track_inventory {
                product.reserved_stock += qty;
                product.updated_at = now;
                changes.put_product(product);
            }
        }

        let id = Uuid::new_v4().to_string();
        let mut schedule = PaymentSchedule::new(totals.total);

        if let Some(deposit) = &request.deposit {
            validate_payment_amount(deposit.amount)?;
            if deposit.amount >= totals.total {
                return Err(ValidationError::Exceeds {
                    field: "sales order deposit".to_string(),
                    amount: deposit.amount,
                    limit: totals.total - Money::from_cents(1),
                }
                .into());
            }
            let sale = self.take_payment(
                state,
                &request.user_id,
                InstrumentRef::SalesOrder(id.clone()),
                request.customer_id.as_deref(),
                deposit.amount,
                deposit.method,
                Money::zero(),
                false,
            )?;
            schedule.record(InstallmentRecord::from_sale(&sale.record, deposit.method));
            changes.merge(sale.changes);
        }

        let order = SalesOrder {
            id,
            customer_id: request.customer_id,
            lines: request
                .items
                .into_iter()
                .map(|item| OrderLine {
                    item,
                    received_quantity: 0,
                })
                .collect(),
            schedule,
            status: SalesOrderStatus::Draft,
            created_by: request.user_id,
            completion_sale_id: None,
            created_at: now,
            completed_at: None,
        };

        info!(
            sales_order_id = %order.id,
            total = %order.schedule.total,
            balance = %order.schedule.balance,
            "Sales order created"
        );

        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    /// Draft → Pending.
    pub fn submit_sales_order(&self, state: &PosState, order_id: &str) -> CoreResult<Outcome<SalesOrder>> {
        self.transition(state, order_id, SalesOrderStatus::Draft, SalesOrderStatus::Pending, "submit")
    }

    /// Pending → Ordered.
    pub fn mark_sales_order_ordered(
        &self,
        state: &PosState,
        order_id: &str,
    ) -> CoreResult<Outcome<SalesOrder>> {
        self.transition(state, order_id, SalesOrderStatus::Pending, SalesOrderStatus::Ordered, "mark ordered")
    }

    fn transition(
        &self,
        state: &PosState,
        order_id: &str,
        from: SalesOrderStatus,
        to: SalesOrderStatus,
        action: &'static str,
    ) -> CoreResult<Outcome<SalesOrder>> {
        let mut order = state.sales_order(order_id)?.clone();
        if order.status != from {
            return Err(CoreError::invalid_state("SalesOrder", order_id, order.status, action));
        }
        order.status = to;
        info!(sales_order_id = order_id, status = ?to, "Sales order status changed");

        let mut changes = UnitOfWork::new();
        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    /// Records goods arriving from the supplier. No stock moves.
    pub fn receive_sales_order_items(
        &self,
        state: &PosState,
        order_id: &str,
        received: &[(&str, i64)],
    ) -> CoreResult<Outcome<SalesOrder>> {
        let mut order = state.sales_order(order_id)?.clone();
        if !matches!(
            order.status,
            SalesOrderStatus::Ordered | SalesOrderStatus::PartiallyReceived
        ) {
            return Err(CoreError::invalid_state(
                "SalesOrder",
                order_id,
                order.status,
                "receive items",
            ));
        }

        if received.is_empty() {
            return Err(ValidationError::Invalid {
                field: "received items".to_string(),
                reason: "nothing was received".to_string(),
            }
            .into());
        }

        // A product may sit on several lines; fill them in order.
        for (product_id, qty) in received {
            validate_quantity(*qty)?;
            let outstanding: i64 = order
                .lines
                .iter()
                .filter(|l| l.item.product_id == *product_id)
                .map(OrderLine::outstanding)
                .sum();
            if outstanding == 0 {
                return Err(CoreError::not_found("SalesOrder line", *product_id));
            }
            if *qty > outstanding {
                return Err(ValidationError::OutOfRange {
                    field: format!("received quantity for {}", product_id),
                    min: 1,
                    max: outstanding,
                }
                .into());
            }

            let mut remaining = *qty;
            for line in order
                .lines
                .iter_mut()
                .filter(|l| l.item.product_id == *product_id)
            {
                let take = remaining.min(line.outstanding());
                line.received_quantity += take;
                remaining -= take;
            }
        }

        order.status = if order.lines.iter().all(|l| l.outstanding() == 0) {
            SalesOrderStatus::Received
        } else {
            SalesOrderStatus::PartiallyReceived
        };
        info!(sales_order_id = order_id, status = ?order.status, "Sales order items received");

        let mut changes = UnitOfWork::new();
        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    /// Cancels the order and releases its reservations.
    pub fn cancel_sales_order(&self, state: &PosState, order_id: &str) -> CoreResult<Outcome<SalesOrder>> {
        let mut order = state.sales_order(order_id)?.clone();
        if !order.status.can_cancel() {
            return Err(CoreError::invalid_state("SalesOrder", order_id, order.status, "cancel"));
        }

        let mut changes = UnitOfWork::new();
        let now = Utc::now();
        let items = order.items();
        for (product_id, qty) in tracked_quantities(&items) {
            let mut product = state.product(product_id)?.clone();
            if !product.track_inventory {
                continue;
            }
            if product.reserved_stock < qty {
                return Err(CoreError::ReservationMismatch {
                    sku: product.sku,
                    reserved: product.reserved_stock,
                    requested: qty,
                });
            }
            product.reserved_stock -= qty;
            product.updated_at = now;
            changes.put_product(product);
        }

        order.status = SalesOrderStatus::Cancelled;
        info!(sales_order_id = order_id, paid = %order.schedule.paid(), "Sales order cancelled");

        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    pub(super) fn sales_order_installment(
        &self,
        state: &PosState,
        user_id: &str,
        order_id: &str,
        amount: Money,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<SalesOrder>> {
        let mut order = state.sales_order(order_id)?.clone();
        if order.status.is_terminal() {
            return Err(CoreError::invalid_state(
                "SalesOrder",
                order_id,
                order.status,
                "add installment",
            ));
        }
        check_installment("SalesOrder", order_id, &order.schedule, amount)?;
        if amount == order.schedule.balance {
            return Err(ValidationError::Invalid {
                field: "amount".to_string(),
                reason: "the final payment is taken when the order is completed".to_string(),
            }
            .into());
        }

        let payment = self.take_payment(
            state,
            user_id,
            InstrumentRef::SalesOrder(order.id.clone()),
            order.customer_id.as_deref(),
            amount,
            method,
            order.schedule.paid(),
            false,
        )?;
        order
            .schedule
            .record(InstallmentRecord::from_sale(&payment.record, method));

        info!(
            sales_order_id = %order.id,
            amount = %amount,
            balance = %order.schedule.balance,
            "Sales order installment recorded"
        );

        let mut changes = payment.changes;
        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    /// Sells the received order for its remaining balance.
    ///
    /// Stock and reservations come off the order's own lines, and deposit
    /// revenue recognised by earlier installments is netted out of the
    /// posting.
    pub fn complete_sales_order(
        &self,
        state: &PosState,
        user_id: &str,
        order_id: &str,
        payment: Payment,
    ) -> CoreResult<Outcome<SalesOrder>> {
        let mut order = state.sales_order(order_id)?.clone();
        if order.status != SalesOrderStatus::Received {
            return Err(CoreError::invalid_state(
                "SalesOrder",
                order_id,
                order.status,
                "complete",
            ));
        }
        if order.schedule.is_settled() {
            return Err(CoreError::InvalidState {
                entity: "SalesOrder",
                id: order_id.to_string(),
                current: "Settled".to_string(),
                action: "complete",
            });
        }

        let items = order.items();
        let method = payment.method;
        let request = SaleRequest {
            items: items.clone(),
            payments: vec![payment],
            customer_id: order.customer_id.clone(),
            context: SaleContext {
                user_id: user_id.to_string(),
                link: Some(InstrumentRef::SalesOrder(order.id.clone())),
                deposit_applied: order.schedule.paid(),
                kind: SaleKind::SalesOrderCompletion { lines: items },
            },
            ..SaleRequest::default()
        };
        let sale = self.sales.complete_sale(state, request)?;

        order
            .schedule
            .record(InstallmentRecord::from_sale(&sale.record, method));
        order.status = SalesOrderStatus::Completed;
        order.completion_sale_id = Some(sale.record.id.clone());
        order.completed_at = Some(sale.record.created_at);

        info!(
            sales_order_id = %order.id,
            sale_id = %sale.record.id,
            total = %sale.record.total,
            "Sales order completed"
        );

        let mut changes = sale.changes;
        changes.put_sales_order(order.clone());
        Ok(Outcome::new(order, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{
        customer, loyalty_settings, open_shift, product, settings, state_with, CASHIER,
    };

    fn order_request(state: &PosState, qty: i64, deposit: Option<i64>) -> SalesOrderRequest {
        SalesOrderRequest {
            user_id: CASHIER.into(),
            customer_id: None,
            items: vec![CartItem::from_product(state.product("p-1").unwrap(), qty)],
            deposit: deposit.map(|d| Payment::cash(Money::from_major(d))),
        }
    }

    fn apply<T>(
        state: &mut PosState,
        op: impl FnOnce(&PosState) -> CoreResult<Outcome<T>>,
    ) -> T {
        let outcome = op(state).unwrap();
        state.commit(outcome.changes).unwrap();
        outcome.record
    }

    #[test]
    fn test_full_lifecycle_deducts_stock_once() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES-BOX", 1000, 600, 10)]);
        open_shift(&mut state, CASHIER, Money::zero());

        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 3, Some(1000))));
        assert_eq!(order.status, SalesOrderStatus::Draft);
        assert_eq!(order.schedule.balance, Money::from_major(2000));
        let p = state.product("p-1").unwrap();
        assert_eq!((p.stock, p.reserved_stock), (10, 3));

        apply(&mut state, |s| so.submit_sales_order(s, &order.id));
        apply(&mut state, |s| so.mark_sales_order_ordered(s, &order.id));
        let partial = apply(&mut state, |s| so.receive_sales_order_items(s, &order.id, &[("p-1", 1)]));
        assert_eq!(partial.status, SalesOrderStatus::PartiallyReceived);
        let received = apply(&mut state, |s| so.receive_sales_order_items(s, &order.id, &[("p-1", 2)]));
        assert_eq!(received.status, SalesOrderStatus::Received);
        assert_eq!(state.product("p-1").unwrap().stock, 10);

        let done = so
            .complete_sales_order(&state, CASHIER, &order.id, Payment::cash(Money::from_major(2000)))
            .unwrap();
        let sale = done.changes.sales[0].clone();
        let tx = done.changes.transactions[0].clone();
        state.commit(done.changes).unwrap();

        assert_eq!(done.record.status, SalesOrderStatus::Completed);
        assert!(done.record.schedule.balance.is_zero());
        assert_eq!(sale.total, Money::from_major(2000));
        assert_eq!(sale.deposit_applied, Money::from_major(1000));
        assert_eq!(tx.total_debits(), tx.total_credits());

        let p = state.product("p-1").unwrap();
        assert_eq!((p.stock, p.reserved_stock), (7, 0));

        // Revenue recognised once over deposit + completion: 3000 gross
        let sales = state.ledger.account_balance("4000").unwrap();
        let vat = state.ledger.account_balance("2100").unwrap();
        assert_eq!(sales + vat, Money::from_major(3000));
        assert_eq!(state.ledger.account_balance("1000").unwrap(), Money::from_major(3000));
    }

    #[test]
    fn test_completion_requires_received() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 10)]);
        open_shift(&mut state, CASHIER, Money::zero());
        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 1, None)));

        let err = so
            .complete_sales_order(&state, CASHIER, &order.id, Payment::cash(Money::from_major(1000)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn test_cancel_releases_reservation() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 10)]);
        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 4, None)));
        assert_eq!(state.product("p-1").unwrap().reserved_stock, 4);

        apply(&mut state, |s| so.submit_sales_order(s, &order.id));
        apply(&mut state, |s| so.mark_sales_order_ordered(s, &order.id));
        let cancelled = apply(&mut state, |s| so.cancel_sales_order(s, &order.id));
        assert_eq!(cancelled.status, SalesOrderStatus::Cancelled);
        assert_eq!(state.product("p-1").unwrap().reserved_stock, 0);

        let err = so.submit_sales_order(&state, &order.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_cannot_cancel_after_receiving() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 10)]);
        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 2, None)));
        apply(&mut state, |s| so.submit_sales_order(s, &order.id));
        apply(&mut state, |s| so.mark_sales_order_ordered(s, &order.id));
        apply(&mut state, |s| so.receive_sales_order_items(s, &order.id, &[("p-1", 1)]));

        assert!(so.cancel_sales_order(&state, &order.id).is_err());
        let err = so
            .receive_sales_order_items(&state, &order.id, &[("p-1", 5)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_reservation_respects_available_stock() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 5)]);
        apply(&mut state, |s| so.create_sales_order(s, order_request(s, 4, None)));

        let err = so
            .create_sales_order(&state, order_request(&state, 2, None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[test]
    fn test_installments_leave_positive_balance() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 5)]);
        open_shift(&mut state, CASHIER, Money::zero());
        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 1, None)));
        let link = InstrumentRef::SalesOrder(order.id.clone());

        let err = so
            .add_installment(&state, CASHIER, &link, Money::from_major(1000), PaymentMethod::Cash)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let paid = so
            .add_installment(&state, CASHIER, &link, Money::from_major(400), PaymentMethod::Cash)
            .unwrap();
        assert_eq!(paid.record.balance(), Money::from_major(600));
        assert!(!paid.record.is_completed());
    }

    #[test]
    fn test_deposit_must_leave_balance() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 5)]);
        open_shift(&mut state, CASHIER, Money::zero());

        let err = so
            .create_sales_order(&state, order_request(&state, 1, Some(1000)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state.product("p-1").unwrap().reserved_stock, 0);
    }

    fn received_order(state: &mut PosState, so: &DeferredPaymentCoordinator, request: SalesOrderRequest) -> SalesOrder {
        let order = apply(state, |s| so.create_sales_order(s, request));
        apply(state, |s| so.submit_sales_order(s, &order.id));
        apply(state, |s| so.mark_sales_order_ordered(s, &order.id));
        let items: Vec<(String, i64)> = order
            .lines
            .iter()
            .map(|l| (l.item.product_id.clone(), l.item.quantity))
            .collect();
        let received: Vec<(&str, i64)> = items.iter().map(|(id, q)| (id.as_str(), *q)).collect();
        apply(state, |s| so.receive_sales_order_items(s, &order.id, &received))
    }

    #[test]
    fn test_completion_reverses_each_deposit_split() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "PENCIL", 1, 0, 10)]);
        open_shift(&mut state, CASHIER, Money::zero());

        // 0.03 splits as 0.03 net / 0.00 VAT, but 0.06 splits as 0.05 / 0.01
        let request = SalesOrderRequest {
            deposit: Some(Payment::cash(Money::from_cents(3))),
            ..order_request(&state, 1, None)
        };
        let order = received_order(&mut state, &so, request);
        let link = InstrumentRef::SalesOrder(order.id.clone());
        apply(&mut state, |s| {
            so.add_installment(s, CASHIER, &link, Money::from_cents(3), PaymentMethod::Cash)
        });
        apply(&mut state, |s| {
            so.complete_sales_order(s, CASHIER, &order.id, Payment::cash(Money::from_cents(94)))
        });

        let (net, vat) = Money::from_major(1).split_inclusive(settings.vat_rate);
        assert_eq!(net, Money::from_cents(86));
        assert_eq!(state.ledger.account_balance("4000").unwrap(), net);
        assert_eq!(state.ledger.account_balance("2100").unwrap(), vat);
        assert_eq!(state.ledger.account_balance("1000").unwrap(), Money::from_major(1));
    }

    #[test]
    fn test_completion_earns_points_on_whole_order() {
        let settings = loyalty_settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 5)]);
        state.customers.insert("c-1".into(), customer("c-1", 0));
        open_shift(&mut state, CASHIER, Money::zero());

        let request = SalesOrderRequest {
            customer_id: Some("c-1".into()),
            ..order_request(&state, 1, Some(400))
        };
        let order = received_order(&mut state, &so, request);
        assert_eq!(state.customer("c-1").unwrap().loyalty_points, 0);

        let done = so
            .complete_sales_order(&state, CASHIER, &order.id, Payment::cash(Money::from_major(600)))
            .unwrap();
        let sale = done.changes.sales[0].clone();
        state.commit(done.changes).unwrap();

        assert_eq!(sale.total, Money::from_major(600));
        assert_eq!(sale.points_earned, 10);
        assert_eq!(state.customer("c-1").unwrap().loyalty_points, 10);
    }

    #[test]
    fn test_receive_rejects_empty_and_zero_quantities() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 10)]);
        let order = apply(&mut state, |s| so.create_sales_order(s, order_request(s, 2, None)));
        apply(&mut state, |s| so.submit_sales_order(s, &order.id));
        apply(&mut state, |s| so.mark_sales_order_ordered(s, &order.id));

        let err = so.receive_sales_order_items(&state, &order.id, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = so
            .receive_sales_order_items(&state, &order.id, &[("p-1", 0)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state.sales_order(&order.id).unwrap().status, SalesOrderStatus::Ordered);
    }

    #[test]
    fn test_receive_fills_lines_sharing_a_product() {
        let settings = settings();
        let so = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TILES", 1000, 600, 10)]);
        let tiles = state.product("p-1").unwrap().clone();
        let request = SalesOrderRequest {
            user_id: CASHIER.into(),
            customer_id: None,
            items: vec![CartItem::from_product(&tiles, 2), CartItem::from_product(&tiles, 3)],
            deposit: None,
        };
        let order = apply(&mut state, |s| so.create_sales_order(s, request));
        apply(&mut state, |s| so.submit_sales_order(s, &order.id));
        apply(&mut state, |s| so.mark_sales_order_ordered(s, &order.id));

        let partial = apply(&mut state, |s| so.receive_sales_order_items(s, &order.id, &[("p-1", 4)]));
        assert_eq!(partial.status, SalesOrderStatus::PartiallyReceived);
        assert_eq!(partial.lines[0].received_quantity, 2);
        assert_eq!(partial.lines[1].received_quantity, 2);

        let err = so
            .receive_sales_order_items(&state, &order.id, &[("p-1", 2)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let received = apply(&mut state, |s| so.receive_sales_order_items(s, &order.id, &[("p-1", 1)]));
        assert_eq!(received.status, SalesOrderStatus::Received);
    }
}
