//! # Sale Engine
//!
//! Turns a cart and a set of payments into a finalized sale, its stock
//! movements, loyalty update, ledger posting and shift membership.
//!
//! ## Completion Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      complete_sale(state, request)                      │
//! │                                                                         │
//! │  1. Active shift for user? ─────────────────────── no ──► NoActiveShift │
//! │  2. compute_totals(items, cart discount)                                │
//! │  3. Loyalty redemption, deposit applied ──► amount due                  │
//! │  4. Payments: Σpaid ≥ due, change ≤ Σcash                              │
//! │  5. Stock plan                                                          │
//! │       Standard             stock −= qty  (needs stock − reserved)       │
//! │       Installment          no stock movement                            │
//! │       SalesOrderCompletion stock −= qty, reserved −= qty (order lines)  │
//! │  6. Journal entry prepared (not yet appended)                           │
//! │  7. Sale + shift back-reference                                         │
//! │                                                                         │
//! │  Every step only reads `state`. The writes come back as a UnitOfWork   │
//! │  that the caller commits; any error above means nothing was written.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Posting
//! ```text
//!   Dr  cash / mobile money / bank   payments retained (cash net of change)
//!   Dr  sales                        loyalty points redeemed
//!   Dr  sales, VAT payable           deposit reversal (sales order completion)
//!       Cr  sales                    taxable amount
//!       Cr  VAT payable              tax
//!   Dr  COGS                         Σ cost of inventory lines
//!       Cr  inventory
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cart::{compute_totals, CartDiscount, CartItem};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ledger::{JournalLine, ReferenceType};
use crate::money::Money;
use crate::settings::Settings;
use crate::shift::ShiftManager;
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::types::{Customer, InstrumentRef, Payment, Sale};
use crate::validation::{validate_id, validate_payment_amount, validate_points};
use crate::WALK_IN_CUSTOMER_ID;

// =============================================================================
// Request Types
// =============================================================================

/// How a sale relates to stock and to earlier payments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleKind {
    /// Over-the-counter sale; stock is deducted per cart line.
    #[default]
    Standard,
    /// Deposit or installment on a deferred instrument. No stock moves.
    /// Points are only earned on the final payment.
    Installment { final_payment: bool },
    /// Final sale of a sales order. Stock and reservations are released
    /// from the order's own lines.
    SalesOrderCompletion { lines: Vec<CartItem> },
}

/// Who is selling and what the sale belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleContext {
    pub user_id: String,
    pub link: Option<InstrumentRef>,
    /// Amount already paid towards this purchase by earlier sales.
    pub deposit_applied: Money,
    pub kind: SaleKind,
}

impl SaleContext {
    pub fn standard(user_id: impl Into<String>) -> Self {
        SaleContext {
            user_id: user_id.into(),
            ..SaleContext::default()
        }
    }
}

/// Input to [`SaleEngine::complete_sale`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub items: Vec<CartItem>,
    pub payments: Vec<Payment>,
    pub customer_id: Option<String>,
    pub cart_discount: CartDiscount,
    pub points_to_redeem: i64,
    pub context: SaleContext,
}

impl SaleRequest {
    pub fn new(items: Vec<CartItem>, payments: Vec<Payment>, context: SaleContext) -> Self {
        SaleRequest {
            items,
            payments,
            context,
            ..SaleRequest::default()
        }
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_discount(mut self, discount: CartDiscount) -> Self {
        self.cart_discount = discount;
        self
    }

    pub fn redeeming(mut self, points: i64) -> Self {
        self.points_to_redeem = points;
        self
    }
}

/// True for the anonymous walk-in identity.
pub fn is_walk_in(customer_id: Option<&str>) -> bool {
    customer_id.map_or(true, |id| id.is_empty() || id == WALK_IN_CUSTOMER_ID)
}

// =============================================================================
// Sale Engine
// =============================================================================

/// Finalizes sales.
#[derive(Debug, Clone, Copy)]
pub struct SaleEngine<'a> {
    settings: &'a Settings,
}

impl<'a> SaleEngine<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        SaleEngine { settings }
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    pub fn complete_sale(&self, state: &PosState, request: SaleRequest) -> CoreResult<Outcome<Sale>> {
        let SaleRequest {
            items,
            payments,
            customer_id,
            cart_discount,
            points_to_redeem,
            context,
        } = request;

        self.settings.validate()?;
        validate_id("user_id", &context.user_id)?;
        let mut shift = ShiftManager::new()
            .active_shift(state, &context.user_id)?
            .clone();

        // ===== Totals =====
        let totals = compute_totals(&items, &cart_discount, self.settings)?;

        if context.deposit_applied.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "deposit applied".to_string(),
            }
            .into());
        }
        if matches!(context.kind, SaleKind::Standard) && !context.deposit_applied.is_zero() {
            return Err(ValidationError::Invalid {
                field: "deposit applied".to_string(),
                reason: "only deferred sales carry a deposit".to_string(),
            }
            .into());
        }

        // ===== Loyalty redemption =====
        let walk_in = is_walk_in(customer_id.as_deref());
        let customer = match customer_id.as_deref() {
            Some(id) if !walk_in => Some(state.customer(id)?.clone()),
            _ => None,
        };

        validate_points(points_to_redeem)?;
        let points_value = if points_to_redeem > 0 {
            let available = match &customer {
                Some(c) if self.settings.loyalty.enabled => c.loyalty_points,
                _ => {
                    return Err(ValidationError::Invalid {
                        field: "points".to_string(),
                        reason: "redemption needs a loyalty customer".to_string(),
                    }
                    .into())
                }
            };
            if points_to_redeem > available {
                return Err(ValidationError::Invalid {
                    field: "points".to_string(),
                    reason: format!("{} requested, {} available", points_to_redeem, available),
                }
                .into());
            }
            self.settings.loyalty.value_of(points_to_redeem)
        } else {
            Money::zero()
        };

        let deposit_credit = match context.kind {
            SaleKind::SalesOrderCompletion { .. } => context.deposit_applied,
            _ => Money::zero(),
        };
        let reductions = points_value + deposit_credit;
        if reductions > totals.total {
            return Err(ValidationError::Exceeds {
                field: "points and deposit".to_string(),
                amount: reductions,
                limit: totals.total,
            }
            .into());
        }
        let total = totals.total - reductions;

        // ===== Payments =====
        for payment in &payments {
            validate_payment_amount(payment.amount)?;
        }
        let amount_paid: Money = payments.iter().map(|p| p.amount).sum();
        if amount_paid < total {
            warn!(paid = %amount_paid, total = %total, "Sale underpaid");
            return Err(ValidationError::Underpaid {
                paid: amount_paid,
                total,
            }
            .into());
        }
        let change = amount_paid - total;
        let cash: Money = payments
            .iter()
            .filter(|p| p.method.is_cash())
            .map(|p| p.amount)
            .sum();
        if change > cash {
            return Err(ValidationError::ChangeWithoutCash { change, cash }.into());
        }

        // ===== Stock =====
        let mut changes = UnitOfWork::new();
        let now = Utc::now();
        let cost_of_goods = match &context.kind {
            SaleKind::Standard => {
                self.deduct_stock(state, &items, false, now, &mut changes)?;
                totals.inventory_cost()
            }
            SaleKind::Installment { .. } => Money::zero(),
            SaleKind::SalesOrderCompletion { lines } => {
                self.deduct_stock(state, lines, true, now, &mut changes)?;
                lines
                    .iter()
                    .filter(|l| l.track_inventory)
                    .map(CartItem::cost)
                    .sum()
            }
        };

        // ===== Loyalty earn =====
        let earns = match context.kind {
            SaleKind::Standard | SaleKind::SalesOrderCompletion { .. } => true,
            SaleKind::Installment { final_payment } => final_payment,
        };
        let points_earned = match &customer {
            Some(_) if earns => self
                .settings
                .loyalty
                .points_for(total + context.deposit_applied),
            _ => 0,
        };
        let points_balance_after = customer.as_ref().map(|c| {
            c.loyalty_points + points_earned - points_to_redeem
        });
        if let Some(c) = &customer {
            if points_earned != 0 || points_to_redeem != 0 {
                changes.put_customer(Customer {
                    loyalty_points: c.loyalty_points + points_earned - points_to_redeem,
                    ..c.clone()
                });
            }
        }

        // ===== Ledger =====
        let sale_id = Uuid::new_v4().to_string();
        let receipt_number = next_receipt_number(state, now);
        let deposit_split = self.deposit_reversal(state, context.link.as_ref(), deposit_credit)?;
        let entries = self.journal_lines(
            &payments,
            change,
            points_value,
            deposit_split,
            totals.taxable_amount,
            totals.tax,
            cost_of_goods,
        );
        let ledger_transaction_id = if entries.is_empty() {
            None
        } else {
            let tx = state.ledger.prepare(
                &format!("Sale {}", receipt_number),
                &sale_id,
                ReferenceType::Sale,
                entries,
            )?;
            let id = tx.id.clone();
            changes.put_transaction(tx);
            Some(id)
        };

        // ===== Sale + shift =====
        shift.attach_sale(&sale_id)?;

        let sale = Sale {
            id: sale_id,
            receipt_number,
            items: totals.lines,
            payments,
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            taxable_amount: totals.taxable_amount,
            tax: totals.tax,
            points_value,
            deposit_applied: context.deposit_applied,
            total,
            amount_paid,
            change,
            customer_id: customer.as_ref().map(|c| c.id.clone()),
            points_earned,
            points_used: points_to_redeem,
            points_balance_after,
            link: context.link,
            shift_id: shift.id.clone(),
            user_id: context.user_id,
            ledger_transaction_id,
            created_at: now,
        };

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            total = %sale.total,
            change = %sale.change,
            shift_id = %sale.shift_id,
            "Sale completed"
        );

        changes.put_sale(sale.clone());
        changes.put_shift(shift);
        Ok(Outcome::new(sale, changes))
    }

    /// Plans stock deductions for inventory-tracked lines.
    ///
    /// With `release_reservation` the quantities also come off
    /// `reserved_stock`; otherwise only unreserved stock may be sold.
    fn deduct_stock(
        &self,
        state: &PosState,
        lines: &[CartItem],
        release_reservation: bool,
        now: DateTime<Utc>,
        changes: &mut UnitOfWork,
    ) -> CoreResult<()> {
        let mut quantities: BTreeMap<&str, i64> = BTreeMap::new();
        for line in lines.iter().filter(|l| l.track_inventory) {
            *quantities.entry(line.product_id.as_str()).or_default() += line.quantity;
        }

        for (product_id, qty) in quantities {
            let mut product = state.product(product_id)?.clone();
            if !product.track_inventory {
                continue;
            }

            if release_reservation {
                if product.reserved_stock < qty {
                    return Err(CoreError::ReservationMismatch {
                        sku: product.sku,
                        reserved: product.reserved_stock,
                        requested: qty,
                    });
                }
                if product.stock < qty {
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku,
                        available: product.stock,
                        requested: qty,
                    });
                }
                product.reserved_stock -= qty;
            } else if !product.can_sell(qty) {
                warn!(
                    sku = %product.sku,
                    available = product.available_stock(),
                    requested = qty,
                    "Insufficient stock"
                );
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.available_stock(),
                    requested: qty,
                });
            }

            product.stock -= qty;
            product.updated_at = now;
            changes.put_product(product);
        }

        Ok(())
    }

    /// Revenue and VAT already recognised by the deposits being applied.
    ///
    /// Each deposit sale was split on its own, so a linked sales order
    /// reverses the sum of those recorded splits rather than re-splitting
    /// the summed deposits. An unlinked deposit is split as one amount.
    fn deposit_reversal(
        &self,
        state: &PosState,
        link: Option<&InstrumentRef>,
        deposit: Money,
    ) -> CoreResult<(Money, Money)> {
        if !deposit.is_positive() {
            return Ok((Money::zero(), Money::zero()));
        }
        let order = match link {
            Some(InstrumentRef::SalesOrder(id)) => state.sales_order(id)?,
            _ => return Ok(deposit.split_inclusive(self.settings.vat_rate)),
        };

        let mut net = Money::zero();
        let mut vat = Money::zero();
        let mut recorded = Money::zero();
        for payment in &order.schedule.payments {
            let sale = state.sale(&payment.sale_id)?;
            net += sale.taxable_amount;
            vat += sale.tax;
            recorded += sale.total;
        }
        if recorded != deposit {
            return Err(ValidationError::Invalid {
                field: "deposit applied".to_string(),
                reason: format!("{} applied, {} recorded against the order", deposit, recorded),
            }
            .into());
        }
        Ok((net, vat))
    }

    #[allow(clippy::too_many_arguments)]
    fn journal_lines(
        &self,
        payments: &[Payment],
        change: Money,
        points_value: Money,
        deposit_split: (Money, Money),
        taxable: Money,
        tax: Money,
        cost_of_goods: Money,
    ) -> Vec<JournalLine> {
        let accounts = &self.settings.accounts;

        // Tenders aggregated per asset account; change comes out of cash.
        let mut retained: BTreeMap<&str, Money> = BTreeMap::new();
        for payment in payments {
            *retained
                .entry(accounts.for_payment(payment.method))
                .or_default() += payment.amount;
        }
        if !change.is_zero() {
            *retained.entry(accounts.cash.as_str()).or_default() -= change;
        }

        let mut lines: Vec<JournalLine> = retained
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(account, amount)| JournalLine::debit(account, amount))
            .collect();

        if points_value.is_positive() {
            lines.push(JournalLine::debit(&accounts.sales, points_value));
        }
        let (deposit_net, deposit_vat) = deposit_split;
        if deposit_net.is_positive() {
            lines.push(JournalLine::debit(&accounts.sales, deposit_net));
        }
        if deposit_vat.is_positive() {
            lines.push(JournalLine::debit(&accounts.vat_payable, deposit_vat));
        }
        if taxable.is_positive() {
            lines.push(JournalLine::credit(&accounts.sales, taxable));
        }
        if tax.is_positive() {
            lines.push(JournalLine::credit(&accounts.vat_payable, tax));
        }
        if cost_of_goods.is_positive() {
            lines.push(JournalLine::debit(&accounts.cogs, cost_of_goods));
            lines.push(JournalLine::credit(&accounts.inventory, cost_of_goods));
        }

        lines
    }
}

/// Next `YYYYMMDD-NNNN` receipt number for the day of `now`.
pub fn next_receipt_number(state: &PosState, now: DateTime<Utc>) -> String {
    let prefix = now.format("%Y%m%d").to_string();
    let last = state
        .sales
        .values()
        .filter_map(|s| s.receipt_number.strip_prefix(&prefix))
        .filter_map(|rest| rest.strip_prefix('-'))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:04}", prefix, last + 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
