//! # Shift Manager
//!
//! Cash-drawer sessions and end-of-shift reconciliation.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Shift State Machine                               │
//! │                                                                         │
//! │   (none) ── start_shift(float) ──► Active ── end_shift(count) ──► Closed│
//! │                                      │                          terminal│
//! │                      sales / expenses append their ids                  │
//! │                                                                         │
//! │   expected = float + cash tendered − change − drawer expenses          │
//! │   variance = counted − expected                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one shift per user is `Active`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::expense::ExpenseSource;
use crate::money::Money;
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::types::PaymentMethod;
use crate::validation::validate_id;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Active,
    Closed,
}

/// Amount retained per payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentTotal {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// A cash-drawer session for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub status: ShiftStatus,
    pub starting_float: Money,
    /// Sales attributed to this shift (back-references).
    pub sale_ids: Vec<String>,
    /// Expenses attributed to this shift (back-references).
    pub expense_ids: Vec<String>,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
    pub payment_breakdown: Vec<PaymentTotal>,
    pub expected_cash_in_drawer: Option<Money>,
    pub actual_cash_in_drawer: Option<Money>,
    pub cash_variance: Option<Money>,
}

impl Shift {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ShiftStatus::Active
    }

    pub fn attach_sale(&mut self, sale_id: &str) -> CoreResult<()> {
        self.ensure_active("attach sale")?;
        self.sale_ids.push(sale_id.to_string());
        Ok(())
    }

    pub fn attach_expense(&mut self, expense_id: &str) -> CoreResult<()> {
        self.ensure_active("attach expense")?;
        self.expense_ids.push(expense_id.to_string());
        Ok(())
    }

    fn ensure_active(&self, action: &'static str) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::invalid_state("Shift", &self.id, self.status, action));
        }
        Ok(())
    }
}

/// End-of-shift (or mid-shift X) report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftReport {
    pub shift_id: String,
    pub user_id: String,
    pub status: ShiftStatus,
    pub sale_count: usize,
    /// Σ sale totals.
    pub gross_sales: Money,
    pub tax_collected: Money,
    pub payment_breakdown: Vec<PaymentTotal>,
    pub starting_float: Money,
    /// Cash tendered minus change.
    pub cash_in: Money,
    /// Cash paid out of the drawer for expenses.
    pub cash_out: Money,
    pub expected_cash: Money,
    pub actual_cash: Option<Money>,
    pub variance: Option<Money>,
}

/// Cash movements over the records attributed to one shift.
struct DrawerTotals {
    sale_count: usize,
    gross_sales: Money,
    tax_collected: Money,
    breakdown: BTreeMap<PaymentMethod, Money>,
    cash_in: Money,
    cash_out: Money,
}

impl DrawerTotals {
    fn collect(state: &PosState, shift: &Shift) -> CoreResult<Self> {
        let mut totals = DrawerTotals {
            sale_count: shift.sale_ids.len(),
            gross_sales: Money::zero(),
            tax_collected: Money::zero(),
            breakdown: BTreeMap::new(),
            cash_in: Money::zero(),
            cash_out: Money::zero(),
        };

        for sale_id in &shift.sale_ids {
            let sale = state.sale(sale_id)?;
            totals.gross_sales += sale.total;
            totals.tax_collected += sale.tax;
            totals.cash_in += sale.cash_retained();

            for payment in &sale.payments {
                *totals.breakdown.entry(payment.method).or_default() += payment.amount;
            }
            if !sale.change.is_zero() {
                *totals.breakdown.entry(PaymentMethod::Cash).or_default() -= sale.change;
            }
        }

        for expense_id in &shift.expense_ids {
            let expense = state.expense(expense_id)?;
            if expense.source == ExpenseSource::CashDrawer {
                totals.cash_out += expense.amount;
            }
        }

        Ok(totals)
    }

    fn expected(&self, starting_float: Money) -> Money {
        starting_float + self.cash_in - self.cash_out
    }

    fn breakdown(&self) -> Vec<PaymentTotal> {
        self.breakdown
            .iter()
            .map(|(method, amount)| PaymentTotal {
                method: *method,
                amount: *amount,
            })
            .collect()
    }
}

// =============================================================================
// Shift Manager
// =============================================================================

/// Opens, closes and reports on shifts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftManager;

impl ShiftManager {
    pub fn new() -> Self {
        ShiftManager
    }

    /// Opens a shift with `starting_float` in the drawer.
    pub fn start_shift(
        &self,
        state: &PosState,
        user_id: &str,
        starting_float: Money,
    ) -> CoreResult<Outcome<Shift>> {
        validate_id("user_id", user_id)?;
        if starting_float.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "starting float".to_string(),
            }
            .into());
        }

        if let Some(active) = state.active_shift_for(user_id) {
            warn!(user_id, shift_id = %active.id, "Shift already active");
            return Err(CoreError::ShiftAlreadyActive {
                user_id: user_id.to_string(),
                shift_id: active.id.clone(),
            });
        }

        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: ShiftStatus::Active,
            starting_float,
            sale_ids: Vec::new(),
            expense_ids: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            payment_breakdown: Vec::new(),
            expected_cash_in_drawer: None,
            actual_cash_in_drawer: None,
            cash_variance: None,
        };

        info!(shift_id = %shift.id, user_id, float = %starting_float, "Shift started");

        let mut changes = UnitOfWork::new();
        changes.put_shift(shift.clone());
        Ok(Outcome::new(shift, changes))
    }

    /// Closes the user's active shift against a counted drawer.
    pub fn end_shift(
        &self,
        state: &PosState,
        user_id: &str,
        actual_cash_in_drawer: Money,
    ) -> CoreResult<Outcome<Shift>> {
        if actual_cash_in_drawer.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "actual cash in drawer".to_string(),
            }
            .into());
        }

        let mut shift = self.active_shift(state, user_id)?.clone();
        let totals = DrawerTotals::collect(state, &shift)?;
        let expected = totals.expected(shift.starting_float);
        let variance = actual_cash_in_drawer - expected;

        shift.status = ShiftStatus::Closed;
        shift.ended_at = Some(Utc::now());
        shift.payment_breakdown = totals.breakdown();
        shift.expected_cash_in_drawer = Some(expected);
        shift.actual_cash_in_drawer = Some(actual_cash_in_drawer);
        shift.cash_variance = Some(variance);

        if variance.is_zero() {
            info!(shift_id = %shift.id, expected = %expected, "Shift closed");
        } else {
            warn!(
                shift_id = %shift.id,
                expected = %expected,
                actual = %actual_cash_in_drawer,
                variance = %variance,
                "Shift closed with cash variance"
            );
        }

        let mut changes = UnitOfWork::new();
        changes.put_shift(shift.clone());
        Ok(Outcome::new(shift, changes))
    }

    pub fn active_shift<'s>(&self, state: &'s PosState, user_id: &str) -> CoreResult<&'s Shift> {
        state
            .active_shift_for(user_id)
            .ok_or_else(|| CoreError::NoActiveShift {
                user_id: user_id.to_string(),
            })
    }

    /// Cash that should be in the drawer right now.
    pub fn drawer_cash(&self, state: &PosState, shift: &Shift) -> CoreResult<Money> {
        Ok(DrawerTotals::collect(state, shift)?.expected(shift.starting_float))
    }

    pub fn report(&self, state: &PosState, shift_id: &str) -> CoreResult<ShiftReport> {
        let shift = state.shift(shift_id)?;
        let totals = DrawerTotals::collect(state, shift)?;

        Ok(ShiftReport {
            shift_id: shift.id.clone(),
            user_id: shift.user_id.clone(),
            status: shift.status,
            sale_count: totals.sale_count,
            gross_sales: totals.gross_sales,
            tax_collected: totals.tax_collected,
            payment_breakdown: totals.breakdown(),
            starting_float: shift.starting_float,
            cash_in: totals.cash_in,
            cash_out: totals.cash_out,
            expected_cash: shift
                .expected_cash_in_drawer
                .unwrap_or_else(|| totals.expected(shift.starting_float)),
            actual_cash: shift.actual_cash_in_drawer,
            variance: shift.cash_variance,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
