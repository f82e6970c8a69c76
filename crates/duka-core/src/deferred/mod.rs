//! # Deferred Payments
//!
//! Instruments that take a deposit now and resolve through later sales.
//!
//! ## Instruments
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    DeferredPaymentCoordinator                           │
//! │                                                                         │
//! │  ┌───────────────┐   ┌────────────────┐   ┌─────────────────────────┐  │
//! │  │   Layaway     │   │   WorkOrder    │   │      SalesOrder         │  │
//! │  │ Active        │   │ Open           │   │ Draft → Pending →       │  │
//! │  │  → Completed  │   │  → DepositPaid │   │ Ordered → Partially     │  │
//! │  │  → Cancelled  │   │  → Completed   │   │ Received → Received →   │  │
//! │  │               │   │  → Cancelled   │   │ Completed  (Cancelled)  │  │
//! │  └───────┬───────┘   └───────┬────────┘   └────────────┬────────────┘  │
//! │          └───────────────────┼─────────────────────────┘               │
//! │                              ▼                                          │
//! │           PaymentSchedule { total, payments, balance }                  │
//! │                              │                                          │
//! │                              ▼                                          │
//! │   each payment = one synthetic service-line Sale via SaleEngine         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance never increases. Layaways and work orders become
//! `Completed` exactly when it reaches zero; a sales order only completes
//! through [`DeferredPaymentCoordinator::complete_sales_order`].

mod layaway;
mod sales_order;
mod work_order;

pub use layaway::{Layaway, LayawayRequest, LayawayStatus};
pub use sales_order::{OrderLine, SalesOrder, SalesOrderRequest, SalesOrderStatus};
pub use work_order::{WorkOrder, WorkOrderRequest, WorkOrderStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::cart::CartItem;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sale::{SaleContext, SaleEngine, SaleKind, SaleRequest};
use crate::settings::Settings;
use crate::state::{Outcome, PosState};
use crate::types::{InstrumentRef, Payment, PaymentMethod, Sale};
use crate::validation::validate_payment_amount;

// =============================================================================
// Payment Schedule
// =============================================================================

/// One payment towards an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentRecord {
    /// The sale that took the money (weak reference).
    pub sale_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

impl InstallmentRecord {
    fn from_sale(sale: &Sale, method: PaymentMethod) -> Self {
        InstallmentRecord {
            sale_id: sale.id.clone(),
            amount: sale.total,
            method,
            paid_at: sale.created_at,
        }
    }
}

/// Total, payment history and what is still owed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSchedule {
    pub total: Money,
    pub payments: Vec<InstallmentRecord>,
    /// `total − Σ payments`.
    pub balance: Money,
}

impl PaymentSchedule {
    pub fn new(total: Money) -> Self {
        PaymentSchedule {
            total,
            payments: Vec::new(),
            balance: total,
        }
    }

    pub fn paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn record(&mut self, payment: InstallmentRecord) {
        self.payments.push(payment);
        self.balance = self.total - self.paid();
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.balance.is_positive()
    }
}

// =============================================================================
// Instrument
// =============================================================================

/// Any deferred instrument, as returned by [`DeferredPaymentCoordinator::add_installment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    Layaway(Layaway),
    WorkOrder(WorkOrder),
    SalesOrder(SalesOrder),
}

impl Instrument {
    pub fn id(&self) -> &str {
        match self {
            Instrument::Layaway(l) => &l.id,
            Instrument::WorkOrder(w) => &w.id,
            Instrument::SalesOrder(s) => &s.id,
        }
    }

    pub fn schedule(&self) -> &PaymentSchedule {
        match self {
            Instrument::Layaway(l) => &l.schedule,
            Instrument::WorkOrder(w) => &w.schedule,
            Instrument::SalesOrder(s) => &s.schedule,
        }
    }

    pub fn balance(&self) -> Money {
        self.schedule().balance
    }

    pub fn is_completed(&self) -> bool {
        match self {
            Instrument::Layaway(l) => l.status == LayawayStatus::Completed,
            Instrument::WorkOrder(w) => w.status == WorkOrderStatus::Completed,
            Instrument::SalesOrder(s) => s.status == SalesOrderStatus::Completed,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Creates deferred instruments and drives their payments through sales.
#[derive(Debug, Clone, Copy)]
pub struct DeferredPaymentCoordinator<'a> {
    sales: SaleEngine<'a>,
}

impl<'a> DeferredPaymentCoordinator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        DeferredPaymentCoordinator {
            sales: SaleEngine::new(settings),
        }
    }

    pub fn settings(&self) -> &'a Settings {
        self.sales.settings()
    }

    /// Takes a payment against any instrument.
    pub fn add_installment(
        &self,
        state: &PosState,
        user_id: &str,
        instrument: &InstrumentRef,
        amount: Money,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<Instrument>> {
        match instrument {
            InstrumentRef::Layaway(id) => Ok(self
                .layaway_installment(state, user_id, id, amount, method)?
                .map(Instrument::Layaway)),
            InstrumentRef::WorkOrder(id) => Ok(self
                .work_order_payment(state, user_id, id, amount, method)?
                .map(Instrument::WorkOrder)),
            InstrumentRef::SalesOrder(id) => Ok(self
                .sales_order_installment(state, user_id, id, amount, method)?
                .map(Instrument::SalesOrder)),
        }
    }

    /// Sells one service line for `amount` linked to `link`.
    #[allow(clippy::too_many_arguments)]
    fn take_payment(
        &self,
        state: &PosState,
        user_id: &str,
        link: InstrumentRef,
        customer_id: Option<&str>,
        amount: Money,
        method: PaymentMethod,
        deposit_applied: Money,
        final_payment: bool,
    ) -> CoreResult<Outcome<Sale>> {
        let line = CartItem::service(format!("{} payment", link.label()), amount);
        let request = SaleRequest {
            items: vec![line],
            payments: vec![Payment::new(method, amount)],
            customer_id: customer_id.map(str::to_string),
            context: SaleContext {
                user_id: user_id.to_string(),
                link: Some(link),
                deposit_applied,
                kind: SaleKind::Installment { final_payment },
            },
            ..SaleRequest::default()
        };
        self.sales.complete_sale(state, request)
    }
}

/// Rejects non-positive payments and payments larger than the balance.
fn check_installment(
    entity: &'static str,
    id: &str,
    schedule: &PaymentSchedule,
    amount: Money,
) -> CoreResult<()> {
    validate_payment_amount(amount)?;
    if amount > schedule.balance {
        warn!(entity, id, balance = %schedule.balance, amount = %amount, "Installment exceeds balance");
        return Err(CoreError::InsufficientFunds {
            source_name: format!("{} {} balance", entity, id),
            available: schedule.balance,
            required: amount,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(amount: i64) -> InstallmentRecord {
        InstallmentRecord {
            sale_id: "s".into(),
            amount: Money::from_major(amount),
            method: PaymentMethod::Cash,
            paid_at: Utc::now(),
        }
    }

    #[test]
    fn test_schedule_balance_shrinks() {
        let mut schedule = PaymentSchedule::new(Money::from_major(1000));
        schedule.record(record(300));
        assert_eq!(schedule.balance, Money::from_major(700));
        assert!(!schedule.is_settled());

        schedule.record(record(700));
        assert!(schedule.balance.is_zero());
        assert!(schedule.is_settled());
        assert_eq!(schedule.paid(), Money::from_major(1000));
    }

    #[test]
    fn test_check_installment() {
        let schedule = PaymentSchedule::new(Money::from_major(100));
        assert!(check_installment("Layaway", "l-1", &schedule, Money::from_major(100)).is_ok());
        assert!(check_installment("Layaway", "l-1", &schedule, Money::zero()).is_err());
        let err = check_installment("Layaway", "l-1", &schedule, Money::from_major(101)).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    }
}
