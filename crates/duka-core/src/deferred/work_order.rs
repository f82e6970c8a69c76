//! Work orders: repairs and custom jobs paid as deposit then balance.
//!
//! ```text
//!   Open ──deposit──► DepositPaid ──final payment──► Completed
//!    │                    │
//!    └──────cancel────────┴──► Cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{check_installment, DeferredPaymentCoordinator, InstallmentRecord, PaymentSchedule};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sale::is_walk_in;
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::types::{InstrumentRef, PaymentMethod};
use crate::validation::{validate_description, validate_id, validate_positive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    DepositPaid,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    #[inline]
    pub fn accepts_payment(&self) -> bool {
        matches!(self, WorkOrderStatus::Open | WorkOrderStatus::DepositPaid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkOrder {
    pub id: String,
    pub customer_id: Option<String>,
    pub description: String,
    pub schedule: PaymentSchedule,
    pub status: WorkOrderStatus,
    /// First payment taken on the order.
    pub deposit_paid: Money,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_date: Option<DateTime<Utc>>,
}

/// Input to [`DeferredPaymentCoordinator::create_work_order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderRequest {
    pub user_id: String,
    pub customer_id: Option<String>,
    pub description: String,
    pub total: Money,
}

impl<'a> DeferredPaymentCoordinator<'a> {
    /// Opens a work order. No money changes hands yet.
    pub fn create_work_order(
        &self,
        state: &PosState,
        request: WorkOrderRequest,
    ) -> CoreResult<Outcome<WorkOrder>> {
        validate_id("user_id", &request.user_id)?;
        validate_description("description", &request.description)?;
        validate_positive("total", request.total)?;
        if let Some(customer_id) = request.customer_id.as_deref() {
            if !is_walk_in(Some(customer_id)) {
                state.customer(customer_id)?;
            }
        }

        let order = WorkOrder {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id,
            description: request.description.trim().to_string(),
            schedule: PaymentSchedule::new(request.total),
            status: WorkOrderStatus::Open,
            deposit_paid: Money::zero(),
            created_by: request.user_id,
            created_at: Utc::now(),
            completed_date: None,
        };

        info!(work_order_id = %order.id, total = %request.total, "Work order created");

        let mut changes = UnitOfWork::new();
        changes.put_work_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    /// Takes the deposit on an open work order.
    pub fn record_work_order_deposit(
        &self,
        state: &PosState,
        user_id: &str,
        work_order_id: &str,
        amount: Money,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<WorkOrder>> {
        let order = state.work_order(work_order_id)?;
        if order.status != WorkOrderStatus::Open {
            return Err(CoreError::invalid_state(
                "WorkOrder",
                work_order_id,
                order.status,
                "record deposit",
            ));
        }
        self.work_order_payment(state, user_id, work_order_id, amount, method)
    }

    /// Takes the outstanding balance and completes the work order.
    pub fn complete_work_order(
        &self,
        state: &PosState,
        user_id: &str,
        work_order_id: &str,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<WorkOrder>> {
        let balance = state.work_order(work_order_id)?.schedule.balance;
        self.work_order_payment(state, user_id, work_order_id, balance, method)
    }

    pub(super) fn work_order_payment(
        &self,
        state: &PosState,
        user_id: &str,
        work_order_id: &str,
        amount: Money,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<WorkOrder>> {
        let mut order = state.work_order(work_order_id)?.clone();
        if !order.status.accepts_payment() {
            return Err(CoreError::invalid_state(
                "WorkOrder",
                work_order_id,
                order.status,
                "take payment",
            ));
        }
        check_installment("WorkOrder", work_order_id, &order.schedule, amount)?;

        let payment = self.take_payment(
            state,
            user_id,
            InstrumentRef::WorkOrder(order.id.clone()),
            order.customer_id.as_deref(),
            amount,
            method,
            order.schedule.paid(),
            amount == order.schedule.balance,
        )?;

        order
            .schedule
            .record(InstallmentRecord::from_sale(&payment.record, method));
        if order.status == WorkOrderStatus::Open {
            order.deposit_paid = amount;
            order.status = WorkOrderStatus::DepositPaid;
        }
        if order.schedule.is_settled() {
            order.status = WorkOrderStatus::Completed;
            order.completed_date = Some(payment.record.created_at);
        }

        info!(
            work_order_id = %order.id,
            amount = %amount,
            balance = %order.schedule.balance,
            status = ?order.status,
            "Work order payment recorded"
        );

        let mut changes = payment.changes;
        changes.put_work_order(order.clone());
        Ok(Outcome::new(order, changes))
    }

    pub fn cancel_work_order(
        &self,
        state: &PosState,
        work_order_id: &str,
    ) -> CoreResult<Outcome<WorkOrder>> {
        let mut order = state.work_order(work_order_id)?.clone();
        if !order.status.accepts_payment() {
            return Err(CoreError::invalid_state(
                "WorkOrder",
                work_order_id,
                order.status,
                "cancel",
            ));
        }
        order.status = WorkOrderStatus::Cancelled;
        info!(work_order_id, "Work order cancelled");

        let mut changes = UnitOfWork::new();
        changes.put_work_order(order.clone());
        Ok(Outcome::new(order, changes))
    }
}
