//! Layaway: goods put aside and paid off in installments.
//!
//! Stock is not reserved or moved while the layaway runs; the goods are
//! handed over and counted when the store settles the layaway outside the
//! core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{check_installment, DeferredPaymentCoordinator, InstallmentRecord, PaymentSchedule};
use crate::cart::CartItem;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::types::{InstrumentRef, PaymentMethod};
use crate::validation::{validate_cart_size, validate_id, validate_payment_amount, validate_positive, validate_quantity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LayawayStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Layaway {
    pub id: String,
    pub customer_id: Option<String>,
    pub items: Vec<CartItem>,
    pub schedule: PaymentSchedule,
    pub status: LayawayStatus,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input to [`DeferredPaymentCoordinator::create_layaway`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayawayRequest {
    pub user_id: String,
    pub customer_id: Option<String>,
    pub items: Vec<CartItem>,
    pub total: Money,
    pub deposit: Money,
    pub method: PaymentMethod,
}

impl<'a> DeferredPaymentCoordinator<'a> {
    /// Takes the deposit sale and opens the layaway.
    ///
    /// If the deposit sale is rejected no layaway is created.
    pub fn create_layaway(
        &self,
        state: &PosState,
        request: LayawayRequest,
    ) -> CoreResult<Outcome<Layaway>> {
        validate_id("user_id", &request.user_id)?;
        validate_cart_size(request.items.len())?;
        for item in &request.items {
            validate_quantity(item.quantity)?;
        }
        validate_positive("total", request.total)?;
        validate_payment_amount(request.deposit)?;
        if request.deposit > request.total {
            return Err(ValidationError::Exceeds {
                field: "deposit".to_string(),
                amount: request.deposit,
                limit: request.total,
            }
            .into());
        }

        let id = Uuid::new_v4().to_string();
        let deposit = self.take_payment(
            state,
            &request.user_id,
            InstrumentRef::Layaway(id.clone()),
            request.customer_id.as_deref(),
            request.deposit,
            request.method,
            Money::zero(),
            request.deposit == request.total,
        )?;

        let mut schedule = PaymentSchedule::new(request.total);
        schedule.record(InstallmentRecord::from_sale(&deposit.record, request.method));

        let now = Utc::now();
        let settled = schedule.is_settled();
        let layaway = Layaway {
            id,
            customer_id: request.customer_id,
            items: request.items,
            schedule,
            status: if settled {
                LayawayStatus::Completed
            } else {
                LayawayStatus::Active
            },
            created_by: request.user_id,
            created_at: now,
            completed_at: settled.then_some(now),
        };

        info!(
            layaway_id = %layaway.id,
            total = %layaway.schedule.total,
            balance = %layaway.schedule.balance,
            "Layaway created"
        );

        let mut changes = deposit.changes;
        changes.put_layaway(layaway.clone());
        Ok(Outcome::new(layaway, changes))
    }

    pub(super) fn layaway_installment(
        &self,
        state: &PosState,
        user_id: &str,
        layaway_id: &str,
        amount: Money,
        method: PaymentMethod,
    ) -> CoreResult<Outcome<Layaway>> {
        let mut layaway = state.layaway(layaway_id)?.clone();
        if layaway.status != LayawayStatus::Active {
            return Err(CoreError::invalid_state(
                "Layaway",
                layaway_id,
                layaway.status,
                "add installment",
            ));
        }
        check_installment("Layaway", layaway_id, &layaway.schedule, amount)?;

        let payment = self.take_payment(
            state,
            user_id,
            InstrumentRef::Layaway(layaway.id.clone()),
            layaway.customer_id.as_deref(),
            amount,
            method,
            layaway.schedule.paid(),
            amount == layaway.schedule.balance,
        )?;

        layaway
            .schedule
            .record(InstallmentRecord::from_sale(&payment.record, method));
        if layaway.schedule.is_settled() {
            layaway.status = LayawayStatus::Completed;
            layaway.completed_at = Some(payment.record.created_at);
        }

        info!(
            layaway_id = %layaway.id,
            amount = %amount,
            balance = %layaway.schedule.balance,
            status = ?layaway.status,
            "Layaway installment recorded"
        );

        let mut changes = payment.changes;
        changes.put_layaway(layaway.clone());
        Ok(Outcome::new(layaway, changes))
    }

    /// Cancels an active layaway. Payments already taken stay on the books.
    pub fn cancel_layaway(&self, state: &PosState, layaway_id: &str) -> CoreResult<Outcome<Layaway>> {
        let mut layaway = state.layaway(layaway_id)?.clone();
        if layaway.status != LayawayStatus::Active {
            return Err(CoreError::invalid_state(
                "Layaway",
                layaway_id,
                layaway.status,
                "cancel",
            ));
        }
        layaway.status = LayawayStatus::Cancelled;
        info!(layaway_id, paid = %layaway.schedule.paid(), "Layaway cancelled");

        let mut changes = UnitOfWork::new();
        changes.put_layaway(layaway.clone());
        Ok(Outcome::new(layaway, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Instrument;
    use crate::error::ErrorKind;
    use crate::test_support::{open_shift, product, settings, state_with, CASHIER};

    fn request(state: &PosState, total: i64, deposit: i64) -> LayawayRequest {
        LayawayRequest {
            user_id: CASHIER.into(),
            customer_id: None,
            items: vec![CartItem::from_product(state.product("p-1").unwrap(), 1)],
            total: Money::from_major(total),
            deposit: Money::from_major(deposit),
            method: PaymentMethod::Cash,
        }
    }

    #[test]
    fn test_layaway_paid_off() {
        let settings = settings();
        let coordinator = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TV-32IN", 1000, 700, 3)]);
        let shift = open_shift(&mut state, CASHIER, Money::zero());

        let created = coordinator.create_layaway(&state, request(&state, 1000, 300)).unwrap();
        let layaway = created.record.clone();
        state.commit(created.changes).unwrap();

        assert_eq!(layaway.schedule.balance, Money::from_major(700));
        assert_eq!(layaway.status, LayawayStatus::Active);
        let deposit_sale = state.sale(&layaway.schedule.payments[0].sale_id).unwrap();
        assert_eq!(deposit_sale.link, Some(InstrumentRef::Layaway(layaway.id.clone())));
        assert_eq!(deposit_sale.total, Money::from_major(300));
        // Stock is untouched while the layaway runs
        assert_eq!(state.product("p-1").unwrap().stock, 3);

        let link = InstrumentRef::Layaway(layaway.id.clone());
        let paid = coordinator
            .add_installment(&state, CASHIER, &link, Money::from_major(700), PaymentMethod::Cash)
            .unwrap();
        state.commit(paid.changes.clone()).unwrap();

        assert!(paid.record.balance().is_zero());
        assert!(paid.record.is_completed());
        let Instrument::Layaway(done) = paid.record else {
            panic!("expected layaway");
        };
        assert!(done.completed_at.is_some());
        assert_eq!(state.shift(&shift.id).unwrap().sale_ids.len(), 2);

        let err = coordinator
            .add_installment(&state, CASHIER, &link, Money::from_major(1), PaymentMethod::Cash)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_installment_bounds() {
        let settings = settings();
        let coordinator = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "FRIDGE", 1000, 700, 1)]);
        open_shift(&mut state, CASHIER, Money::zero());
        let created = coordinator.create_layaway(&state, request(&state, 1000, 300)).unwrap();
        let link = InstrumentRef::Layaway(created.record.id.clone());
        state.commit(created.changes).unwrap();

        let err = coordinator
            .add_installment(&state, CASHIER, &link, Money::zero(), PaymentMethod::Cash)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = coordinator
            .add_installment(&state, CASHIER, &link, Money::from_major(701), PaymentMethod::Cash)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let partial = coordinator
            .add_installment(&state, CASHIER, &link, Money::from_major(200), PaymentMethod::MobileMoney)
            .unwrap();
        assert_eq!(partial.record.balance(), Money::from_major(500));
        assert!(!partial.record.is_completed());
    }

    #[test]
    fn test_failed_deposit_creates_nothing() {
        let settings = settings();
        let coordinator = DeferredPaymentCoordinator::new(&settings);
        let state = state_with(vec![product("p-1", "TV", 1000, 700, 1)]);

        // No shift open: the deposit sale is rejected
        let err = coordinator.create_layaway(&state, request(&state, 1000, 300)).unwrap_err();
        assert!(matches!(err, CoreError::NoActiveShift { .. }));

        let err = {
            let mut state = state.clone();
            open_shift(&mut state, CASHIER, Money::zero());
            coordinator.create_layaway(&state, request(&state, 1000, 1200)).unwrap_err()
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_cancel_only_active() {
        let settings = settings();
        let coordinator = DeferredPaymentCoordinator::new(&settings);
        let mut state = state_with(vec![product("p-1", "TV", 1000, 700, 1)]);
        open_shift(&mut state, CASHIER, Money::zero());
        let created = coordinator.create_layaway(&state, request(&state, 500, 500)).unwrap();
        assert_eq!(created.record.status, LayawayStatus::Completed);
        state.commit(created.changes.clone()).unwrap();

        let err = coordinator.cancel_layaway(&state, &created.record.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
