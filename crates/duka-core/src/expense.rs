//! # Expense Recorder
//!
//! Money leaving the business outside a sale: drawer payouts, supplier
//! payments by mobile money or bank, and bills booked on account.
//!
//! ## Funding Rules
//! | Source        | Credits             | Precondition                          |
//! |---------------|---------------------|---------------------------------------|
//! | `CashDrawer`  | cash                | active shift, amount ≤ drawer cash    |
//! | `MobileMoney` | mobile money        | amount ≤ ledger balance               |
//! | `Bank`        | bank                | amount ≤ ledger balance               |
//! | `OnAccount`   | accounts payable    | none                                  |
//!
//! The debit side is always an `Expenses` account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ledger::{AccountType, JournalLine, ReferenceType};
use crate::money::Money;
use crate::settings::Settings;
use crate::shift::ShiftManager;
use crate::state::{Outcome, PosState, UnitOfWork};
use crate::validation::{validate_description, validate_id, validate_payment_amount};

/// Account used when the caller does not pick one.
pub const DEFAULT_EXPENSE_ACCOUNT: &str = "6000";

/// Where the money for an expense comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseSource {
    CashDrawer,
    MobileMoney,
    Bank,
    /// Owed to the supplier; paid later.
    OnAccount,
}

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Money,
    /// Expense account debited.
    pub account_id: String,
    pub source: ExpenseSource,
    pub shift_id: Option<String>,
    pub user_id: String,
    /// Supplier invoice, M-Pesa code, cheque number.
    pub reference: Option<String>,
    pub ledger_transaction_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input to [`ExpenseRecorder::record_expense`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRequest {
    pub user_id: String,
    pub description: String,
    pub amount: Money,
    pub account_id: String,
    pub source: ExpenseSource,
    pub reference: Option<String>,
}

impl ExpenseRequest {
    pub fn new(
        user_id: impl Into<String>,
        description: impl Into<String>,
        amount: Money,
        account_id: impl Into<String>,
        source: ExpenseSource,
    ) -> Self {
        ExpenseRequest {
            user_id: user_id.into(),
            description: description.into(),
            amount,
            account_id: account_id.into(),
            source,
            reference: None,
        }
    }

    /// A general expense paid from the drawer.
    pub fn cash(user_id: impl Into<String>, description: impl Into<String>, amount: Money) -> Self {
        ExpenseRequest::new(
            user_id,
            description,
            amount,
            DEFAULT_EXPENSE_ACCOUNT,
            ExpenseSource::CashDrawer,
        )
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Posts expenses against their funding source.
#[derive(Debug, Clone, Copy)]
pub struct ExpenseRecorder<'a> {
    settings: &'a Settings,
}

impl<'a> ExpenseRecorder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        ExpenseRecorder { settings }
    }

    fn funding_account(&self, source: ExpenseSource) -> &'a str {
        let accounts = &self.settings.accounts;
        match source {
            ExpenseSource::CashDrawer => &accounts.cash,
            ExpenseSource::MobileMoney => &accounts.mobile_money,
            ExpenseSource::Bank => &accounts.bank,
            ExpenseSource::OnAccount => &accounts.accounts_payable,
        }
    }

    pub fn record_expense(
        &self,
        state: &PosState,
        request: ExpenseRequest,
    ) -> CoreResult<Outcome<Expense>> {
        validate_id("user_id", &request.user_id)?;
        validate_description("description", &request.description)?;
        validate_payment_amount(request.amount)?;

        let account = state.ledger.chart().require(&request.account_id)?;
        if account.account_type != AccountType::Expenses {
            return Err(ValidationError::Invalid {
                field: "account_id".to_string(),
                reason: format!("{} is not an expense account", account.id),
            }
            .into());
        }

        let shifts = ShiftManager::new();
        let mut shift = match request.source {
            ExpenseSource::CashDrawer => Some(shifts.active_shift(state, &request.user_id)?.clone()),
            _ => state.active_shift_for(&request.user_id).cloned(),
        };

        let funding = self.funding_account(request.source);
        let available = match request.source {
            ExpenseSource::CashDrawer => match &shift {
                Some(s) => Some(shifts.drawer_cash(state, s)?),
                None => None,
            },
            ExpenseSource::MobileMoney | ExpenseSource::Bank => {
                Some(state.ledger.account_balance(funding)?)
            }
            ExpenseSource::OnAccount => None,
        };
        if let Some(available) = available {
            if request.amount > available {
                warn!(
                    source = ?request.source,
                    available = %available,
                    required = %request.amount,
                    "Expense exceeds available funds"
                );
                return Err(CoreError::InsufficientFunds {
                    source_name: format!("{:?}", request.source),
                    available,
                    required: request.amount,
                });
            }
        }

        let expense_id = Uuid::new_v4().to_string();
        let tx = state.ledger.prepare(
            &request.description,
            &expense_id,
            ReferenceType::Expense,
            vec![
                JournalLine::debit(&request.account_id, request.amount),
                JournalLine::credit(funding, request.amount),
            ],
        )?;

        let mut changes = UnitOfWork::new();
        if let Some(s) = shift.as_mut() {
            s.attach_expense(&expense_id)?;
            changes.put_shift(s.clone());
        }

        let expense = Expense {
            id: expense_id,
            description: request.description.trim().to_string(),
            amount: request.amount,
            account_id: request.account_id,
            source: request.source,
            shift_id: shift.map(|s| s.id),
            user_id: request.user_id,
            reference: request.reference,
            ledger_transaction_id: tx.id.clone(),
            created_at: Utc::now(),
        };

        info!(
            expense_id = %expense.id,
            amount = %expense.amount,
            source = ?expense.source,
            "Expense recorded"
        );

        changes.put_transaction(tx);
        changes.put_expense(expense.clone());
        Ok(Outcome::new(expense, changes))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
