//! # Ledger
//!
//! Chart of accounts plus an append-only journal of balanced transactions.
//!
//! ## Posting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Journal Posting                                  │
//! │                                                                         │
//! │  entries ──► prepare() ──┬── empty / negative / both sides? Validation │
//! │                          ├── unknown account?            NotFound      │
//! │                          ├── Σdebit != Σcredit?          LedgerImbalance│
//! │                          ▼                                              │
//! │                 AccountingTransaction (immutable)                       │
//! │                          │                                              │
//! │                          ▼                                              │
//! │                  append() ── revalidate ──► journal.push()              │
//! │                                                                         │
//! │  Nothing is ever edited or deleted. Mistakes are corrected with        │
//! │  reverse(), which posts the mirror image as a new transaction.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Balance Sign Convention
//! | Account type                                   | Balance            |
//! |------------------------------------------------|--------------------|
//! | Assets, Expenses                               | Σdebit − Σcredit   |
//! | Liabilities, Equity, Revenue, Contra-Revenue   | Σcredit − Σdebit   |

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_description;

// =============================================================================
// Accounts
// =============================================================================

/// Top-level classification of a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Assets,
    Liabilities,
    Equity,
    Revenue,
    Expenses,
    ContraRevenue,
}

impl AccountType {
    /// True when the balance grows with debits.
    pub fn is_debit_normal(&self) -> bool {
        match self {
            AccountType::Assets | AccountType::Expenses => true,
            AccountType::Liabilities
            | AccountType::Equity
            | AccountType::Revenue
            | AccountType::ContraRevenue => false,
        }
    }

    /// Applies the sign convention to raw totals.
    pub fn balance(&self, debits: Money, credits: Money) -> Money {
        if self.is_debit_normal() {
            debits - credits
        } else {
            credits - debits
        }
    }
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Account {
    /// Account code, also used as the identifier (e.g. "1000").
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Account {
            id: id.into(),
            name: name.into(),
            account_type,
        }
    }
}

/// The set of accounts journal entries may post to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<String, Account>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        ChartOfAccounts::default()
    }

    /// Default retail chart. Ids match `LedgerAccounts::default()`.
    pub fn standard() -> Self {
        let accounts = [
            ("1000", "Cash on Hand", AccountType::Assets),
            ("1010", "Mobile Money", AccountType::Assets),
            ("1020", "Bank", AccountType::Assets),
            ("1200", "Inventory", AccountType::Assets),
            ("2000", "Accounts Payable", AccountType::Liabilities),
            ("2100", "VAT Payable", AccountType::Liabilities),
            ("3000", "Owner's Equity", AccountType::Equity),
            ("4000", "Sales Revenue", AccountType::Revenue),
            ("4100", "Sales Returns and Discounts", AccountType::ContraRevenue),
            ("5000", "Cost of Goods Sold", AccountType::Expenses),
            ("6000", "General Expenses", AccountType::Expenses),
            ("6100", "Rent", AccountType::Expenses),
            ("6200", "Utilities", AccountType::Expenses),
            ("6300", "Salaries and Wages", AccountType::Expenses),
            ("6400", "Transport", AccountType::Expenses),
        ];

        ChartOfAccounts {
            accounts: accounts
                .into_iter()
                .map(|(id, name, account_type)| (id.to_string(), Account::new(id, name, account_type)))
                .collect(),
        }
    }

    /// Builds a chart from stored accounts.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        ChartOfAccounts {
            accounts: accounts.into_iter().map(|a| (a.id.clone(), a)).collect(),
        }
    }

    /// Adds an account; ids are unique.
    pub fn add_account(&mut self, account: Account) -> CoreResult<()> {
        validate_description("account name", &account.name)?;
        if self.accounts.contains_key(&account.id) {
            return Err(ValidationError::Duplicate {
                field: "account id".to_string(),
                value: account.id,
            }
            .into());
        }
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn get(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn require(&self, account_id: &str) -> CoreResult<&Account> {
        self.get(account_id)
            .ok_or_else(|| CoreError::not_found("Account", account_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

// =============================================================================
// Journal
// =============================================================================

/// What business event a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    Expense,
    Reversal,
    Adjustment,
}

/// One side of a posting. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalLine {
    pub account_id: String,
    pub debit: Money,
    pub credit: Money,
}

impl JournalLine {
    pub fn debit(account_id: impl Into<String>, amount: Money) -> Self {
        JournalLine {
            account_id: account_id.into(),
            debit: amount,
            credit: Money::zero(),
        }
    }

    pub fn credit(account_id: impl Into<String>, amount: Money) -> Self {
        JournalLine {
            account_id: account_id.into(),
            debit: Money::zero(),
            credit: amount,
        }
    }

    fn mirrored(&self) -> Self {
        JournalLine {
            account_id: self.account_id.clone(),
            debit: self.credit,
            credit: self.debit,
        }
    }
}

/// An immutable, balanced set of journal lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountingTransaction {
    pub id: String,
    pub description: String,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub entries: Vec<JournalLine>,
    /// Set on reversals: the transaction being undone.
    pub reverses: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl AccountingTransaction {
    pub fn total_debits(&self) -> Money {
        self.entries.iter().map(|e| e.debit).sum()
    }

    pub fn total_credits(&self) -> Money {
        self.entries.iter().map(|e| e.credit).sum()
    }
}

/// One row of a trial balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceRow {
    pub account_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub debits: Money,
    pub credits: Money,
    pub balance: Money,
}

// =============================================================================
// Ledger
// =============================================================================

/// The ledger service: chart of accounts plus append-only journal.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    chart: ChartOfAccounts,
    journal: Vec<AccountingTransaction>,
    /// Transaction id → position in `journal`.
    index: HashMap<String, usize>,
}

impl Ledger {
    pub fn new(chart: ChartOfAccounts) -> Self {
        Ledger {
            chart,
            journal: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuilds a ledger from persisted records, revalidating every entry.
    pub fn restore(
        chart: ChartOfAccounts,
        transactions: impl IntoIterator<Item = AccountingTransaction>,
    ) -> CoreResult<Self> {
        let mut ledger = Ledger::new(chart);
        for tx in transactions {
            ledger.append(tx)?;
        }
        Ok(ledger)
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut ChartOfAccounts {
        &mut self.chart
    }

    pub fn transactions(&self) -> &[AccountingTransaction] {
        &self.journal
    }

    pub fn transaction(&self, id: &str) -> Option<&AccountingTransaction> {
        self.index.get(id).map(|&pos| &self.journal[pos])
    }

    /// Builds and validates a transaction without writing it.
    pub fn prepare(
        &self,
        description: &str,
        reference_id: &str,
        reference_type: ReferenceType,
        entries: Vec<JournalLine>,
    ) -> CoreResult<AccountingTransaction> {
        validate_description("description", description)?;

        let tx = AccountingTransaction {
            id: Uuid::new_v4().to_string(),
            description: description.trim().to_string(),
            reference_id: reference_id.to_string(),
            reference_type,
            entries,
            reverses: None,
            created_at: Utc::now(),
        };

        self.validate(&tx)?;
        Ok(tx)
    }

    /// Validates a prepared transaction and appends it.
    ///
    /// Validation and append happen under the same `&mut self` borrow, so
    /// no other posting can interleave between them.
    pub fn append(&mut self, tx: AccountingTransaction) -> CoreResult<String> {
        self.validate(&tx)?;

        let id = tx.id.clone();
        info!(
            transaction_id = %id,
            reference_id = %tx.reference_id,
            reference_type = ?tx.reference_type,
            amount = %tx.total_debits(),
            "Journal entry posted"
        );
        self.index.insert(tx.id.clone(), self.journal.len());
        self.journal.push(tx);
        Ok(id)
    }

    /// Validates and appends a new transaction, returning its id.
    pub fn post(
        &mut self,
        description: &str,
        reference_id: &str,
        reference_type: ReferenceType,
        entries: Vec<JournalLine>,
    ) -> CoreResult<String> {
        let tx = self.prepare(description, reference_id, reference_type, entries)?;
        self.append(tx)
    }

    /// Builds the mirror image of an existing transaction.
    pub fn prepare_reversal(
        &self,
        transaction_id: &str,
        reason: &str,
    ) -> CoreResult<AccountingTransaction> {
        let original = self
            .transaction(transaction_id)
            .ok_or_else(|| CoreError::not_found("Transaction", transaction_id))?;

        if original.reference_type == ReferenceType::Reversal {
            return Err(CoreError::invalid_state(
                "Transaction",
                transaction_id,
                ReferenceType::Reversal,
                "reverse a reversal",
            ));
        }
        if self
            .journal
            .iter()
            .any(|tx| tx.reverses.as_deref() == Some(transaction_id))
        {
            return Err(CoreError::InvalidState {
                entity: "Transaction",
                id: transaction_id.to_string(),
                current: "Reversed".to_string(),
                action: "reverse twice",
            });
        }

        let mut tx = self.prepare(
            reason,
            transaction_id,
            ReferenceType::Reversal,
            original.entries.iter().map(JournalLine::mirrored).collect(),
        )?;
        tx.reverses = Some(transaction_id.to_string());
        Ok(tx)
    }

    /// Posts a reversing entry for `transaction_id`.
    pub fn reverse(&mut self, transaction_id: &str, reason: &str) -> CoreResult<String> {
        let tx = self.prepare_reversal(transaction_id, reason)?;
        self.append(tx)
    }

    /// Folds all entries for one account under its sign convention.
    pub fn account_balance(&self, account_id: &str) -> CoreResult<Money> {
        let account = self.chart.require(account_id)?;
        let (debits, credits) = self.totals_for(account_id);
        Ok(account.account_type.balance(debits, credits))
    }

    /// Every account with its raw totals and balance.
    pub fn trial_balance(&self) -> Vec<TrialBalanceRow> {
        self.chart
            .iter()
            .map(|account| {
                let (debits, credits) = self.totals_for(&account.id);
                TrialBalanceRow {
                    account_id: account.id.clone(),
                    name: account.name.clone(),
                    account_type: account.account_type,
                    debits,
                    credits,
                    balance: account.account_type.balance(debits, credits),
                }
            })
            .collect()
    }

    fn totals_for(&self, account_id: &str) -> (Money, Money) {
        self.journal
            .iter()
            .flat_map(|tx| tx.entries.iter())
            .filter(|e| e.account_id == account_id)
            .fold((Money::zero(), Money::zero()), |(d, c), e| {
                (d + e.debit, c + e.credit)
            })
    }

    /// Checks a transaction against the posting rules without appending it.
    pub fn validate(&self, tx: &AccountingTransaction) -> CoreResult<()> {
        if self.transaction(&tx.id).is_some() {
            return Err(ValidationError::Duplicate {
                field: "transaction id".to_string(),
                value: tx.id.clone(),
            }
            .into());
        }

        if tx.entries.is_empty() {
            return Err(ValidationError::Required {
                field: "journal entries".to_string(),
            }
            .into());
        }

        for line in &tx.entries {
            if line.debit.is_negative() || line.credit.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: format!("journal line for {}", line.account_id),
                }
                .into());
            }
            if line.debit.is_zero() == line.credit.is_zero() {
                return Err(ValidationError::Invalid {
                    field: format!("journal line for {}", line.account_id),
                    reason: "exactly one of debit or credit must be set".to_string(),
                }
                .into());
            }
            self.chart.require(&line.account_id)?;
        }

        let debits = tx.total_debits();
        let credits = tx.total_credits();
        if debits != credits {
            error!(
                reference_id = %tx.reference_id,
                reference_type = ?tx.reference_type,
                debits = %debits,
                credits = %credits,
                "Rejected unbalanced journal entry"
            );
            return Err(CoreError::LedgerImbalance { debits, credits });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ledger() -> Ledger {
        let mut chart = ChartOfAccounts::standard();
        chart
            .add_account(Account::new("2500", "Customer Loans", AccountType::Liabilities))
            .unwrap();
        Ledger::new(chart)
    }

    fn m(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_post_balanced_transaction() {
        let mut ledger = ledger();
        let id = ledger
            .post(
                "Owner capital",
                "cap-1",
                ReferenceType::Adjustment,
                vec![
                    JournalLine::debit("1000", m(100_000)),
                    JournalLine::credit("3000", m(100_000)),
                ],
            )
            .unwrap();

        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(ledger.transaction(&id).unwrap().total_credits(), m(100_000));
        assert_eq!(ledger.account_balance("1000").unwrap(), m(100_000));
        assert_eq!(ledger.account_balance("3000").unwrap(), m(100_000));
    }

    #[test]
    fn test_unbalanced_post_leaves_journal_untouched() {
        let mut ledger = ledger();
        let err = ledger
            .post(
                "Broken",
                "x",
                ReferenceType::Adjustment,
                vec![
                    JournalLine::debit("1000", m(10_000)),
                    JournalLine::credit("4000", m(9_999)),
                ],
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LedgerImbalance);
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_balance_sign_convention() {
        // Same entries: debit 500, credit 100
        let mut ledger = ledger();
        for account in ["1000", "2500"] {
            ledger
                .post(
                    "debit side",
                    "t",
                    ReferenceType::Adjustment,
                    vec![
                        JournalLine::debit(account, m(50_000)),
                        JournalLine::credit("3000", m(50_000)),
                    ],
                )
                .unwrap();
            ledger
                .post(
                    "credit side",
                    "t",
                    ReferenceType::Adjustment,
                    vec![
                        JournalLine::debit("3000", m(10_000)),
                        JournalLine::credit(account, m(10_000)),
                    ],
                )
                .unwrap();
        }

        assert_eq!(ledger.account_balance("1000").unwrap(), m(40_000));
        assert_eq!(ledger.account_balance("2500").unwrap(), m(-40_000));
    }

    #[test]
    fn test_rejects_unknown_account() {
        let ledger = ledger();
        let err = ledger
            .prepare(
                "x",
                "x",
                ReferenceType::Adjustment,
                vec![
                    JournalLine::debit("9999", m(1)),
                    JournalLine::credit("1000", m(1)),
                ],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rejects_malformed_lines() {
        let ledger = ledger();
        let both_zero = vec![JournalLine::debit("1000", Money::zero())];
        assert!(ledger
            .prepare("x", "x", ReferenceType::Adjustment, both_zero)
            .is_err());
        assert!(ledger
            .prepare("x", "x", ReferenceType::Adjustment, Vec::new())
            .is_err());
    }

    #[test]
    fn test_reverse_restores_balances_once() {
        let mut ledger = ledger();
        let id = ledger
            .post(
                "Wrong expense",
                "e-1",
                ReferenceType::Expense,
                vec![
                    JournalLine::debit("6100", m(5_000)),
                    JournalLine::credit("1000", m(5_000)),
                ],
            )
            .unwrap();

        let reversal_id = ledger.reverse(&id, "Posted to wrong account").unwrap();
        assert_eq!(ledger.account_balance("6100").unwrap(), Money::zero());
        assert_eq!(ledger.account_balance("1000").unwrap(), Money::zero());
        assert_eq!(
            ledger.transaction(&reversal_id).unwrap().reverses.as_deref(),
            Some(id.as_str())
        );

        assert!(ledger.reverse(&id, "again").is_err());
        assert!(ledger.reverse(&reversal_id, "undo undo").is_err());
        assert_eq!(ledger.transactions().len(), 2);
    }

    #[test]
    fn test_restore_and_trial_balance() {
        let mut source = ledger();
        source
            .post(
                "Capital",
                "c",
                ReferenceType::Adjustment,
                vec![
                    JournalLine::debit("1020", m(7_000)),
                    JournalLine::credit("3000", m(7_000)),
                ],
            )
            .unwrap();

        let restored = Ledger::restore(
            source.chart().clone(),
            source.transactions().to_vec(),
        )
        .unwrap();
        let rows = restored.trial_balance();
        let total_debits: Money = rows.iter().map(|r| r.debits).sum();
        let total_credits: Money = rows.iter().map(|r| r.credits).sum();
        assert_eq!(total_debits, total_credits);
        let bank = rows.iter().find(|r| r.account_id == "1020").unwrap();
        assert_eq!(bank.balance, m(7_000));
    }

    #[test]
    fn test_restore_long_journal_indexes_every_id() {
        let mut source = ledger();
        for i in 0..5_000 {
            source
                .post(
                    "Till top-up",
                    &format!("t-{}", i),
                    ReferenceType::Adjustment,
                    vec![
                        JournalLine::debit("1000", m(100)),
                        JournalLine::credit("3000", m(100)),
                    ],
                )
                .unwrap();
        }
        let journal = source.transactions().to_vec();

        let restored = Ledger::restore(source.chart().clone(), journal.clone()).unwrap();
        assert_eq!(restored.transactions().len(), 5_000);
        assert_eq!(restored.transaction(&journal[4_321].id), Some(&journal[4_321]));
        assert_eq!(restored.account_balance("1000").unwrap(), m(500_000));

        let mut twice = journal;
        twice.push(twice[17].clone());
        let err = Ledger::restore(source.chart().clone(), twice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(restored.transaction("missing").is_none());
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let mut chart = ChartOfAccounts::standard();
        let err = chart
            .add_account(Account::new("1000", "Petty Cash", AccountType::Assets))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
