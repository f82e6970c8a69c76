//! # State & Unit of Work
//!
//! The in-memory snapshot every service reads, and the write set every
//! mutating operation returns.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Single-Writer Commit                               │
//! │                                                                         │
//! │  caller ──► SharedPos::transact(|state| service.op(state, ...))        │
//! │                    │                                                    │
//! │                    │  lock ─────────────────────────────────┐          │
//! │                    ▼                                         │          │
//! │        op(&PosState) ──► Outcome { record, changes }        │          │
//! │                    │        (nothing mutated yet)            │          │
//! │                    ▼                                         │          │
//! │        PosState::commit(changes)                             │          │
//! │          1. validate every ledger transaction                │          │
//! │          2. reject writes to closed shifts                   │          │
//! │          3. apply: stock → ledger → documents → shifts       │          │
//! │                    │                                         │          │
//! │                    ▼  unlock ◄───────────────────────────────┘          │
//! │        Outcome returned; caller persists `changes` in the same order   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rejected operation returns before step 3, so a partially applied sale
//! can never be observed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::deferred::{Layaway, SalesOrder, WorkOrder};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::expense::Expense;
use crate::ledger::{AccountingTransaction, ChartOfAccounts, Ledger};
use crate::shift::{Shift, ShiftStatus};
use crate::types::{Customer, Product, Sale};

// =============================================================================
// Snapshot
// =============================================================================

/// Everything the core needs to evaluate an operation.
#[derive(Debug, Clone, Default)]
pub struct PosState {
    pub products: HashMap<String, Product>,
    pub customers: HashMap<String, Customer>,
    pub sales: HashMap<String, Sale>,
    pub shifts: HashMap<String, Shift>,
    pub expenses: HashMap<String, Expense>,
    pub layaways: HashMap<String, Layaway>,
    pub work_orders: HashMap<String, WorkOrder>,
    pub sales_orders: HashMap<String, SalesOrder>,
    pub ledger: Ledger,
}

impl PosState {
    /// Empty snapshot over the given chart of accounts.
    pub fn new(chart: ChartOfAccounts) -> Self {
        PosState {
            ledger: Ledger::new(chart),
            ..PosState::default()
        }
    }

    pub fn product(&self, id: &str) -> CoreResult<&Product> {
        self.products
            .get(id)
            .ok_or_else(|| CoreError::not_found("Product", id))
    }

    pub fn customer(&self, id: &str) -> CoreResult<&Customer> {
        self.customers
            .get(id)
            .ok_or_else(|| CoreError::not_found("Customer", id))
    }

    pub fn sale(&self, id: &str) -> CoreResult<&Sale> {
        self.sales
            .get(id)
            .ok_or_else(|| CoreError::not_found("Sale", id))
    }

    pub fn shift(&self, id: &str) -> CoreResult<&Shift> {
        self.shifts
            .get(id)
            .ok_or_else(|| CoreError::not_found("Shift", id))
    }

    pub fn expense(&self, id: &str) -> CoreResult<&Expense> {
        self.expenses
            .get(id)
            .ok_or_else(|| CoreError::not_found("Expense", id))
    }

    pub fn layaway(&self, id: &str) -> CoreResult<&Layaway> {
        self.layaways
            .get(id)
            .ok_or_else(|| CoreError::not_found("Layaway", id))
    }

    pub fn work_order(&self, id: &str) -> CoreResult<&WorkOrder> {
        self.work_orders
            .get(id)
            .ok_or_else(|| CoreError::not_found("WorkOrder", id))
    }

    pub fn sales_order(&self, id: &str) -> CoreResult<&SalesOrder> {
        self.sales_orders
            .get(id)
            .ok_or_else(|| CoreError::not_found("SalesOrder", id))
    }

    /// The open shift for `user_id`, if any.
    pub fn active_shift_for(&self, user_id: &str) -> Option<&Shift> {
        self.shifts
            .values()
            .find(|s| s.user_id == user_id && s.status == ShiftStatus::Active)
    }

    /// Applies a unit of work, or nothing at all.
    pub fn commit(&mut self, changes: UnitOfWork) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for tx in &changes.transactions {
            self.ledger.validate(tx)?;
            if !seen.insert(tx.id.as_str()) {
                return Err(ValidationError::Duplicate {
                    field: "transaction id".to_string(),
                    value: tx.id.clone(),
                }
                .into());
            }
        }

        for shift in &changes.shifts {
            if let Some(stored) = self.shifts.get(&shift.id) {
                if stored.status == ShiftStatus::Closed {
                    return Err(CoreError::invalid_state(
                        "Shift",
                        &shift.id,
                        ShiftStatus::Closed,
                        "modify",
                    ));
                }
            }
        }

        debug!(
            products = changes.products.len(),
            transactions = changes.transactions.len(),
            sales = changes.sales.len(),
            shifts = changes.shifts.len(),
            "Committing unit of work"
        );

        for product in changes.products {
            self.products.insert(product.id.clone(), product);
        }
        for customer in changes.customers {
            self.customers.insert(customer.id.clone(), customer);
        }
        for tx in changes.transactions {
            self.ledger.append(tx)?;
        }
        for sale in changes.sales {
            self.sales.insert(sale.id.clone(), sale);
        }
        for expense in changes.expenses {
            self.expenses.insert(expense.id.clone(), expense);
        }
        for layaway in changes.layaways {
            self.layaways.insert(layaway.id.clone(), layaway);
        }
        for order in changes.work_orders {
            self.work_orders.insert(order.id.clone(), order);
        }
        for order in changes.sales_orders {
            self.sales_orders.insert(order.id.clone(), order);
        }
        for shift in changes.shifts {
            self.shifts.insert(shift.id.clone(), shift);
        }

        Ok(())
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// Records to write for one logical operation.
///
/// Fields are listed in persistence order. Putting a record whose id is
/// already present replaces the earlier version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub transactions: Vec<AccountingTransaction>,
    pub sales: Vec<Sale>,
    pub expenses: Vec<Expense>,
    pub layaways: Vec<Layaway>,
    pub work_orders: Vec<WorkOrder>,
    pub sales_orders: Vec<SalesOrder>,
    pub shifts: Vec<Shift>,
}

fn upsert<T>(records: &mut Vec<T>, record: T, id: impl Fn(&T) -> &str) {
    match records.iter().position(|r| id(r) == id(&record)) {
        Some(i) => records[i] = record,
        None => records.push(record),
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        UnitOfWork::default()
    }

    pub fn put_product(&mut self, product: Product) {
        upsert(&mut self.products, product, |p| &p.id);
    }

    pub fn put_customer(&mut self, customer: Customer) {
        upsert(&mut self.customers, customer, |c| &c.id);
    }

    pub fn put_transaction(&mut self, tx: AccountingTransaction) {
        self.transactions.push(tx);
    }

    pub fn put_sale(&mut self, sale: Sale) {
        upsert(&mut self.sales, sale, |s| &s.id);
    }

    pub fn put_expense(&mut self, expense: Expense) {
        upsert(&mut self.expenses, expense, |e| &e.id);
    }

    pub fn put_layaway(&mut self, layaway: Layaway) {
        upsert(&mut self.layaways, layaway, |l| &l.id);
    }

    pub fn put_work_order(&mut self, order: WorkOrder) {
        upsert(&mut self.work_orders, order, |o| &o.id);
    }

    pub fn put_sales_order(&mut self, order: SalesOrder) {
        upsert(&mut self.sales_orders, order, |o| &o.id);
    }

    pub fn put_shift(&mut self, shift: Shift) {
        upsert(&mut self.shifts, shift, |s| &s.id);
    }

    /// Folds `other` into this unit; later versions of a record win.
    pub fn merge(&mut self, other: UnitOfWork) {
        other.products.into_iter().for_each(|r| self.put_product(r));
        other.customers.into_iter().for_each(|r| self.put_customer(r));
        other
            .transactions
            .into_iter()
            .for_each(|r| self.put_transaction(r));
        other.sales.into_iter().for_each(|r| self.put_sale(r));
        other.expenses.into_iter().for_each(|r| self.put_expense(r));
        other.layaways.into_iter().for_each(|r| self.put_layaway(r));
        other.work_orders.into_iter().for_each(|r| self.put_work_order(r));
        other
            .sales_orders
            .into_iter()
            .for_each(|r| self.put_sales_order(r));
        other.shifts.into_iter().for_each(|r| self.put_shift(r));
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.customers.is_empty()
            && self.transactions.is_empty()
            && self.sales.is_empty()
            && self.expenses.is_empty()
            && self.layaways.is_empty()
            && self.work_orders.is_empty()
            && self.sales_orders.is_empty()
            && self.shifts.is_empty()
    }
}

/// The result of a mutating operation: the primary record plus every write.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub record: T,
    pub changes: UnitOfWork,
}

impl<T> Outcome<T> {
    pub fn new(record: T, changes: UnitOfWork) -> Self {
        Outcome { record, changes }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            record: f(self.record),
            changes: self.changes,
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// Process-wide snapshot guarded by a mutex.
///
/// Uses `Arc<Mutex<PosState>>` so the compute step and the commit run under
/// one lock: two sales can never interleave between validation and append.
#[derive(Debug, Clone, Default)]
pub struct SharedPos {
    state: Arc<Mutex<PosState>>,
}

impl SharedPos {
    pub fn new(state: PosState) -> Self {
        SharedPos {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Executes a function with read access to the snapshot.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PosState) -> R,
    {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Computes an operation and commits its writes atomically.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let outcome = pos.transact(|state| engine.complete_sale(state, request))?;
    /// database.persist(&outcome.changes).await?;
    /// ```
    pub fn transact<F, T>(&self, f: F) -> CoreResult<Outcome<T>>
    where
        F: FnOnce(&PosState) -> CoreResult<Outcome<T>>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = f(&state)?;
        state.commit(outcome.changes.clone())?;
        Ok(outcome)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
