//! # Unit-of-Work Persistence
//!
//! Writes everything one core operation produced, or nothing.
//!
//! ## Write Order
//! ```text
//!  BEGIN
//!    products ──► customers ──► accounting_transactions ──► sales
//!      ──► expenses ──► layaways ──► work_orders ──► sales_orders ──► shifts
//!  COMMIT            (any failure: ROLLBACK, later steps never run)
//! ```
//!
//! Stock lands before the journal entry and the journal entry before the
//! shift, so a reader that stops early never sees a shift pointing at a
//! sale whose posting is missing.

use std::collections::HashMap;

use duka_core::deferred::{Layaway, SalesOrder, WorkOrder};
use duka_core::ledger::{Account, AccountingTransaction, ChartOfAccounts, Ledger};
use duka_core::{Customer, Expense, PosState, Product, Sale, Shift, UnitOfWork};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::collection::{write_record, Record};

async fn write_all<R: Record>(conn: &mut SqliteConnection, records: &[R]) -> DbResult<()> {
    for record in records {
        write_record(conn, record).await?;
    }
    if !records.is_empty() {
        debug!(collection = R::COLLECTION, count = records.len(), "Collection step written");
    }
    Ok(())
}

impl Database {
    /// Persists a unit of work inside one SQLite transaction.
    ///
    /// ## Errors
    /// The first failing write aborts the transaction and is returned as is.
    /// A ledger transaction id that is already stored fails with
    /// `DbError::UniqueViolation`.
    pub async fn persist(&self, changes: &UnitOfWork) -> DbResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let written = async {
            write_all(&mut *tx, &changes.products).await?;
            write_all(&mut *tx, &changes.customers).await?;
            write_all(&mut *tx, &changes.transactions).await?;
            write_all(&mut *tx, &changes.sales).await?;
            write_all(&mut *tx, &changes.expenses).await?;
            write_all(&mut *tx, &changes.layaways).await?;
            write_all(&mut *tx, &changes.work_orders).await?;
            write_all(&mut *tx, &changes.sales_orders).await?;
            write_all(&mut *tx, &changes.shifts).await
        }
        .await;

        if let Err(e) = written {
            warn!(error = %e, "Unit of work rejected, rolling back");
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            products = changes.products.len(),
            transactions = changes.transactions.len(),
            sales = changes.sales.len(),
            shifts = changes.shifts.len(),
            "Unit of work persisted"
        );
        Ok(())
    }

    /// Stores every account of a chart.
    pub async fn save_chart(&self, chart: &ChartOfAccounts) -> DbResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        for account in chart.iter() {
            write_record(&mut *tx, account).await?;
        }
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(accounts = chart.len(), "Chart of accounts saved");
        Ok(())
    }

    /// Rebuilds the in-memory snapshot from the store.
    ///
    /// Falls back to the standard chart when no accounts are stored. The
    /// journal is replayed in write order and revalidated; a stored entry
    /// the ledger rejects fails the load with `DbError::Core`.
    pub async fn load_state(&self) -> DbResult<PosState> {
        let accounts = self.collection::<Account>().get_all().await?;
        let chart = if accounts.is_empty() {
            ChartOfAccounts::standard()
        } else {
            ChartOfAccounts::from_accounts(accounts)
        };

        let journal = self.collection::<AccountingTransaction>().get_all().await?;
        let mut state = PosState::new(chart.clone());
        state.ledger = Ledger::restore(chart, journal)?;

        state.products = keyed(self.collection::<Product>().get_all().await?);
        state.customers = keyed(self.collection::<Customer>().get_all().await?);
        state.sales = keyed(self.collection::<Sale>().get_all().await?);
        state.shifts = keyed(self.collection::<Shift>().get_all().await?);
        state.expenses = keyed(self.collection::<Expense>().get_all().await?);
        state.layaways = keyed(self.collection::<Layaway>().get_all().await?);
        state.work_orders = keyed(self.collection::<WorkOrder>().get_all().await?);
        state.sales_orders = keyed(self.collection::<SalesOrder>().get_all().await?);

        info!(
            products = state.products.len(),
            sales = state.sales.len(),
            transactions = state.ledger.transactions().len(),
            "State loaded"
        );
        Ok(state)
    }
}

fn keyed<R: Record>(records: Vec<R>) -> HashMap<String, R> {
    records
        .into_iter()
        .map(|r| (r.record_id().to_string(), r))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
