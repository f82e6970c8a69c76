//! # duka-core: Transactional Core for Duka POS
//!
//! Everything that turns carts and payments into durable facts: sales,
//! stock movements, drawer shifts, expenses, deferred-payment instruments
//! and balanced ledger postings. Pure, synchronous logic with no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Duka POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Presentation (UI / CLI, outside workspace)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ requests                               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   DeferredPaymentCoordinator ──► SaleEngine ──► Ledger          │   │
//! │  │            │                        │                           │   │
//! │  │            └──────► ShiftManager ◄──┘    ExpenseRecorder ──►    │   │
//! │  │                                                                 │   │
//! │  │   every operation: &PosState ──► Outcome { record, UnitOfWork } │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ UnitOfWork                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    duka-db (SQLite store)                       │   │
//! │  │         collection records, ordered transactional persist       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point)
//! - [`types`] - Products, customers, payments, sales
//! - [`ledger`] - Chart of accounts and append-only journal
//! - [`cart`] - Cart lines and totals
//! - [`sale`] - Sale completion
//! - [`shift`] - Cash-drawer shifts and reconciliation
//! - [`expense`] - Expenses against a funding source
//! - [`deferred`] - Layaways, work orders, sales orders
//! - [`state`] - Snapshot, unit of work, commit boundary
//! - [`receipt`] - Printer-facing receipt view
//! - [`settings`], [`validation`], [`error`]
//!
//! ## Example Usage
//!
//! ```rust
//! use duka_core::money::Money;
//! use duka_core::types::TaxRate;
//!
//! // Shelf price 200.00 including 16% VAT
//! let (net, vat) = Money::from_cents(20_000).split_inclusive(TaxRate::from_bps(1600));
//! assert_eq!(net.cents(), 17_241);
//! assert_eq!(vat.cents(), 2_759);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod deferred;
pub mod error;
pub mod expense;
pub mod ledger;
pub mod money;
pub mod receipt;
pub mod sale;
pub mod settings;
pub mod shift;
pub mod state;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{compute_totals, CartDiscount, CartItem, SaleTotals};
pub use deferred::{DeferredPaymentCoordinator, Instrument, PaymentSchedule};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use expense::{Expense, ExpenseRecorder, ExpenseRequest, ExpenseSource};
pub use ledger::{AccountType, ChartOfAccounts, JournalLine, Ledger, ReferenceType};
pub use money::Money;
pub use receipt::{Receipt, ReceiptPrinter};
pub use sale::{SaleContext, SaleEngine, SaleKind, SaleRequest};
pub use settings::Settings;
pub use shift::{Shift, ShiftManager, ShiftReport, ShiftStatus};
pub use state::{Outcome, PosState, SharedPos, UnitOfWork};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Customer id used for anonymous sales. Walk-ins never earn points.
pub const WALK_IN_CUSTOMER_ID: &str = "walk-in";

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;
