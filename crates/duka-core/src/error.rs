//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  duka-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule and state failures               │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  duka-db errors (separate crate)                                       │
//! │  └── DbError          - Persistence failures (wraps CoreError)         │
//! │                                                                         │
//! │  Every CoreError maps onto one ErrorKind:                              │
//! │    Validation │ State │ LedgerImbalance │ NotFound │                   │
//! │    InsufficientFunds │ InsufficientStock                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//! All errors are returned to the immediate caller. Nothing in the core
//! retries. `LedgerImbalance` is the only fatal kind: it signals a defect,
//! never user input, and the enclosing operation is abandoned whole.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the user can correct it and retry.
    Validation,
    /// The operation is not allowed in the current lifecycle state.
    State,
    /// Debits and credits disagree. Fatal.
    LedgerImbalance,
    /// A referenced record does not exist.
    NotFound,
    /// A funding source cannot cover the amount.
    InsufficientFunds,
    /// Not enough unreserved stock to complete the sale.
    InsufficientStock,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist in the snapshot.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The cashier has no open shift.
    ///
    /// ## When This Occurs
    /// - Completing a sale before `start_shift`
    /// - Recording a drawer expense after `end_shift`
    #[error("No active shift for user {user_id}")]
    NoActiveShift { user_id: String },

    /// A second shift was started while one is still open.
    #[error("User {user_id} already has an active shift ({shift_id})")]
    ShiftAlreadyActive { user_id: String, shift_id: String },

    /// A lifecycle transition was attempted from the wrong state.
    ///
    /// ## When This Occurs
    /// - Completing a sales order that is not `Received`
    /// - Adding an installment to a completed layaway
    /// - Cancelling a sales order that has already been received
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidState {
        entity: &'static str,
        id: String,
        current: String,
        action: &'static str,
    },

    /// Debits and credits of a journal entry set disagree.
    #[error("Ledger imbalance: debits {debits} != credits {credits}")]
    LedgerImbalance { debits: Money, credits: Money },

    /// A funding source cannot cover the requested amount.
    #[error("Insufficient funds in {source_name}: available {available}, required {required}")]
    InsufficientFunds {
        source_name: String,
        available: Money,
        required: Money,
    },

    /// Not enough unreserved stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Complete sale (qty: 5)
    ///      │
    ///      ▼
    /// stock 7, reserved 4 → available 3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "SUGAR-2KG", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Reserved stock for a product does not cover an order being fulfilled.
    #[error("Reservation mismatch for {sku}: reserved {reserved}, releasing {requested}")]
    ReservationMismatch {
        sku: String,
        reserved: i64,
        requested: i64,
    },
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: impl Into<String>,
        current: impl std::fmt::Debug,
        action: &'static str,
    ) -> Self {
        CoreError::InvalidState {
            entity,
            id: id.into(),
            current: format!("{:?}", current),
            action,
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::NoActiveShift { .. }
            | CoreError::ShiftAlreadyActive { .. }
            | CoreError::InvalidState { .. }
            | CoreError::ReservationMismatch { .. } => ErrorKind::State,
            CoreError::LedgerImbalance { .. } => ErrorKind::LedgerImbalance,
            CoreError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
        }
    }

    /// True for errors that indicate a defect rather than bad input.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::LedgerImbalance
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Amount is larger than what it applies to.
    #[error("{field} of {amount} exceeds {limit}")]
    Exceeds {
        field: String,
        amount: Money,
        limit: Money,
    },

    /// Payments do not cover the amount due.
    #[error("Payments of {paid} do not cover total {total}")]
    Underpaid { paid: Money, total: Money },

    /// Change would have to come from a non-cash tender.
    #[error("Change of {change} exceeds cash tendered {cash}")]
    ChangeWithoutCash { change: Money, cash: Money },

    /// Invalid format or combination of values.
    #[error("{field} is invalid: {reason}")]
    Invalid { field: String, reason: String },

    /// Duplicate value (e.g., duplicate account id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "SUGAR-2KG".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SUGAR-2KG: available 3, requested 5"
        );

        let err = CoreError::LedgerImbalance {
            debits: Money::from_cents(10_000),
            credits: Money::from_cents(9_999),
        };
        assert_eq!(
            err.to_string(),
            "Ledger imbalance: debits 100.00 != credits 99.99"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::not_found("Product", "p-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::NoActiveShift {
                user_id: "u".into()
            }
            .kind(),
            ErrorKind::State
        );
        let imbalance = CoreError::LedgerImbalance {
            debits: Money::zero(),
            credits: Money::from_cents(1),
        };
        assert!(imbalance.is_fatal());
        assert!(!CoreError::not_found("Sale", "s").is_fatal());
    }

    #[test]
    fn test_invalid_state_message() {
        #[derive(Debug)]
        enum Status {
            Ordered,
        }
        let err = CoreError::invalid_state("SalesOrder", "so-1", Status::Ordered, "complete");
        assert_eq!(err.to_string(), "SalesOrder so-1 is Ordered, cannot complete");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::Required {
            field: "description".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
