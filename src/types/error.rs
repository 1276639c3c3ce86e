//! Error types for the customer ledger
//!
//! This module defines every error a ledger operation can report. Callers are
//! expected to branch on the variant rather than on the message text.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: customer, ledger entry, dispute or payment application not found
//! - **State Errors**: operation not allowed in the entity's current status
//! - **Validation Errors**: malformed amounts, mismatched owners, bad parameters
//! - **Credit Errors**: purchase would exceed the customer's credit limit
//! - **Concurrency Errors**: the customer's balances changed between read and write
//! - **Infrastructure Errors**: configuration, file I/O and CSV parsing

use super::account::CustomerId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the customer ledger
///
/// Each variant carries enough context to log a useful message. Every
/// balance-affecting operation is all-or-nothing: when one of these errors is
/// returned, no partial ledger entry or balance mutation has been persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity ("customer", "transaction", "dispute", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The operation is not allowed in the entity's current state
    ///
    /// Examples: reversing an already reversed entry, resolving a resolved
    /// dispute, approving an entry that is not a draft.
    #[error("Cannot {operation} {entity} {id}: {reason}")]
    InvalidState {
        /// Kind of entity
        entity: &'static str,
        /// Identifier of the entity
        id: String,
        /// Operation that was attempted
        operation: String,
        /// Why the current state forbids it
        reason: String,
    },

    /// Input failed validation
    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed {
        /// Name of the offending field
        field: String,
        /// Human readable explanation
        reason: String,
    },

    /// The requested purchase would push the balance past the credit limit
    #[error("Credit limit exceeded for customer {customer}: balance {current_balance}, requested {requested}, limit {credit_limit}")]
    CreditLimitExceeded {
        /// Customer ID
        customer: CustomerId,
        /// Current balance (pending minus advance)
        current_balance: Decimal,
        /// Amount of the attempted purchase
        requested: Decimal,
        /// Configured credit limit
        credit_limit: Decimal,
    },

    /// The customer's balances were modified by someone else since they were read
    ///
    /// Nothing was written. The caller may reload the customer and retry.
    #[error("Concurrent modification of customer {customer}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Customer ID
        customer: CustomerId,
        /// Version the writer loaded
        expected: u64,
        /// Version found at write time
        actual: u64,
    },

    /// An identifier or import label is already taken
    #[error("Duplicate {entity} {id}")]
    Duplicate {
        /// Kind of entity
        entity: &'static str,
        /// Identifier that collided
        id: String,
    },

    /// Decimal arithmetic overflowed
    #[error("Arithmetic overflow in {operation} for customer {customer}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Customer ID
        customer: CustomerId,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

/// Convenience alias used throughout the engines
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(error: toml::de::Error) -> Self {
        LedgerError::Config {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a NotFound error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(
        entity: &'static str,
        id: impl ToString,
        operation: &str,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::InvalidState {
            entity,
            id: id.to_string(),
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a ValidationFailed error
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::ValidationFailed {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a CreditLimitExceeded error
    pub fn credit_limit_exceeded(
        customer: CustomerId,
        current_balance: Decimal,
        requested: Decimal,
        credit_limit: Decimal,
    ) -> Self {
        LedgerError::CreditLimitExceeded {
            customer,
            current_balance,
            requested,
            credit_limit,
        }
    }

    /// Create a ConcurrencyConflict error
    pub fn concurrency_conflict(customer: CustomerId, expected: u64, actual: u64) -> Self {
        LedgerError::ConcurrencyConflict {
            customer,
            expected,
            actual,
        }
    }

    /// Create a Duplicate error
    pub fn duplicate(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::Duplicate {
            entity,
            id: id.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, customer: CustomerId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            customer,
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }

    /// True when the error is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::not_found(
        LedgerError::NotFound { entity: "customer", id: "42".to_string() },
        "customer 42 not found"
    )]
    #[case::invalid_state(
        LedgerError::InvalidState {
            entity: "transaction",
            id: "INV-1".to_string(),
            operation: "reverse".to_string(),
            reason: "already reversed".to_string(),
        },
        "Cannot reverse transaction INV-1: already reversed"
    )]
    #[case::validation(
        LedgerError::ValidationFailed { field: "net_amount".to_string(), reason: "must be positive".to_string() },
        "Validation failed for net_amount: must be positive"
    )]
    #[case::credit_limit(
        LedgerError::CreditLimitExceeded {
            customer: 7,
            current_balance: Decimal::new(60000, 2),
            requested: Decimal::new(50000, 2),
            credit_limit: Decimal::new(100000, 2),
        },
        "Credit limit exceeded for customer 7: balance 600.00, requested 500.00, limit 1000.00"
    )]
    #[case::conflict(
        LedgerError::ConcurrencyConflict { customer: 3, expected: 4, actual: 5 },
        "Concurrent modification of customer 3: expected version 4, found 5"
    )]
    #[case::duplicate(
        LedgerError::Duplicate { entity: "label", id: "inv-1".to_string() },
        "Duplicate label inv-1"
    )]
    #[case::overflow(
        LedgerError::ArithmeticOverflow { operation: "invoice".to_string(), customer: 1 },
        "Arithmetic overflow in invoice for customer 1"
    )]
    #[case::parse_error_with_line(
        LedgerError::Parse { line: Some(42), message: "Invalid field".to_string() },
        "CSV parse error at line 42: Invalid field"
    )]
    #[case::parse_error_without_line(
        LedgerError::Parse { line: None, message: "Invalid field".to_string() },
        "CSV parse error: Invalid field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::not_found(
        LedgerError::not_found("dispute", 9),
        LedgerError::NotFound { entity: "dispute", id: "9".to_string() }
    )]
    #[case::invalid_state(
        LedgerError::invalid_state("dispute", "DSP-1", "resolve", "already resolved"),
        LedgerError::InvalidState {
            entity: "dispute",
            id: "DSP-1".to_string(),
            operation: "resolve".to_string(),
            reason: "already resolved".to_string(),
        }
    )]
    #[case::conflict(
        LedgerError::concurrency_conflict(1, 2, 3),
        LedgerError::ConcurrencyConflict { customer: 1, expected: 2, actual: 3 }
    )]
    fn test_helper_functions(#[case] result: LedgerError, #[case] expected: LedgerError) {
        assert_eq!(result, expected);
    }

    #[test]
    fn test_is_conflict() {
        assert!(LedgerError::concurrency_conflict(1, 1, 2).is_conflict());
        assert!(!LedgerError::not_found("customer", 1).is_conflict());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::Io { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: Result<toml::Value, _> = toml::from_str("not = [valid");
        let error: LedgerError = parse.unwrap_err().into();
        assert!(matches!(error, LedgerError::Config { .. }));
    }
}
