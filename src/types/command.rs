//! Imported ledger commands
//!
//! One [`CommandRecord`] corresponds to one row of the import CSV. Records
//! name other entries by caller-chosen labels (`reference`, `target`) that
//! the ledger facade maps to generated identifiers.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::account::CustomerId;
use super::transaction::TransactionType;

/// Operation requested by an import row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Post a new entry of the given type
    Post(TransactionType),
    /// Record a payment and allocate it to invoices
    Payment,
    /// Fully reverse the target entry
    Reverse,
    /// Reverse part of the target invoice
    PartialReverse,
    /// Open a dispute against the target entry
    Dispute,
    /// Move the target dispute under review
    Review,
    /// Resolve the target dispute
    Resolve,
}

impl CommandKind {
    /// Kinds that require an amount column
    pub fn requires_amount(self) -> bool {
        matches!(
            self,
            CommandKind::Post(_)
                | CommandKind::Payment
                | CommandKind::PartialReverse
                | CommandKind::Dispute
        )
    }

    /// Kinds that operate on a previously labelled entry or dispute
    pub fn requires_target(self) -> bool {
        matches!(
            self,
            CommandKind::Reverse
                | CommandKind::PartialReverse
                | CommandKind::Dispute
                | CommandKind::Review
                | CommandKind::Resolve
        )
    }
}

/// One imported command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub kind: CommandKind,
    pub customer: CustomerId,
    /// Label given to the entry or dispute this command creates
    pub reference: Option<String>,
    /// Label of the entry or dispute this command acts on
    pub target: Option<String>,
    pub amount: Option<Decimal>,
    /// Transaction date; defaults to the ledger clock
    pub date: Option<NaiveDate>,
    /// Free-form argument: payment terms, reason, priority or resolution
    pub detail: Option<String>,
}
