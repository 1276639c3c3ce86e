//! Types module
//!
//! Contains the data structures shared by the stores, engines and I/O layer:
//! - `account`: customer accounts, balances and credit configuration
//! - `transaction`: ledger entries, their classification and posting requests
//! - `payment`: payment applications and allocation requests
//! - `dispute`: disputes and their resolution
//! - `command`: rows of the import CSV
//! - `error`: the ledger error type

pub mod account;
pub mod command;
pub mod dispute;
pub mod error;
pub mod payment;
pub mod transaction;

pub use account::{
    AccountStatus, BalanceSnapshot, CreditPolicy, CustomerAccount, CustomerId, PaymentTerms,
};
pub use command::{CommandKind, CommandRecord};
pub use dispute::{
    Communication, Dispute, DisputeId, DisputePriority, DisputeRequest, DisputeResolution,
    DisputeStatus, DisputeType, ResolveDispute,
};
pub use error::{LedgerError, LedgerResult};
pub use payment::{
    AppliedAllocation, ApplicationStatus, InvoiceAllocation, PaymentApplication,
    PaymentApplicationId, PaymentRequest,
};
pub use transaction::{
    Aging, AgingBucket, LedgerEntry, LineItem, PostingRequest, Reference, TransactionId,
    TransactionStatus, TransactionType,
};
