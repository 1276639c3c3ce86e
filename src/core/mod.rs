//! Core business logic module
//!
//! This module contains the ledger components, leaf to root:
//! - `clock` - Injected time source
//! - `traits` - Store abstractions the engines are generic over
//! - `account_store`, `transaction_store`, `dispute_store`, `payment_store` - In-memory stores
//! - `balance` - Pending / advance arithmetic
//! - `engine` - Posting, reversal, aging, reconciliation and statements
//! - `payment_application` - Allocating payments to invoices
//! - `credit_policy` - Credit checks, overdue suspension and scoring
//! - `dispute` - Dispute lifecycle and corrective postings
//! - `ledger` - Facade dispatching imported commands
//! - `batch_processor` - Per-customer parallel command processing

pub mod account_store;
pub mod balance;
pub mod batch_processor;
pub mod clock;
pub mod credit_policy;
pub mod dispute;
pub mod dispute_store;
pub mod engine;
pub mod ledger;
pub mod payment_application;
pub mod payment_store;
pub mod traits;
pub mod transaction_store;

pub use account_store::CustomerAccountStore;
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use clock::{Clock, FixedClock, SystemClock};
pub use credit_policy::CreditPolicyEngine;
pub use dispute::DisputeResolutionEngine;
pub use dispute_store::DisputeStore;
pub use engine::LedgerEngine;
pub use ledger::Ledger;
pub use payment_application::PaymentApplicationEngine;
pub use payment_store::PaymentApplicationStore;
pub use transaction_store::TransactionStore;
