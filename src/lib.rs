//! Customer Ledger Library
//!
//! # Overview
//!
//! A customer financial sub-ledger: every event that changes what a customer
//! owes or has overpaid is recorded as an immutable ledger entry, and the
//! customer's balances are a projection of that log.
//!
//! # Architecture
//!
//! - [`types`] - Ledger entries, accounts, payments, disputes, errors
//! - [`config`] - Account provisioning and credit check settings
//! - [`core`] - Business logic:
//!   - [`core::engine`] - Posting, reversal, aging, reconciliation, statements
//!   - [`core::payment_application`] - Allocating payments to invoices
//!   - [`core::credit_policy`] - Credit checks, overdue suspension, credit score
//!   - [`core::dispute`] - Dispute lifecycle and corrective postings
//!   - [`core::ledger`] - Facade applying imported commands
//! - [`io`] - CSV command input and account output
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Balances
//!
//! Each account maintains:
//! - `pending`: what the customer owes
//! - `advance`: what the customer has overpaid
//! - `current`: `pending - advance`
//!
//! Charges (invoices, debit notes) raise pending. Credits (payments, refunds,
//! credit notes) pay pending down first and spill the remainder into advance.
//! Write-offs only ever reduce pending.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::LedgerConfig;
pub use core::{
    CreditPolicyEngine, DisputeResolutionEngine, Ledger, LedgerEngine, PaymentApplicationEngine,
};
pub use io::write_accounts_csv;
pub use types::{
    CustomerAccount, CustomerId, LedgerEntry, LedgerError, TransactionId, TransactionType,
};
