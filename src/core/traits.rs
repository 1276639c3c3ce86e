//! Storage abstractions used by the engines
//!
//! The engines only depend on these traits, so persistence can be swapped
//! (the crate ships DashMap-backed in-memory implementations). Every update
//! goes through a closure applied atomically by the store: if the closure
//! returns an error, nothing is persisted.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{
    AccountStatus, BalanceSnapshot, CustomerAccount, CustomerId, Dispute, DisputeId,
    DisputeStatus, LedgerEntry, LedgerError, PaymentApplication, PaymentApplicationId,
    TransactionId, TransactionStatus, TransactionType,
};

/// Filter for ledger entry queries; empty vectors match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub customer_id: Option<CustomerId>,
    pub transaction_types: Vec<TransactionType>,
    pub statuses: Vec<TransactionStatus>,
    pub reference_id: Option<String>,
    /// Inclusive lower bound on `transaction_date`
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `transaction_date`
    pub to_date: Option<DateTime<Utc>>,
    /// Only entries with a due date strictly before this date
    pub due_before: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn of_type(mut self, tx_type: TransactionType) -> Self {
        self.transaction_types.push(tx_type);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }

    /// True when `entry` satisfies every set criterion
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.customer_id.is_none_or(|id| entry.customer_id == id)
            && (self.transaction_types.is_empty()
                || self.transaction_types.contains(&entry.transaction_type))
            && (self.statuses.is_empty() || self.statuses.contains(&entry.status))
            && self.reference_id.as_ref().is_none_or(|reference_id| {
                entry
                    .reference
                    .as_ref()
                    .is_some_and(|r| &r.reference_id == reference_id)
            })
            && self.from_date.is_none_or(|from| entry.transaction_date >= from)
            && self.to_date.is_none_or(|to| entry.transaction_date <= to)
            && self
                .due_before
                .is_none_or(|limit| entry.due_date.is_some_and(|due| due < limit))
    }
}

/// Sort order for ledger entry queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntrySort {
    /// Insertion order
    #[default]
    Sequence,
    /// Order in which balance effects were applied; unposted entries last
    Posting,
    TransactionDateAsc,
    TransactionDateDesc,
    /// Oldest due first; entries without a due date last
    DueDateAsc,
}

/// Offset / limit pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// Filter for dispute queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisputeFilter {
    pub customer_id: Option<CustomerId>,
    pub transaction_id: Option<TransactionId>,
    pub statuses: Vec<DisputeStatus>,
}

impl DisputeFilter {
    /// Open or under-review disputes on one transaction
    pub fn active_for(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            statuses: vec![DisputeStatus::Open, DisputeStatus::UnderReview],
            ..Self::default()
        }
    }

    pub fn matches(&self, dispute: &Dispute) -> bool {
        self.customer_id.is_none_or(|id| dispute.customer_id == id)
            && self
                .transaction_id
                .is_none_or(|id| dispute.transaction_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&dispute.status))
    }
}

/// Customer accounts with version-checked balance updates
pub trait CustomerDirectory: Send + Sync {
    /// Register a new customer
    ///
    /// # Errors
    ///
    /// `Duplicate` if the ID is taken.
    fn create(&self, account: CustomerAccount) -> Result<CustomerAccount, LedgerError>;

    /// Fetch a customer
    ///
    /// # Errors
    ///
    /// `NotFound` if the customer does not exist.
    fn find_by_id(&self, id: CustomerId) -> Result<CustomerAccount, LedgerError>;

    /// Replace the cached balances if the stored version still equals `expected_version`
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` on version mismatch, `NotFound` if missing.
    fn update_balances(
        &self,
        id: CustomerId,
        expected_version: u64,
        balances: BalanceSnapshot,
    ) -> Result<CustomerAccount, LedgerError>;

    /// Change the account status if the stored version still equals `expected_version`
    fn update_status(
        &self,
        id: CustomerId,
        expected_version: u64,
        status: AccountStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<CustomerAccount, LedgerError>;

    /// All customers, ordered by ID
    fn find_all(&self) -> Vec<CustomerAccount>;
}

/// Append-only ledger entry log
pub trait TransactionLog: Send + Sync {
    /// Insert a new entry; the store assigns `sequence`
    fn create(&self, entry: LedgerEntry) -> Result<LedgerEntry, LedgerError>;

    fn find_by_id(&self, id: TransactionId) -> Option<LedgerEntry>;

    /// Mutate an entry atomically; nothing is persisted if `f` fails
    fn update_by_id<F>(&self, id: TransactionId, f: F) -> Result<LedgerEntry, LedgerError>
    where
        F: FnOnce(&mut LedgerEntry) -> Result<(), LedgerError>;

    fn find_all(&self, filter: &EntryFilter, sort: EntrySort, page: Option<Page>)
        -> Vec<LedgerEntry>;

    fn count(&self, filter: &EntryFilter) -> usize;

    /// Next human readable number for an entry of `tx_type` posted at `at`
    fn generate_transaction_number(&self, tx_type: TransactionType, at: DateTime<Utc>) -> String;

    /// Next value of the posting counter, strictly increasing
    fn next_posting_sequence(&self) -> u64;
}

/// Dispute persistence
pub trait DisputeLog: Send + Sync {
    /// Insert a new dispute
    ///
    /// # Errors
    ///
    /// `InvalidState` if the transaction already has an active dispute.
    fn create(&self, dispute: Dispute) -> Result<Dispute, LedgerError>;

    fn find_by_id(&self, id: DisputeId) -> Option<Dispute>;

    fn find_one(&self, filter: &DisputeFilter) -> Option<Dispute>;

    /// Matching disputes, oldest first
    fn find_all(&self, filter: &DisputeFilter) -> Vec<Dispute>;

    /// Mutate a dispute atomically; nothing is persisted if `f` fails
    fn update_by_id<F>(&self, id: DisputeId, f: F) -> Result<Dispute, LedgerError>
    where
        F: FnOnce(&mut Dispute) -> Result<(), LedgerError>;

    fn generate_dispute_number(&self, at: DateTime<Utc>) -> String;
}

/// Payment application persistence
pub trait PaymentApplicationLog: Send + Sync {
    /// Insert a new application
    ///
    /// # Errors
    ///
    /// `Duplicate` if the payment already has an application.
    fn create(&self, application: PaymentApplication) -> Result<PaymentApplication, LedgerError>;

    fn find_by_id(&self, id: PaymentApplicationId) -> Option<PaymentApplication>;

    fn find_by_payment_id(&self, payment_id: TransactionId) -> Option<PaymentApplication>;

    /// Mutate an application atomically; nothing is persisted if `f` fails
    fn update_by_id<F>(
        &self,
        id: PaymentApplicationId,
        f: F,
    ) -> Result<PaymentApplication, LedgerError>
    where
        F: FnOnce(&mut PaymentApplication) -> Result<(), LedgerError>;
}
