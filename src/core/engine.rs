//! Ledger posting engine
//!
//! This module provides the `LedgerEngine`, the only component allowed to
//! write a customer's balances. Every change goes through a ledger entry:
//! the engine computes the balance impact of the entry, derives due dates
//! and aging, and commits the entry together with the new balances.
//!
//! # Design
//!
//! ```text
//! LedgerEngine
//!     ├── Arc<D: CustomerDirectory>  (cached balances, version-checked writes)
//!     ├── Arc<T: TransactionLog>     (append-only entries)
//!     └── Arc<dyn Clock>             (time source for dates and aging)
//! ```
//!
//! A posting first performs the conditional balance update keyed on the
//! version it loaded, then inserts the entry. If the insert fails the balance
//! update is undone with a second conditional write, so no entry exists
//! without its balance mutation and vice versa.
//!
//! # Thread Safety
//!
//! The engine is cheap to clone and safe to share between tasks. Two postings
//! racing on the same customer cannot both commit: the loser receives
//! `ConcurrencyConflict` and nothing is written. Retrying is the caller's
//! decision.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::balance::{self, SETTLEMENT_EPSILON};
use super::clock::Clock;
use super::traits::{CustomerDirectory, EntryFilter, EntrySort, Page, TransactionLog};
use crate::types::{
    AgingBucket, BalanceSnapshot, CustomerAccount, CustomerId, LedgerEntry, LedgerError,
    PostingRequest, Reference, TransactionId, TransactionStatus, TransactionType,
};

/// User recorded on entries the engine creates on its own behalf
pub const SYSTEM_USER: &str = "system";

/// Outstanding receivables grouped by aging bucket
#[derive(Debug, Clone, PartialEq)]
pub struct AgingReport {
    /// Report date
    pub as_of: NaiveDate,
    /// Remaining amount per bucket; every bucket is present
    pub buckets: BTreeMap<AgingBucket, Decimal>,
    pub total_outstanding: Decimal,
    pub invoice_count: usize,
    pub overdue_count: usize,
}

impl AgingReport {
    fn empty(as_of: NaiveDate) -> Self {
        let buckets = [
            AgingBucket::Current,
            AgingBucket::Days1To30,
            AgingBucket::Days31To60,
            AgingBucket::Days61To90,
            AgingBucket::Over90,
        ]
        .into_iter()
        .map(|bucket| (bucket, Decimal::ZERO))
        .collect();

        Self {
            as_of,
            buckets,
            total_outstanding: Decimal::ZERO,
            invoice_count: 0,
            overdue_count: 0,
        }
    }

    /// Outstanding amount in one bucket
    pub fn bucket(&self, bucket: AgingBucket) -> Decimal {
        self.buckets.get(&bucket).copied().unwrap_or_default()
    }
}

/// Outcome of replaying a customer's ledger against the cached balances
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub customer_id: CustomerId,
    /// Balances cached on the account before reconciliation
    pub stored: BalanceSnapshot,
    /// Balances rebuilt from the ledger
    pub replayed: BalanceSnapshot,
    pub entries_replayed: usize,
    /// True when the cached balances were overwritten with the replayed ones
    pub corrected: bool,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed
    }
}

/// Account statement for a date range
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub customer_id: CustomerId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Current balance before `from`
    pub opening_balance: Decimal,
    /// Posted entries in the range, oldest first
    pub entries: Vec<LedgerEntry>,
    /// Sum of positive impacts
    pub total_charges: Decimal,
    /// Sum of negative impacts, as a positive amount
    pub total_credits: Decimal,
    pub closing_balance: Decimal,
}

/// Ledger posting engine
///
/// Generic over its storage collaborators so tests and alternative backends
/// can inject their own implementations.
pub struct LedgerEngine<D, T> {
    customers: Arc<D>,
    transactions: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<D, T> Clone for LedgerEngine<D, T> {
    fn clone(&self) -> Self {
        Self {
            customers: Arc::clone(&self.customers),
            transactions: Arc::clone(&self.transactions),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<D, T> LedgerEngine<D, T>
where
    D: CustomerDirectory,
    T: TransactionLog,
{
    /// Create a new LedgerEngine
    ///
    /// # Arguments
    ///
    /// * `customers` - Customer directory holding the cached balances
    /// * `transactions` - Ledger entry log
    /// * `clock` - Time source for transaction dates and aging
    pub fn new(customers: Arc<D>, transactions: Arc<T>, clock: Arc<dyn Clock>) -> Self {
        Self {
            customers,
            transactions,
            clock,
        }
    }

    pub fn customers(&self) -> &Arc<D> {
        &self.customers
    }

    pub fn transactions(&self) -> &Arc<T> {
        &self.transactions
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Post a new ledger entry
    ///
    /// Computes the balance impact for the entry type, writes the new balances
    /// with a version-checked update and stores the entry. Requests flagged
    /// `requires_approval` are stored as drafts without touching balances.
    ///
    /// # Arguments
    ///
    /// * `request` - What to post
    ///
    /// # Returns
    ///
    /// The stored entry, including its balance snapshots
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the amount is not allowed for the type
    /// - `NotFound` if the customer does not exist
    /// - `ConcurrencyConflict` if the customer's balances changed concurrently
    /// - `ArithmeticOverflow` if the new balances overflow
    pub fn post_transaction(&self, request: PostingRequest) -> Result<LedgerEntry, LedgerError> {
        validate_amount(request.transaction_type, request.net_amount)?;
        let customer = self.customers.find_by_id(request.customer_id)?;
        let entry = self.build_entry(&customer, request)?;

        if entry.status == TransactionStatus::Draft {
            let stored = self.transactions.create(entry)?;
            info!(
                transaction = %stored.transaction_number,
                customer = stored.customer_id,
                amount = %stored.net_amount,
                "Stored draft entry awaiting approval"
            );
            return Ok(stored);
        }

        let mut entry = entry;
        let posted_by = entry.created_by.clone();
        let updated = self.apply_to_balances(&customer, &mut entry, &posted_by)?;

        match self.transactions.create(entry) {
            Ok(stored) => {
                info!(
                    transaction = %stored.transaction_number,
                    customer = stored.customer_id,
                    kind = %stored.transaction_type,
                    impact = %stored.balance_impact,
                    current = %updated.current_balance,
                    "Posted ledger entry"
                );
                Ok(stored)
            }
            Err(err) => {
                self.rollback_balances(&updated, customer.balances(), &err);
                Err(err)
            }
        }
    }

    /// Promote a draft entry to posted, applying its balance impact
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry does not exist
    /// - `InvalidState` if the entry is not a draft
    /// - `ConcurrencyConflict` if the customer's balances changed concurrently
    pub fn approve_transaction(
        &self,
        id: TransactionId,
        approved_by: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let draft = self.get_transaction(id)?;
        ensure_draft(&draft, "approve")?;

        let customer = self.customers.find_by_id(draft.customer_id)?;
        let mut posted = draft;
        posted.aging = posted.aging_as_of(self.clock.today());
        let updated = self.apply_to_balances(&customer, &mut posted, approved_by)?;

        let result = self.transactions.update_by_id(id, move |entry| {
            ensure_draft(entry, "approve")?;
            *entry = posted;
            Ok(())
        });

        match result {
            Ok(stored) => {
                info!(
                    transaction = %stored.transaction_number,
                    customer = stored.customer_id,
                    approved_by,
                    "Approved draft entry"
                );
                Ok(stored)
            }
            Err(err) => {
                self.rollback_balances(&updated, customer.balances(), &err);
                Err(err)
            }
        }
    }

    /// Discard a draft entry
    ///
    /// # Errors
    ///
    /// `InvalidState` if the entry is not a draft.
    pub fn cancel_transaction(
        &self,
        id: TransactionId,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let cancelled = self.transactions.update_by_id(id, |entry| {
            ensure_draft(entry, "cancel")?;
            entry.status = TransactionStatus::Cancelled;
            entry.remaining_amount = Decimal::ZERO;
            Ok(())
        })?;

        info!(
            transaction = %cancelled.transaction_number,
            reason,
            "Cancelled draft entry"
        );
        Ok(cancelled)
    }

    /// Fully reverse a posted entry
    ///
    /// Marks the original `reversed` and posts a `reversal` entry carrying the
    /// negated balance impact, so the customer's current balance returns to
    /// what it was before the original.
    ///
    /// # Returns
    ///
    /// The new reversal entry
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry does not exist
    /// - `InvalidState` if the entry is already reversed, not posted, is
    ///   itself a reversal, or is a payment allocated to invoices (those go
    ///   through `PaymentApplicationEngine::reverse_application`)
    /// - any error of [`LedgerEngine::post_transaction`]; the original's status
    ///   is restored in that case
    pub fn reverse_transaction(
        &self,
        id: TransactionId,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.reverse(id, reason, false)
    }

    /// Reverse a payment whose invoice allocations the caller hands back
    pub(crate) fn reverse_allocated_payment(
        &self,
        id: TransactionId,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.reverse(id, reason, true)
    }

    fn reverse(
        &self,
        id: TransactionId,
        reason: &str,
        releases_allocations: bool,
    ) -> Result<LedgerEntry, LedgerError> {
        let now = self.clock.now();
        let mut prior_status = TransactionStatus::Posted;

        let original = self.transactions.update_by_id(id, |entry| {
            let refusal = match entry.status {
                TransactionStatus::Reversed => Some("already reversed"),
                TransactionStatus::Draft | TransactionStatus::Cancelled => Some("entry is not posted"),
                _ if entry.transaction_type == TransactionType::Reversal => {
                    Some("reversal entries cannot be reversed")
                }
                _ if entry.payment_application.is_some() && !releases_allocations => {
                    Some("payment is allocated to invoices, reverse its application")
                }
                _ => None,
            };
            if let Some(why) = refusal {
                return Err(LedgerError::invalid_state("transaction", entry.id, "reverse", why));
            }

            prior_status = entry.status;
            entry.status = TransactionStatus::Reversed;
            entry.reversed_at = Some(now);
            Ok(())
        })?;

        let request = PostingRequest::new(
            original.customer_id,
            TransactionType::Reversal,
            -original.balance_impact,
        )
        .dated(now)
        .with_reference(
            Reference::new("reversal", original.id.to_string())
                .with_number(original.transaction_number.clone()),
        )
        .with_description(format!(
            "Reversal of {}: {}",
            original.transaction_number, reason
        ));

        let reversal = match self.post_transaction(request) {
            Ok(reversal) => reversal,
            Err(err) => {
                self.restore_status(id, prior_status, &err);
                return Err(err);
            }
        };

        self.transactions.update_by_id(id, |entry| {
            entry.reversed_by = Some(reversal.id);
            Ok(())
        })?;

        info!(
            original = %original.transaction_number,
            reversal = %reversal.transaction_number,
            customer = original.customer_id,
            reason,
            "Reversed ledger entry"
        );
        Ok(reversal)
    }

    /// Reverse part of an invoice
    ///
    /// Reduces the invoice's remaining amount by exactly `amount`, lowers the
    /// paid amount (never below zero) and posts a reversal of `-amount`.
    ///
    /// # Returns
    ///
    /// The new reversal entry
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `amount <= 0` or exceeds the remaining amount
    /// - `InvalidState` if the entry is not a posted, partially paid or paid invoice
    pub fn partial_reverse_transaction(
        &self,
        id: TransactionId,
        amount: Decimal,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(
                "amount",
                "partial reversal amount must be positive",
            ));
        }

        let mut prior: Option<(TransactionStatus, Decimal, Decimal)> = None;
        let original = self.transactions.update_by_id(id, |entry| {
            let reversible = matches!(
                entry.status,
                TransactionStatus::Posted | TransactionStatus::PartiallyPaid | TransactionStatus::Paid
            );
            if !entry.is_invoice() || !reversible {
                return Err(LedgerError::invalid_state(
                    "transaction",
                    entry.id,
                    "partially reverse",
                    format!("{} {} is not a posted invoice", entry.status, entry.transaction_type),
                ));
            }
            if amount > entry.remaining_amount {
                return Err(LedgerError::validation(
                    "amount",
                    format!(
                        "{} exceeds remaining amount {}",
                        amount, entry.remaining_amount
                    ),
                ));
            }

            prior = Some((entry.status, entry.paid_amount, entry.remaining_amount));
            entry.remaining_amount -= amount;
            entry.paid_amount = (entry.paid_amount - amount).max(Decimal::ZERO);
            entry.status = if entry.remaining_amount <= SETTLEMENT_EPSILON {
                TransactionStatus::Paid
            } else {
                TransactionStatus::PartiallyPaid
            };
            Ok(())
        })?;

        let request = PostingRequest::new(original.customer_id, TransactionType::Reversal, -amount)
            .with_reference(
                Reference::new("partial_reversal", original.id.to_string())
                    .with_number(original.transaction_number.clone()),
            )
            .with_description(format!(
                "Partial reversal of {}: {}",
                original.transaction_number, reason
            ));

        match self.post_transaction(request) {
            Ok(reversal) => {
                info!(
                    original = %original.transaction_number,
                    reversal = %reversal.transaction_number,
                    amount = %amount,
                    remaining = %original.remaining_amount,
                    "Partially reversed invoice"
                );
                Ok(reversal)
            }
            Err(err) => {
                if let Some((status, paid, remaining)) = prior {
                    let restored = self.transactions.update_by_id(id, |entry| {
                        entry.status = status;
                        entry.paid_amount = paid;
                        entry.remaining_amount = remaining;
                        Ok(())
                    });
                    if let Err(restore_err) = restored {
                        error!(
                            transaction = %id,
                            error = %restore_err,
                            cause = %err,
                            "Failed to restore invoice after partial reversal failure"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Fetch one entry
    ///
    /// # Errors
    ///
    /// `NotFound` if the entry does not exist.
    pub fn get_transaction(&self, id: TransactionId) -> Result<LedgerEntry, LedgerError> {
        self.transactions
            .find_by_id(id)
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    }

    /// Filtered, sorted, optionally paged scan of the log
    pub fn list_transactions(
        &self,
        filter: &EntryFilter,
        sort: EntrySort,
        page: Option<Page>,
    ) -> Vec<LedgerEntry> {
        self.transactions.find_all(filter, sort, page)
    }

    /// Recompute an invoice's aging as of today and persist it
    pub fn refresh_aging(&self, id: TransactionId) -> Result<LedgerEntry, LedgerError> {
        let today = self.clock.today();
        self.transactions.update_by_id(id, |entry| {
            entry.aging = entry.aging_as_of(today);
            Ok(())
        })
    }

    /// Open invoices of a customer, oldest due first, with aging as of today
    pub fn open_invoices(&self, customer_id: CustomerId) -> Vec<LedgerEntry> {
        let today = self.clock.today();
        let filter = EntryFilter::for_customer(customer_id)
            .of_type(TransactionType::Invoice)
            .with_status(TransactionStatus::Posted)
            .with_status(TransactionStatus::PartiallyPaid);

        self.transactions
            .find_all(&filter, EntrySort::DueDateAsc, None)
            .into_iter()
            .filter(LedgerEntry::is_open_invoice)
            .map(|mut entry| {
                entry.aging = entry.aging_as_of(today);
                entry
            })
            .collect()
    }

    /// Outstanding receivables per aging bucket, for one customer or all
    pub fn aging_report(&self, customer_id: Option<CustomerId>) -> AgingReport {
        let today = self.clock.today();
        let mut report = AgingReport::empty(today);

        let customers: Vec<CustomerId> = match customer_id {
            Some(id) => vec![id],
            None => self.customers.find_all().iter().map(|c| c.id).collect(),
        };

        for invoice in customers.into_iter().flat_map(|id| self.open_invoices(id)) {
            *report.buckets.entry(invoice.aging.bucket).or_default() += invoice.remaining_amount;
            report.total_outstanding += invoice.remaining_amount;
            report.invoice_count += 1;
            if invoice.aging.is_overdue {
                report.overdue_count += 1;
            }
        }

        report
    }

    /// Rebuild a customer's balances from the ledger and compare with the cache
    ///
    /// Every entry that affected balances is replayed in posting order from
    /// zero. On mismatch the replayed balances are written back with a
    /// version-checked update.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the customer does not exist
    /// - `ConcurrencyConflict` if the account changed while correcting it
    pub fn recalculate_balance(
        &self,
        customer_id: CustomerId,
    ) -> Result<Reconciliation, LedgerError> {
        let customer = self.customers.find_by_id(customer_id)?;
        let entries = self.transactions.find_all(
            &EntryFilter::for_customer(customer_id),
            EntrySort::Posting,
            None,
        );

        let mut replayed = BalanceSnapshot::zero();
        let mut entries_replayed = 0;
        for entry in entries.iter().filter(|e| e.status.has_posted()) {
            replayed = balance::replay(
                customer_id,
                entry.transaction_type,
                entry.balance_impact,
                replayed,
            )?;
            entries_replayed += 1;
        }

        let stored = customer.balances();
        let mut reconciliation = Reconciliation {
            customer_id,
            stored,
            replayed,
            entries_replayed,
            corrected: false,
        };

        if reconciliation.is_consistent() {
            debug!(customer = customer_id, entries = entries_replayed, "Balances reconcile");
            return Ok(reconciliation);
        }

        warn!(
            customer = customer_id,
            stored = %stored.current_balance,
            replayed = %replayed.current_balance,
            "Cached balances diverged from ledger, correcting"
        );
        self.customers
            .update_balances(customer_id, customer.version, replayed)?;
        reconciliation.corrected = true;
        Ok(reconciliation)
    }

    /// Statement of posted entries dated within `[from, to]`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the customer does not exist
    /// - `ValidationFailed` if `from` is after `to`
    pub fn customer_statement(
        &self,
        customer_id: CustomerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Statement, LedgerError> {
        if from > to {
            return Err(LedgerError::validation(
                "from",
                "statement start is after its end",
            ));
        }
        self.customers.find_by_id(customer_id)?;

        let posted: Vec<LedgerEntry> = self
            .transactions
            .find_all(
                &EntryFilter::for_customer(customer_id),
                EntrySort::TransactionDateAsc,
                None,
            )
            .into_iter()
            .filter(|e| e.status.has_posted() && e.transaction_date <= to)
            .collect();

        let opening_balance: Decimal = posted
            .iter()
            .filter(|e| e.transaction_date < from)
            .map(|e| e.balance_impact)
            .sum();

        let entries: Vec<LedgerEntry> = posted
            .into_iter()
            .filter(|e| e.transaction_date >= from)
            .collect();

        let total_charges: Decimal = entries
            .iter()
            .map(|e| e.balance_impact)
            .filter(|impact| impact.is_sign_positive())
            .sum();
        let total_credits: Decimal = entries
            .iter()
            .map(|e| e.balance_impact)
            .filter(|impact| impact.is_sign_negative())
            .map(|impact| -impact)
            .sum();

        Ok(Statement {
            customer_id,
            from,
            to,
            opening_balance,
            closing_balance: opening_balance + total_charges - total_credits,
            entries,
            total_charges,
            total_credits,
        })
    }

    /// Build the entry for `request` without persisting anything
    fn build_entry(
        &self,
        customer: &CustomerAccount,
        request: PostingRequest,
    ) -> Result<LedgerEntry, LedgerError> {
        let now = self.clock.now();
        let tx_type = request.transaction_type;
        let transaction_date = request.transaction_date.unwrap_or(now);

        let due_date = match tx_type {
            TransactionType::Invoice => Some(
                request
                    .payment_terms
                    .unwrap_or(customer.payment_terms)
                    .due_date(transaction_date.date_naive()),
            ),
            _ => None,
        };

        let gross_amount = match request.gross_amount {
            Some(gross) => gross,
            None => request
                .net_amount
                .checked_add(request.discount_amount)
                .and_then(|v| v.checked_sub(request.tax_amount))
                .ok_or_else(|| LedgerError::arithmetic_overflow("gross amount", customer.id))?,
        };

        let mut entry = LedgerEntry {
            id: Uuid::new_v4(),
            sequence: 0,
            posting_sequence: None,
            customer_id: customer.id,
            transaction_number: self
                .transactions
                .generate_transaction_number(tx_type, transaction_date),
            transaction_type: tx_type,
            transaction_date,
            due_date,
            gross_amount,
            discount_amount: request.discount_amount,
            tax_amount: request.tax_amount,
            net_amount: request.net_amount,
            affects_pending_balance: tx_type.affects_pending(),
            affects_advance_balance: tx_type.affects_advance(),
            balance_impact: Decimal::ZERO,
            balance_before: None,
            balance_after: None,
            status: if request.requires_approval {
                TransactionStatus::Draft
            } else {
                TransactionStatus::Posted
            },
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            aging: Default::default(),
            reference: request.reference,
            line_items: request.line_items,
            description: request.description,
            created_by: request
                .created_by
                .unwrap_or_else(|| SYSTEM_USER.to_string()),
            posted_by: None,
            posted_at: None,
            created_at: now,
            payment_application: None,
            reversed_by: None,
            reversed_at: None,
        };
        entry.aging = entry.aging_as_of(self.clock.today());
        Ok(entry)
    }

    /// Write the balances resulting from `entry` and fill in its posting fields
    fn apply_to_balances(
        &self,
        customer: &CustomerAccount,
        entry: &mut LedgerEntry,
        posted_by: &str,
    ) -> Result<CustomerAccount, LedgerError> {
        let change = balance::apply(
            customer.id,
            entry.transaction_type,
            entry.net_amount,
            customer.balances(),
        )?;
        // Drawn before the versioned write so per-customer order matches it
        let posting_sequence = self.transactions.next_posting_sequence();
        let updated = self
            .customers
            .update_balances(customer.id, customer.version, change.after)?;

        entry.posting_sequence = Some(posting_sequence);
        entry.balance_before = Some(change.before);
        entry.balance_after = Some(change.after);
        entry.balance_impact = change.impact;
        entry.status = TransactionStatus::Posted;
        entry.posted_by = Some(posted_by.to_string());
        entry.posted_at = Some(self.clock.now());
        if entry.is_invoice() {
            entry.paid_amount = Decimal::ZERO;
            entry.remaining_amount = entry.net_amount;
        }

        Ok(updated)
    }

    /// Undo a balance update whose entry could not be stored
    fn rollback_balances(
        &self,
        updated: &CustomerAccount,
        before: BalanceSnapshot,
        cause: &LedgerError,
    ) {
        match self
            .customers
            .update_balances(updated.id, updated.version, before)
        {
            Ok(_) => warn!(customer = updated.id, cause = %cause, "Rolled back balance update"),
            Err(err) => error!(
                customer = updated.id,
                error = %err,
                cause = %cause,
                "Failed to roll back balance update"
            ),
        }
    }

    fn restore_status(&self, id: TransactionId, status: TransactionStatus, cause: &LedgerError) {
        let restored = self.transactions.update_by_id(id, |entry| {
            entry.status = status;
            entry.reversed_at = None;
            Ok(())
        });
        if let Err(err) = restored {
            error!(
                transaction = %id,
                error = %err,
                cause = %cause,
                "Failed to restore entry status after reversal failure"
            );
        }
    }
}

/// Amount rules per entry type
fn validate_amount(tx_type: TransactionType, net_amount: Decimal) -> Result<(), LedgerError> {
    match tx_type {
        TransactionType::Reversal => Ok(()),
        TransactionType::Adjustment | TransactionType::OpeningBalance => {
            if net_amount.is_zero() {
                Err(LedgerError::validation(
                    "net_amount",
                    format!("{} amount must be non-zero", tx_type),
                ))
            } else {
                Ok(())
            }
        }
        TransactionType::Invoice
        | TransactionType::Payment
        | TransactionType::Refund
        | TransactionType::CreditNote
        | TransactionType::DebitNote
        | TransactionType::WriteOff => {
            if net_amount <= Decimal::ZERO {
                Err(LedgerError::validation(
                    "net_amount",
                    format!("{} amount must be positive", tx_type),
                ))
            } else {
                Ok(())
            }
        }
    }
}

fn ensure_draft(entry: &LedgerEntry, operation: &str) -> Result<(), LedgerError> {
    if entry.status == TransactionStatus::Draft {
        Ok(())
    } else {
        Err(LedgerError::invalid_state(
            "transaction",
            entry.id,
            operation,
            format!("entry is {}", entry.status),
        ))
    }
}
