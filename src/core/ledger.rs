//! Ledger facade for imported commands
//!
//! This module provides `Ledger`, which wires the in-memory stores to the four
//! engines and turns [`CommandRecord`]s from the import file into engine calls.
//!
//! # Architecture
//!
//! ```text
//! Ledger
//!     ├── LedgerConfig                      (account provisioning, credit checks)
//!     ├── LedgerEngine                      (postings, reversals, balances)
//!     ├── PaymentApplicationEngine          (payments and allocation)
//!     ├── CreditPolicyEngine                (credit checks, overdue scan)
//!     ├── DisputeResolutionEngine           (dispute lifecycle)
//!     └── labels                            (import labels -> generated IDs)
//! ```
//!
//! # Labels
//!
//! Import rows cannot know the identifiers the ledger generates, so a row may
//! name what it creates (`ref`) and later rows point at it (`target`). Labels
//! are scoped to a customer: a row can only ever reach its own customer's
//! entries and disputes.
//!
//! # Thread Safety
//!
//! All state lives in `DashMap`-backed stores behind `Arc`, so a `Ledger` can
//! be shared across tasks. Commands for one customer must be applied in file
//! order; commands for different customers may run concurrently.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::account_store::CustomerAccountStore;
use super::clock::{start_of_day, Clock};
use super::credit_policy::{CreditPolicyEngine, SuspensionReport};
use super::dispute::DisputeResolutionEngine;
use super::dispute_store::DisputeStore;
use super::engine::{LedgerEngine, SYSTEM_USER};
use super::payment_application::PaymentApplicationEngine;
use super::payment_store::PaymentApplicationStore;
use super::traits::CustomerDirectory;
use super::transaction_store::TransactionStore;
use crate::config::LedgerConfig;
use crate::types::{
    CommandKind, CommandRecord, CustomerAccount, CustomerId, DisputeId, DisputePriority,
    DisputeRequest, DisputeResolution, LedgerError, PaymentRequest, PaymentTerms, PostingRequest,
    Reference, ResolveDispute, TransactionId, TransactionType,
};

/// Ledger engine over the in-memory stores
pub type InMemoryLedgerEngine = LedgerEngine<CustomerAccountStore, TransactionStore>;

/// Payment engine over the in-memory stores
pub type InMemoryPaymentEngine =
    PaymentApplicationEngine<CustomerAccountStore, TransactionStore, PaymentApplicationStore>;

/// Credit policy engine over the in-memory stores
pub type InMemoryCreditEngine = CreditPolicyEngine<CustomerAccountStore, TransactionStore>;

/// Dispute engine over the in-memory stores
pub type InMemoryDisputeEngine =
    DisputeResolutionEngine<CustomerAccountStore, TransactionStore, DisputeStore>;

type LabelKey = (CustomerId, String);

/// Reason recorded on disputes opened from an import row
const IMPORTED_DISPUTE_REASON: &str = "imported dispute";

/// In-memory ledger driven by imported commands
pub struct Ledger {
    config: LedgerConfig,
    customers: Arc<CustomerAccountStore>,
    engine: InMemoryLedgerEngine,
    payments: InMemoryPaymentEngine,
    credit: InMemoryCreditEngine,
    disputes: InMemoryDisputeEngine,
    entry_labels: DashMap<LabelKey, TransactionId>,
    dispute_labels: DashMap<LabelKey, DisputeId>,
}

impl Ledger {
    /// Create a ledger over fresh in-memory stores
    ///
    /// # Arguments
    ///
    /// * `config` - Account provisioning and credit check settings
    /// * `clock` - Time source for undated commands and aging
    pub fn in_memory(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let customers = Arc::new(CustomerAccountStore::new());
        let engine = LedgerEngine::new(
            Arc::clone(&customers),
            Arc::new(TransactionStore::new()),
            clock,
        );
        let payments =
            PaymentApplicationEngine::new(engine.clone(), Arc::new(PaymentApplicationStore::new()));
        let credit = CreditPolicyEngine::new(engine.clone(), config.warning_window_days);
        let disputes = DisputeResolutionEngine::new(engine.clone(), Arc::new(DisputeStore::new()));

        Self {
            config,
            customers,
            engine,
            payments,
            credit,
            disputes,
            entry_labels: DashMap::new(),
            dispute_labels: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn engine(&self) -> &InMemoryLedgerEngine {
        &self.engine
    }

    pub fn payments(&self) -> &InMemoryPaymentEngine {
        &self.payments
    }

    pub fn credit(&self) -> &InMemoryCreditEngine {
        &self.credit
    }

    pub fn disputes(&self) -> &InMemoryDisputeEngine {
        &self.disputes
    }

    /// Get a customer's account, provisioning it from the config on first use
    pub fn ensure_customer(&self, id: CustomerId) -> CustomerAccount {
        self.customers
            .get_or_create(id, || self.config.account_for(id))
    }

    /// All known accounts, ordered by customer ID
    pub fn accounts(&self) -> Vec<CustomerAccount> {
        let mut accounts = self.customers.find_all();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Entry created under `label` for `customer`, if any
    pub fn entry_for_label(&self, customer: CustomerId, label: &str) -> Option<TransactionId> {
        self.entry_labels
            .get(&(customer, label.to_string()))
            .map(|id| *id.value())
    }

    /// Dispute opened under `label` for `customer`, if any
    pub fn dispute_for_label(&self, customer: CustomerId, label: &str) -> Option<DisputeId> {
        self.dispute_labels
            .get(&(customer, label.to_string()))
            .map(|id| *id.value())
    }

    /// Run the overdue scan over every account
    pub fn scan_overdue(&self) -> SuspensionReport {
        let report = self.credit.check_and_suspend_overdue_customers();
        info!(
            scanned = report.scanned,
            suspended = report.suspended.len(),
            warnings = report.warnings.len(),
            "Overdue scan finished"
        );
        report
    }

    /// Apply one imported command
    ///
    /// Unknown customers are provisioned from the config before the command
    /// runs, so the account exists even when the command itself fails.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if a required column is missing or unparsable
    /// - `NotFound` if `target` names no entry or dispute of this customer
    /// - `Duplicate` if `ref` is already used by this customer
    /// - any error of the engine operation the command maps to
    pub fn process(&self, record: CommandRecord) -> Result<(), LedgerError> {
        if record.kind.requires_amount() && record.amount.is_none() {
            return Err(LedgerError::validation("amount", "missing amount"));
        }
        if record.kind.requires_target() && record.target.is_none() {
            return Err(LedgerError::validation("target", "missing target"));
        }

        self.ensure_customer(record.customer);

        match record.kind {
            CommandKind::Post(tx_type) => self.process_posting(tx_type, record),
            CommandKind::Payment => self.process_payment(record),
            CommandKind::Reverse => self.process_reverse(record),
            CommandKind::PartialReverse => self.process_partial_reverse(record),
            CommandKind::Dispute => self.process_dispute(record),
            CommandKind::Review => self.process_review(record),
            CommandKind::Resolve => self.process_resolve(record),
        }
    }

    fn process_posting(
        &self,
        tx_type: TransactionType,
        record: CommandRecord,
    ) -> Result<(), LedgerError> {
        if matches!(tx_type, TransactionType::Payment | TransactionType::Reversal) {
            return Err(LedgerError::validation(
                "type",
                format!("{} entries are created by their own commands", tx_type),
            ));
        }
        self.ensure_label_free(&self.entry_labels, record.customer, record.reference.as_deref())?;

        let amount = required_amount(&record)?;
        let mut request = PostingRequest::new(record.customer, tx_type, amount)
            .created_by(SYSTEM_USER);
        if let Some(date) = record.date {
            request = request.dated(start_of_day(date));
        }
        if let Some(label) = &record.reference {
            request = request.with_reference(Reference::new("import", label));
        }

        if tx_type == TransactionType::Invoice {
            if let Some(detail) = &record.detail {
                request = request.with_terms(detail.parse::<PaymentTerms>()?);
            }
            if self.config.enforce_credit_limit {
                self.credit.ensure_can_purchase(record.customer, amount)?;
            }
        } else if let Some(detail) = &record.detail {
            request = request.with_description(detail);
        }

        let entry = self.engine.post_transaction(request)?;
        self.label_entry(record.customer, record.reference, entry.id);
        Ok(())
    }

    fn process_payment(&self, record: CommandRecord) -> Result<(), LedgerError> {
        self.ensure_label_free(&self.entry_labels, record.customer, record.reference.as_deref())?;

        let amount = required_amount(&record)?;
        let mut request = PaymentRequest::new(record.customer, amount).created_by(SYSTEM_USER);
        if let Some(date) = record.date {
            request = request.dated(start_of_day(date));
        }
        if let Some(label) = &record.reference {
            request = request.with_reference(Reference::new("import", label));
        }

        let application = match &record.target {
            Some(target) => {
                let invoice = self.resolve_entry(record.customer, target)?;
                self.payments.apply_payment(request.allocate(invoice, amount))?
            }
            None => self.payments.apply_payment_to_oldest(request)?,
        };

        debug!(
            customer = record.customer,
            applied = %application.applied_amount(),
            unapplied = %application.unapplied_amount,
            "Imported payment"
        );
        self.label_entry(record.customer, record.reference, application.payment_id);
        Ok(())
    }

    fn process_reverse(&self, record: CommandRecord) -> Result<(), LedgerError> {
        self.ensure_label_free(&self.entry_labels, record.customer, record.reference.as_deref())?;

        let target = self.resolve_entry(record.customer, required_target(&record)?)?;
        let reason = record.detail.as_deref().unwrap_or("imported reversal");

        // Payments carry an application whose allocations must be handed back.
        let reversal_id = if self.payments.find_by_payment(target).is_ok() {
            self.payments.reverse_application(target, reason)?;
            self.engine.get_transaction(target)?.reversed_by
        } else {
            Some(self.engine.reverse_transaction(target, reason)?.id)
        };

        if let Some(id) = reversal_id {
            self.label_entry(record.customer, record.reference, id);
        }
        Ok(())
    }

    fn process_partial_reverse(&self, record: CommandRecord) -> Result<(), LedgerError> {
        self.ensure_label_free(&self.entry_labels, record.customer, record.reference.as_deref())?;

        let target = self.resolve_entry(record.customer, required_target(&record)?)?;
        let reason = record.detail.as_deref().unwrap_or("imported partial reversal");
        let reversal =
            self.engine
                .partial_reverse_transaction(target, required_amount(&record)?, reason)?;

        self.label_entry(record.customer, record.reference, reversal.id);
        Ok(())
    }

    fn process_dispute(&self, record: CommandRecord) -> Result<(), LedgerError> {
        self.ensure_label_free(&self.dispute_labels, record.customer, record.reference.as_deref())?;

        let target = self.resolve_entry(record.customer, required_target(&record)?)?;
        let priority = match &record.detail {
            Some(detail) => detail.parse::<DisputePriority>()?,
            None => DisputePriority::default(),
        };
        let request = DisputeRequest::new(target, required_amount(&record)?, IMPORTED_DISPUTE_REASON)
            .with_priority(priority);

        let dispute = self.disputes.open_dispute(request)?;
        if let Some(label) = record.reference {
            self.dispute_labels.insert((record.customer, label), dispute.id);
        }
        Ok(())
    }

    fn process_review(&self, record: CommandRecord) -> Result<(), LedgerError> {
        let dispute = self.resolve_dispute(record.customer, required_target(&record)?)?;
        self.disputes.start_review(dispute, SYSTEM_USER)?;
        Ok(())
    }

    fn process_resolve(&self, record: CommandRecord) -> Result<(), LedgerError> {
        let dispute = self.resolve_dispute(record.customer, required_target(&record)?)?;
        let resolution = record
            .detail
            .as_deref()
            .ok_or_else(|| LedgerError::validation("detail", "missing dispute resolution"))?
            .parse::<DisputeResolution>()?;

        let mut decision = ResolveDispute::new(resolution, SYSTEM_USER);
        if let Some(amount) = record.amount {
            decision = decision.with_amount(amount);
        }

        let outcome = self.disputes.resolve_dispute(dispute, decision)?;
        if let (Some(label), Some(entry)) = (record.reference, outcome.entry) {
            self.label_entry(record.customer, Some(label), entry.id);
        }
        Ok(())
    }

    fn resolve_entry(&self, customer: CustomerId, label: &str) -> Result<TransactionId, LedgerError> {
        self.entry_for_label(customer, label)
            .ok_or_else(|| LedgerError::not_found("transaction", label))
    }

    fn resolve_dispute(&self, customer: CustomerId, label: &str) -> Result<DisputeId, LedgerError> {
        self.dispute_for_label(customer, label)
            .ok_or_else(|| LedgerError::not_found("dispute", label))
    }

    fn ensure_label_free<V>(
        &self,
        labels: &DashMap<LabelKey, V>,
        customer: CustomerId,
        label: Option<&str>,
    ) -> Result<(), LedgerError> {
        match label {
            Some(label) if labels.contains_key(&(customer, label.to_string())) => {
                Err(LedgerError::duplicate("label", label))
            }
            _ => Ok(()),
        }
    }

    fn label_entry(&self, customer: CustomerId, label: Option<String>, id: TransactionId) {
        if let Some(label) = label {
            self.entry_labels.insert((customer, label), id);
        }
    }
}

fn required_amount(record: &CommandRecord) -> Result<Decimal, LedgerError> {
    record
        .amount
        .ok_or_else(|| LedgerError::validation("amount", "missing amount"))
}

fn required_target(record: &CommandRecord) -> Result<&str, LedgerError> {
    record
        .target
        .as_deref()
        .ok_or_else(|| LedgerError::validation("target", "missing target"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::types::{AccountStatus, DisputeStatus, TransactionStatus};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn ledger() -> Ledger {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        Ledger::in_memory(LedgerConfig::default(), Arc::new(clock))
    }

    fn record(kind: CommandKind, customer: CustomerId) -> CommandRecord {
        CommandRecord {
            kind,
            customer,
            reference: None,
            target: None,
            amount: None,
            date: None,
            detail: None,
        }
    }

    fn invoice(customer: CustomerId, label: &str, amount: i64) -> CommandRecord {
        CommandRecord {
            reference: Some(label.to_string()),
            amount: Some(Decimal::new(amount, 0)),
            ..record(CommandKind::Post(TransactionType::Invoice), customer)
        }
    }

    fn targeting(kind: CommandKind, customer: CustomerId, target: &str) -> CommandRecord {
        CommandRecord {
            target: Some(target.to_string()),
            ..record(kind, customer)
        }
    }

    fn balances(ledger: &Ledger, customer: CustomerId) -> (Decimal, Decimal, Decimal) {
        let account = ledger.ensure_customer(customer);
        (
            account.pending_balance,
            account.advance_balance,
            account.current_balance,
        )
    }

    #[test]
    fn test_unknown_customer_is_provisioned_from_config() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 100)).unwrap();

        let account = &ledger.accounts()[0];
        assert_eq!(account.id, 1);
        assert_eq!(account.credit_limit, Decimal::new(1000, 0));
        assert_eq!(account.pending_balance, Decimal::new(100, 0));
    }

    #[test]
    fn test_invoice_terms_from_detail() {
        let ledger = ledger();
        let mut cmd = invoice(1, "inv-1", 100);
        cmd.detail = Some("net15".to_string());
        cmd.date = NaiveDate::from_ymd_opt(2026, 2, 1);
        ledger.process(cmd).unwrap();

        let id = ledger.entry_for_label(1, "inv-1").unwrap();
        let entry = ledger.engine().get_transaction(id).unwrap();
        assert_eq!(entry.due_date, NaiveDate::from_ymd_opt(2026, 2, 16));
    }

    #[test]
    fn test_invoice_over_limit_is_rejected() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 600)).unwrap();

        let result = ledger.process(invoice(1, "inv-2", 500));
        assert!(matches!(result, Err(LedgerError::CreditLimitExceeded { .. })));
        assert_eq!(balances(&ledger, 1).0, Decimal::new(600, 0));
        assert!(ledger.entry_for_label(1, "inv-2").is_none());
    }

    #[test]
    fn test_credit_limit_not_enforced_when_disabled() {
        let config = LedgerConfig {
            enforce_credit_limit: false,
            ..LedgerConfig::default()
        };
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        let ledger = Ledger::in_memory(config, Arc::new(clock));

        ledger.process(invoice(1, "inv-1", 5000)).unwrap();
        assert_eq!(balances(&ledger, 1).0, Decimal::new(5000, 0));
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 100)).unwrap();

        let result = ledger.process(invoice(1, "inv-1", 100));
        assert!(matches!(result, Err(LedgerError::Duplicate { .. })));
        assert_eq!(balances(&ledger, 1).0, Decimal::new(100, 0));

        // Labels are per customer
        ledger.process(invoice(2, "inv-1", 100)).unwrap();
    }

    #[test]
    fn test_targeted_payment_overpays_into_advance() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 300)).unwrap();

        let payment = CommandRecord {
            amount: Some(Decimal::new(500, 0)),
            ..targeting(CommandKind::Payment, 1, "inv-1")
        };
        ledger.process(payment).unwrap();

        assert_eq!(
            balances(&ledger, 1),
            (Decimal::ZERO, Decimal::new(200, 0), Decimal::new(-200, 0))
        );
        let id = ledger.entry_for_label(1, "inv-1").unwrap();
        assert_eq!(
            ledger.engine().get_transaction(id).unwrap().status,
            TransactionStatus::Paid
        );
    }

    #[test]
    fn test_untargeted_payment_goes_oldest_first() {
        let ledger = ledger();
        let mut older = invoice(1, "inv-old", 100);
        older.date = NaiveDate::from_ymd_opt(2026, 1, 1);
        let mut newer = invoice(1, "inv-new", 100);
        newer.date = NaiveDate::from_ymd_opt(2026, 2, 1);
        ledger.process(newer).unwrap();
        ledger.process(older).unwrap();

        let payment = CommandRecord {
            amount: Some(Decimal::new(150, 0)),
            ..record(CommandKind::Payment, 1)
        };
        ledger.process(payment).unwrap();

        let old = ledger
            .engine()
            .get_transaction(ledger.entry_for_label(1, "inv-old").unwrap())
            .unwrap();
        let new = ledger
            .engine()
            .get_transaction(ledger.entry_for_label(1, "inv-new").unwrap())
            .unwrap();
        assert_eq!(old.status, TransactionStatus::Paid);
        assert_eq!(new.remaining_amount, Decimal::new(50, 0));
    }

    #[test]
    fn test_reverse_payment_reopens_invoice() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 300)).unwrap();
        let payment = CommandRecord {
            reference: Some("pay-1".to_string()),
            amount: Some(Decimal::new(300, 0)),
            ..targeting(CommandKind::Payment, 1, "inv-1")
        };
        ledger.process(payment).unwrap();

        let reverse = CommandRecord {
            reference: Some("rev-1".to_string()),
            ..targeting(CommandKind::Reverse, 1, "pay-1")
        };
        ledger.process(reverse).unwrap();

        assert_eq!(balances(&ledger, 1).0, Decimal::new(300, 0));
        let invoice = ledger
            .engine()
            .get_transaction(ledger.entry_for_label(1, "inv-1").unwrap())
            .unwrap();
        assert_eq!(invoice.status, TransactionStatus::Posted);
        assert!(ledger.entry_for_label(1, "rev-1").is_some());
    }

    #[test]
    fn test_reverse_and_partial_reverse_invoice() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 300)).unwrap();
        ledger.process(invoice(1, "inv-2", 200)).unwrap();

        ledger
            .process(targeting(CommandKind::Reverse, 1, "inv-1"))
            .unwrap();
        let partial = CommandRecord {
            amount: Some(Decimal::new(50, 0)),
            ..targeting(CommandKind::PartialReverse, 1, "inv-2")
        };
        ledger.process(partial).unwrap();

        assert_eq!(balances(&ledger, 1).0, Decimal::new(150, 0));
        let second_reverse = ledger.process(targeting(CommandKind::Reverse, 1, "inv-1"));
        assert!(matches!(second_reverse, Err(LedgerError::InvalidState { .. })));
    }

    #[test]
    fn test_dispute_flow_refund_full() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 500)).unwrap();

        let open = CommandRecord {
            reference: Some("d-1".to_string()),
            amount: Some(Decimal::new(100, 0)),
            detail: Some("high".to_string()),
            ..targeting(CommandKind::Dispute, 1, "inv-1")
        };
        ledger.process(open).unwrap();
        ledger.process(targeting(CommandKind::Review, 1, "d-1")).unwrap();
        let resolve = CommandRecord {
            detail: Some("refund_full".to_string()),
            ..targeting(CommandKind::Resolve, 1, "d-1")
        };
        ledger.process(resolve).unwrap();

        assert_eq!(balances(&ledger, 1).0, Decimal::new(400, 0));
        let dispute = ledger
            .disputes()
            .get_dispute(ledger.dispute_for_label(1, "d-1").unwrap())
            .unwrap();
        assert_eq!(dispute.status, DisputeStatus::Resolved);
        assert_eq!(dispute.priority, DisputePriority::High);
    }

    #[test]
    fn test_resolve_without_resolution_fails() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 500)).unwrap();
        let open = CommandRecord {
            reference: Some("d-1".to_string()),
            amount: Some(Decimal::new(100, 0)),
            ..targeting(CommandKind::Dispute, 1, "inv-1")
        };
        ledger.process(open).unwrap();

        let result = ledger.process(targeting(CommandKind::Resolve, 1, "d-1"));
        assert!(matches!(result, Err(LedgerError::ValidationFailed { .. })));
    }

    #[rstest]
    #[case::missing_amount(record(CommandKind::Post(TransactionType::Invoice), 1))]
    #[case::missing_target(record(CommandKind::Reverse, 1))]
    #[case::payment_as_posting(CommandRecord {
        amount: Some(Decimal::ONE),
        ..record(CommandKind::Post(TransactionType::Payment), 1)
    })]
    #[case::reversal_as_posting(CommandRecord {
        amount: Some(Decimal::ONE),
        ..record(CommandKind::Post(TransactionType::Reversal), 1)
    })]
    fn test_malformed_commands_are_rejected(#[case] cmd: CommandRecord) {
        let ledger = ledger();
        assert!(matches!(
            ledger.process(cmd),
            Err(LedgerError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_labels_do_not_cross_customers() {
        let ledger = ledger();
        ledger.process(invoice(1, "inv-1", 100)).unwrap();

        let result = ledger.process(targeting(CommandKind::Reverse, 2, "inv-1"));
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn test_scan_overdue_suspends() {
        let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        let ledger = Ledger::in_memory(LedgerConfig::default(), clock.clone());
        ledger.process(invoice(1, "inv-1", 100)).unwrap();

        clock.advance_days(30 + 91);
        let report = ledger.scan_overdue();

        assert_eq!(report.suspended.len(), 1);
        assert_eq!(ledger.accounts()[0].status, AccountStatus::Suspended);
    }
}
