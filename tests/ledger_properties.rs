//! Ledger property and scenario tests
//!
//! Exercises the engines through the public API with a fixed clock:
//! - balances always rebuild from the ledger
//! - pending and advance never go negative
//! - a reversal nets out its original's impact on the current balance
//! - payment allocation is idempotent
//! - aging bucket boundaries
//! - credit checks, payments in full, overpayments and full refunds

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use customer_ledger::core::clock::start_of_day;
    use customer_ledger::core::traits::CustomerDirectory;
    use customer_ledger::core::{FixedClock, Ledger};
    use customer_ledger::types::{
        AgingBucket, BalanceSnapshot, DisputeRequest, DisputeResolution, InvoiceAllocation,
        PaymentRequest, PaymentTerms, PostingRequest, ResolveDispute, TransactionStatus,
        TransactionType,
    };
    use customer_ledger::LedgerConfig;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn d(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn ledger() -> Ledger {
        let ledger = Ledger::in_memory(
            LedgerConfig::default(),
            Arc::new(FixedClock::at_date(today())),
        );
        ledger.ensure_customer(1);
        ledger
    }

    fn post(ledger: &Ledger, transaction_type: TransactionType, amount: Decimal) {
        ledger
            .engine()
            .post_transaction(PostingRequest::new(1, transaction_type, amount))
            .unwrap();
    }

    fn balances(ledger: &Ledger) -> BalanceSnapshot {
        ledger.engine().customers().find_by_id(1).unwrap().balances()
    }

    fn mixed_postings() -> Vec<(TransactionType, Decimal)> {
        vec![
            (TransactionType::Invoice, d(400)),
            (TransactionType::Payment, d(150)),
            (TransactionType::DebitNote, d(25)),
            (TransactionType::Payment, d(500)),
            (TransactionType::Invoice, d(80)),
            (TransactionType::CreditNote, d(60)),
            (TransactionType::Adjustment, d(-30)),
            (TransactionType::Invoice, d(300)),
            (TransactionType::WriteOff, d(1000)),
            (TransactionType::Refund, d(45)),
            (TransactionType::Adjustment, d(90)),
        ]
    }

    #[test]
    fn test_balances_rebuild_from_ledger() {
        let ledger = ledger();
        for (transaction_type, amount) in mixed_postings() {
            post(&ledger, transaction_type, amount);
        }

        let reconciliation = ledger.engine().recalculate_balance(1).unwrap();
        assert!(reconciliation.is_consistent());
        assert!(!reconciliation.corrected);
        assert_eq!(reconciliation.entries_replayed, mixed_postings().len());
    }

    #[test]
    fn test_balances_rebuild_with_approvals_backdating_and_reversals() {
        let ledger = ledger();
        let assert_reconciles = |step: &str| {
            let reconciliation = ledger.engine().recalculate_balance(1).unwrap();
            assert!(
                reconciliation.is_consistent() && !reconciliation.corrected,
                "balances do not rebuild after {}: {:?}",
                step,
                reconciliation
            );
        };
        let backdated = |day: &str| {
            start_of_day(NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap())
        };

        let draft = ledger
            .engine()
            .post_transaction(
                PostingRequest::new(1, TransactionType::Invoice, d(300)).requiring_approval(),
            )
            .unwrap();
        ledger
            .engine()
            .post_transaction(
                PostingRequest::new(1, TransactionType::Invoice, d(200))
                    .dated(backdated("2026-01-01")),
            )
            .unwrap();
        assert_reconciles("backdated invoice");

        // The draft is not open yet, so 150 spills into advance
        let allocated = ledger
            .payments()
            .apply_payment_to_oldest(PaymentRequest::new(1, d(350)))
            .unwrap();
        assert_eq!(allocated.unapplied_amount, d(150));
        let plain = ledger
            .engine()
            .post_transaction(PostingRequest::new(1, TransactionType::Payment, d(100)))
            .unwrap();
        assert_eq!(balances(&ledger), BalanceSnapshot::from_split(d(0), d(250)));
        assert_reconciles("payments");

        ledger
            .engine()
            .reverse_transaction(plain.id, "bounced")
            .unwrap();
        assert_reconciles("reversal of a payment held as advance");

        ledger
            .engine()
            .approve_transaction(draft.id, "manager")
            .unwrap();
        assert_eq!(balances(&ledger), BalanceSnapshot::from_split(d(400), d(250)));
        assert_reconciles("late approval");

        ledger
            .engine()
            .post_transaction(
                PostingRequest::new(1, TransactionType::CreditNote, d(50))
                    .dated(backdated("2026-02-01")),
            )
            .unwrap();
        ledger
            .payments()
            .reverse_application(allocated.payment_id, "cheque bounced")
            .unwrap();
        assert_reconciles("application reversal");

        post(&ledger, TransactionType::WriteOff, d(1000));
        assert_eq!(balances(&ledger), BalanceSnapshot::from_split(d(0), d(250)));

        let reconciliation = ledger.engine().recalculate_balance(1).unwrap();
        assert!(reconciliation.is_consistent());
        assert_eq!(reconciliation.entries_replayed, 8);
    }

    #[test]
    fn test_diverged_balances_are_corrected() {
        let ledger = ledger();
        post(&ledger, TransactionType::Invoice, d(250));
        let expected = balances(&ledger);

        let account = ledger.engine().customers().find_by_id(1).unwrap();
        ledger
            .engine()
            .customers()
            .update_balances(1, account.version, BalanceSnapshot::from_split(d(999), d(0)))
            .unwrap();

        let reconciliation = ledger.engine().recalculate_balance(1).unwrap();
        assert!(reconciliation.corrected);
        assert_eq!(reconciliation.replayed, expected);
        assert_eq!(balances(&ledger), expected);
    }

    #[test]
    fn test_balances_never_negative() {
        let ledger = ledger();
        for (transaction_type, amount) in mixed_postings() {
            post(&ledger, transaction_type, amount);

            let snapshot = balances(&ledger);
            assert!(snapshot.pending_balance >= Decimal::ZERO);
            assert!(snapshot.advance_balance >= Decimal::ZERO);
            assert_eq!(
                snapshot.current_balance,
                snapshot.pending_balance - snapshot.advance_balance
            );
        }
    }

    #[rstest]
    #[case(TransactionType::Invoice, d(300))]
    #[case(TransactionType::Payment, d(700))]
    #[case(TransactionType::CreditNote, d(50))]
    #[case(TransactionType::Adjustment, d(-120))]
    fn test_reversal_restores_current_balance(
        #[case] transaction_type: TransactionType,
        #[case] amount: Decimal,
    ) {
        let ledger = ledger();
        post(&ledger, TransactionType::Invoice, d(500));
        let before = balances(&ledger);

        let entry = ledger
            .engine()
            .post_transaction(PostingRequest::new(1, transaction_type, amount))
            .unwrap();
        let reversal = ledger
            .engine()
            .reverse_transaction(entry.id, "entered in error")
            .unwrap();

        assert_eq!(reversal.balance_impact, -entry.balance_impact);
        // The split may differ once a credit spilled into advance
        assert_eq!(balances(&ledger).current_balance, before.current_balance);
        assert_eq!(
            ledger.engine().get_transaction(entry.id).unwrap().status,
            TransactionStatus::Reversed
        );
    }

    #[test]
    fn test_payment_allocation_is_idempotent() {
        let ledger = ledger();
        let invoice = ledger
            .engine()
            .post_transaction(PostingRequest::new(1, TransactionType::Invoice, d(300)))
            .unwrap();

        let application = ledger
            .payments()
            .apply_payment(PaymentRequest::new(1, d(200)).allocate(invoice.id, d(200)))
            .unwrap();
        let after_first = balances(&ledger);

        let resumed = ledger
            .payments()
            .resume_application(
                application.payment_id,
                &[InvoiceAllocation::new(invoice.id, d(200))],
            )
            .unwrap();

        assert_eq!(resumed.applied_amount(), d(200));
        assert_eq!(balances(&ledger), after_first);
        assert_eq!(
            ledger.engine().get_transaction(invoice.id).unwrap().paid_amount,
            d(200)
        );
    }

    #[rstest]
    #[case(0, AgingBucket::Current)]
    #[case(30, AgingBucket::Days1To30)]
    #[case(31, AgingBucket::Days31To60)]
    #[case(60, AgingBucket::Days31To60)]
    #[case(61, AgingBucket::Days61To90)]
    #[case(91, AgingBucket::Over90)]
    fn test_aging_bucket_boundaries(#[case] days_overdue: i64, #[case] expected: AgingBucket) {
        let ledger = ledger();
        let transaction_date = today() - Duration::days(30 + days_overdue);
        ledger
            .engine()
            .post_transaction(
                PostingRequest::new(1, TransactionType::Invoice, d(100))
                    .dated(start_of_day(transaction_date))
                    .with_terms(PaymentTerms::Net30),
            )
            .unwrap();

        let report = ledger.engine().aging_report(Some(1));
        assert_eq!(report.bucket(expected), d(100));
        assert_eq!(report.total_outstanding, d(100));
        assert_eq!(report.overdue_count, usize::from(days_overdue > 0));
    }

    #[test]
    fn test_credit_limit_scenario() {
        let ledger = ledger();
        post(&ledger, TransactionType::Invoice, d(600));

        let denied = ledger.credit().can_make_purchase(1, d(500)).unwrap();
        assert!(!denied.can_purchase);
        assert_eq!(denied.available_credit, d(400));

        let allowed = ledger.credit().can_make_purchase(1, d(300)).unwrap();
        assert!(allowed.can_purchase);
    }

    #[test]
    fn test_payment_in_full_settles_invoice() {
        let ledger = ledger();
        let invoice = ledger
            .engine()
            .post_transaction(PostingRequest::new(1, TransactionType::Invoice, d(1000)))
            .unwrap();

        ledger
            .payments()
            .apply_payment_to_oldest(PaymentRequest::new(1, d(1000)))
            .unwrap();

        let settled = ledger.engine().get_transaction(invoice.id).unwrap();
        assert_eq!(settled.status, TransactionStatus::Paid);
        assert_eq!(settled.remaining_amount, Decimal::ZERO);
        assert_eq!(balances(&ledger), BalanceSnapshot::zero());
    }

    #[test]
    fn test_overpayment_becomes_advance() {
        let ledger = ledger();
        post(&ledger, TransactionType::Invoice, d(1000));

        let application = ledger
            .payments()
            .apply_payment_to_oldest(PaymentRequest::new(1, d(1200)))
            .unwrap();

        assert_eq!(application.unapplied_amount, d(200));
        let snapshot = balances(&ledger);
        assert_eq!(snapshot.pending_balance, Decimal::ZERO);
        assert_eq!(snapshot.advance_balance, d(200));
        assert_eq!(snapshot.current_balance, d(-200));
    }

    #[test]
    fn test_full_refund_dispute_clears_pending() {
        let ledger = ledger();
        let invoice = ledger
            .engine()
            .post_transaction(PostingRequest::new(1, TransactionType::Invoice, d(1000)))
            .unwrap();

        let dispute = ledger
            .disputes()
            .open_dispute(DisputeRequest::new(invoice.id, d(1000), "never delivered"))
            .unwrap();
        let outcome = ledger
            .disputes()
            .resolve_dispute(
                dispute.id,
                ResolveDispute::new(DisputeResolution::RefundFull, "agent"),
            )
            .unwrap();

        let refund = outcome.entry.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.net_amount, d(1000));
        assert_eq!(balances(&ledger).pending_balance, Decimal::ZERO);
        assert!(ledger.engine().recalculate_balance(1).unwrap().is_consistent());
    }
}
