//! Credit limit checks, overdue suspension and credit scoring
//!
//! This module provides the `CreditPolicyEngine`. It never posts ledger
//! entries; it reads balances and open invoices through the
//! [`LedgerEngine`] and only writes account status.
//!
//! # Overdue scan
//!
//! [`CreditPolicyEngine::check_and_suspend_overdue_customers`] is triggered
//! from outside (a scheduler, or the `--scan-overdue` CLI flag). For every
//! active customer with credit terms it takes the oldest overdue invoice,
//! subtracts the grace period and compares against the customer's policy:
//!
//! - at or above `auto_suspend_days`: the account is suspended
//! - inside the warning window below that, or past one of the configured
//!   `warning_thresholds`: a warning is logged and reported
//!
//! A failure on one customer is recorded in the report and the scan moves on.

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::engine::LedgerEngine;
use super::traits::{CustomerDirectory, EntryFilter, EntrySort, TransactionLog};
use crate::types::{
    AccountStatus, CustomerAccount, CustomerId, LedgerError, TransactionStatus, TransactionType,
};

/// Default width, in days, of the warning window below the suspension threshold
pub const DEFAULT_WARNING_WINDOW_DAYS: u32 = 30;

/// Why a purchase was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDenial {
    LimitExceeded,
    Suspended,
}

/// Result of a credit check
#[derive(Debug, Clone, PartialEq)]
pub struct CreditCheck {
    pub customer_id: CustomerId,
    pub can_purchase: bool,
    /// `credit_limit - current_balance`, never negative
    pub available_credit: Decimal,
    pub current_balance: Decimal,
    pub credit_limit: Decimal,
    pub requested_amount: Decimal,
    pub reason: Option<CreditDenial>,
}

/// Customer suspended by the overdue scan
#[derive(Debug, Clone, PartialEq)]
pub struct SuspensionNotice {
    pub customer_id: CustomerId,
    /// Oldest overdue age after the grace period
    pub days_overdue: i64,
    pub reason: String,
}

/// Customer approaching suspension
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueWarning {
    pub customer_id: CustomerId,
    pub days_overdue: i64,
    pub days_until_suspension: i64,
    /// Highest configured warning threshold reached, if any
    pub threshold: Option<u32>,
}

/// Outcome of one overdue scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuspensionReport {
    pub scanned: usize,
    pub suspended: Vec<SuspensionNotice>,
    pub warnings: Vec<OverdueWarning>,
    pub failures: Vec<(CustomerId, LedgerError)>,
}

/// Risk tier derived from the credit score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Tier for a score in `[0, 100]`
    pub fn from_score(score: Decimal) -> Self {
        if score >= Decimal::from(80) {
            RiskLevel::Low
        } else if score >= Decimal::from(60) {
            RiskLevel::Medium
        } else if score >= Decimal::from(40) {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

/// Credit score with the inputs it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct CreditScore {
    pub customer_id: CustomerId,
    /// 0 to 100, two decimal places
    pub score: Decimal,
    pub risk_level: RiskLevel,
    /// Percentage of invoiced amount that has been paid
    pub payment_rate: Decimal,
    pub average_days_overdue: Decimal,
    pub overdue_invoice_count: usize,
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
}

/// Credit policy engine
pub struct CreditPolicyEngine<D, T> {
    ledger: LedgerEngine<D, T>,
    warning_window_days: u32,
}

impl<D, T> Clone for CreditPolicyEngine<D, T> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            warning_window_days: self.warning_window_days,
        }
    }
}

impl<D, T> CreditPolicyEngine<D, T>
where
    D: CustomerDirectory,
    T: TransactionLog,
{
    /// Create a new CreditPolicyEngine
    ///
    /// # Arguments
    ///
    /// * `ledger` - Engine used to read balances and open invoices
    /// * `warning_window_days` - Days below the suspension threshold that produce warnings
    pub fn new(ledger: LedgerEngine<D, T>, warning_window_days: u32) -> Self {
        Self {
            ledger,
            warning_window_days,
        }
    }

    /// Check whether a purchase of `amount` fits the customer's credit
    ///
    /// A purchase fits when the account is active and
    /// `current_balance + amount <= credit_limit`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `amount <= 0`
    /// - `NotFound` if the customer does not exist
    pub fn can_make_purchase(
        &self,
        customer_id: CustomerId,
        amount: Decimal,
    ) -> Result<CreditCheck, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(
                "amount",
                "purchase amount must be positive",
            ));
        }

        let customer = self.ledger.customers().find_by_id(customer_id)?;
        let projected = customer
            .current_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("credit check", customer_id))?;

        let reason = if !customer.is_active() {
            Some(CreditDenial::Suspended)
        } else if projected > customer.credit_limit {
            Some(CreditDenial::LimitExceeded)
        } else {
            None
        };

        Ok(CreditCheck {
            customer_id,
            can_purchase: reason.is_none(),
            available_credit: (customer.credit_limit - customer.current_balance)
                .max(Decimal::ZERO),
            current_balance: customer.current_balance,
            credit_limit: customer.credit_limit,
            requested_amount: amount,
            reason,
        })
    }

    /// Like [`CreditPolicyEngine::can_make_purchase`], but a denial is an error
    ///
    /// # Errors
    ///
    /// - `CreditLimitExceeded` if the purchase does not fit the limit
    /// - `InvalidState` if the account is suspended
    pub fn ensure_can_purchase(
        &self,
        customer_id: CustomerId,
        amount: Decimal,
    ) -> Result<CreditCheck, LedgerError> {
        let check = self.can_make_purchase(customer_id, amount)?;
        match check.reason {
            None => Ok(check),
            Some(CreditDenial::Suspended) => Err(LedgerError::invalid_state(
                "customer",
                customer_id,
                "purchase on credit",
                "account is suspended",
            )),
            Some(CreditDenial::LimitExceeded) => Err(LedgerError::credit_limit_exceeded(
                customer_id,
                check.current_balance,
                amount,
                check.credit_limit,
            )),
        }
    }

    /// Suspend customers whose oldest overdue invoice exceeds their policy
    ///
    /// Cash customers and already suspended customers are skipped.
    pub fn check_and_suspend_overdue_customers(&self) -> SuspensionReport {
        let mut report = SuspensionReport::default();

        let candidates = self
            .ledger
            .customers()
            .find_all()
            .into_iter()
            .filter(|c| c.is_active() && !c.payment_terms.is_cash());

        for customer in candidates {
            report.scanned += 1;
            if let Err(err) = self.evaluate_overdue(&customer, &mut report) {
                warn!(customer = customer.id, error = %err, "Overdue check failed");
                report.failures.push((customer.id, err));
            }
        }

        info!(
            scanned = report.scanned,
            suspended = report.suspended.len(),
            warnings = report.warnings.len(),
            failures = report.failures.len(),
            "Completed overdue scan"
        );
        report
    }

    fn evaluate_overdue(
        &self,
        customer: &CustomerAccount,
        report: &mut SuspensionReport,
    ) -> Result<(), LedgerError> {
        let oldest = self
            .ledger
            .open_invoices(customer.id)
            .iter()
            .filter(|invoice| invoice.aging.is_overdue)
            .map(|invoice| invoice.aging.days_overdue)
            .max();

        let Some(max_days_overdue) = oldest else {
            return Ok(());
        };

        let policy = &customer.credit_policy;
        let effective = max_days_overdue - i64::from(policy.grace_period_days);
        let threshold = i64::from(policy.auto_suspend_days);

        if effective >= threshold {
            let reason = format!(
                "Invoice {} days overdue (suspension threshold {} days)",
                effective, policy.auto_suspend_days
            );
            self.ledger.customers().update_status(
                customer.id,
                customer.version,
                AccountStatus::Suspended,
                Some(reason.clone()),
                self.ledger.clock().now(),
            )?;

            info!(customer = customer.id, days_overdue = effective, "Suspended customer");
            report.suspended.push(SuspensionNotice {
                customer_id: customer.id,
                days_overdue: effective,
                reason,
            });
            return Ok(());
        }

        let crossed = policy
            .warning_thresholds
            .iter()
            .copied()
            .filter(|t| effective >= i64::from(*t))
            .max();
        let in_window =
            effective > 0 && effective >= threshold - i64::from(self.warning_window_days);

        if in_window || crossed.is_some() {
            warn!(
                customer = customer.id,
                days_overdue = effective,
                days_until_suspension = threshold - effective,
                "Customer approaching suspension"
            );
            report.warnings.push(OverdueWarning {
                customer_id: customer.id,
                days_overdue: effective,
                days_until_suspension: threshold - effective,
                threshold: crossed,
            });
        }

        Ok(())
    }

    /// Score a customer's payment behaviour
    ///
    /// `100 - 0.5 * (100 - payment_rate) - min(2 * avg_days_overdue, 50)
    /// - min(5 * overdue_count, 30)`, clamped to `[0, 100]`. Payment rate is
    /// 100 when nothing has been invoiced.
    ///
    /// # Errors
    ///
    /// `NotFound` if the customer does not exist.
    pub fn calculate_credit_score(
        &self,
        customer_id: CustomerId,
    ) -> Result<CreditScore, LedgerError> {
        self.ledger.customers().find_by_id(customer_id)?;
        let today = self.ledger.clock().today();

        let filter = EntryFilter::for_customer(customer_id)
            .of_type(TransactionType::Invoice)
            .with_status(TransactionStatus::Posted)
            .with_status(TransactionStatus::PartiallyPaid)
            .with_status(TransactionStatus::Paid);
        let invoices = self
            .ledger
            .transactions()
            .find_all(&filter, EntrySort::Sequence, None);

        let total_invoiced: Decimal = invoices.iter().map(|i| i.net_amount).sum();
        let total_paid: Decimal = invoices.iter().map(|i| i.paid_amount).sum();

        let overdue_days: Vec<i64> = invoices
            .iter()
            .filter(|i| i.is_open_invoice())
            .map(|i| i.aging_as_of(today))
            .filter(|aging| aging.is_overdue)
            .map(|aging| aging.days_overdue)
            .collect();

        let hundred = Decimal::ONE_HUNDRED;
        let payment_rate = if total_invoiced.is_zero() {
            hundred
        } else {
            (total_paid / total_invoiced * hundred).min(hundred)
        };

        let overdue_invoice_count = overdue_days.len();
        let average_days_overdue = if overdue_days.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(overdue_days.iter().sum::<i64>()) / Decimal::from(overdue_invoice_count)
        };

        let score = hundred
            - (hundred - payment_rate) / Decimal::TWO
            - (average_days_overdue * Decimal::TWO).min(Decimal::from(50))
            - (Decimal::from(overdue_invoice_count) * Decimal::from(5)).min(Decimal::from(30));
        let score = score.clamp(Decimal::ZERO, hundred).round_dp(2);

        Ok(CreditScore {
            customer_id,
            score,
            risk_level: RiskLevel::from_score(score),
            payment_rate: payment_rate.round_dp(2),
            average_days_overdue: average_days_overdue.round_dp(2),
            overdue_invoice_count,
            total_invoiced,
            total_paid,
        })
    }

    /// Lift a suspension
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the account is not suspended
    /// - `ConcurrencyConflict` if the account changed concurrently
    pub fn reactivate_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<CustomerAccount, LedgerError> {
        let customer = self.ledger.customers().find_by_id(customer_id)?;
        if customer.is_active() {
            return Err(LedgerError::invalid_state(
                "customer",
                customer_id,
                "reactivate",
                "account is not suspended",
            ));
        }

        let reactivated = self.ledger.customers().update_status(
            customer_id,
            customer.version,
            AccountStatus::Active,
            None,
            self.ledger.clock().now(),
        )?;
        info!(customer = customer_id, "Reactivated customer");
        Ok(reactivated)
    }
}
