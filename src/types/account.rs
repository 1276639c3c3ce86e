//! Customer account types
//!
//! This module defines the cached balance projection kept per customer along
//! with the credit configuration (limit, payment terms, suspension policy)
//! the engines consult.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Customer identifier
pub type CustomerId = u32;

/// Point-in-time view of a customer's three balances
///
/// `current_balance` is always `pending_balance - advance_balance`; use
/// [`BalanceSnapshot::from_split`] to build one so the formula cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Amount the customer owes
    pub pending_balance: Decimal,
    /// Amount the customer has overpaid / holds as credit
    pub advance_balance: Decimal,
    /// Net position, positive when the customer owes money
    pub current_balance: Decimal,
}

impl BalanceSnapshot {
    /// Zero balances
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a snapshot from pending and advance, deriving current
    pub fn from_split(pending_balance: Decimal, advance_balance: Decimal) -> Self {
        Self {
            pending_balance: normalize_zero(pending_balance),
            advance_balance: normalize_zero(advance_balance),
            current_balance: normalize_zero(pending_balance - advance_balance),
        }
    }
}

/// Strip the sign from a zero so "-0.00" never reaches output
fn normalize_zero(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else {
        value
    }
}

/// Customer payment terms
///
/// Determines the due date of every invoice posted for the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    /// Due on the transaction date
    Cash,
    Net15,
    #[default]
    Net30,
    Net45,
    Net60,
}

impl PaymentTerms {
    /// Number of days between the transaction date and the due date
    pub fn days(self) -> u64 {
        match self {
            PaymentTerms::Cash => 0,
            PaymentTerms::Net15 => 15,
            PaymentTerms::Net30 => 30,
            PaymentTerms::Net45 => 45,
            PaymentTerms::Net60 => 60,
        }
    }

    /// Due date of an invoice dated `transaction_date`
    pub fn due_date(self, transaction_date: NaiveDate) -> NaiveDate {
        transaction_date
            .checked_add_days(Days::new(self.days()))
            .unwrap_or(transaction_date)
    }

    /// Cash customers never accrue overdue receivables
    pub fn is_cash(self) -> bool {
        matches!(self, PaymentTerms::Cash)
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentTerms::Cash => "cash",
            PaymentTerms::Net15 => "net15",
            PaymentTerms::Net30 => "net30",
            PaymentTerms::Net45 => "net45",
            PaymentTerms::Net60 => "net60",
        }
    }
}

impl fmt::Display for PaymentTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentTerms {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();

        match normalized.as_str() {
            "cash" | "cod" => Ok(PaymentTerms::Cash),
            "net15" => Ok(PaymentTerms::Net15),
            "net30" => Ok(PaymentTerms::Net30),
            "net45" => Ok(PaymentTerms::Net45),
            "net60" => Ok(PaymentTerms::Net60),
            _ => Err(LedgerError::validation(
                "payment_terms",
                format!("unknown payment terms '{}'", s),
            )),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

impl AccountStatus {
    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overdue suspension policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditPolicy {
    /// Days overdue (after grace) at which the account is suspended
    pub auto_suspend_days: u32,
    /// Days subtracted from the oldest overdue age before comparing
    pub grace_period_days: u32,
    /// Overdue ages that are reported as warnings before suspension
    pub warning_thresholds: Vec<u32>,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            auto_suspend_days: 90,
            grace_period_days: 0,
            warning_thresholds: vec![30, 60],
        }
    }
}

/// Customer account with cached balances
///
/// The balances are a projection of the ledger and are only written by the
/// ledger engine through a version-checked update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAccount {
    /// Customer ID
    pub id: CustomerId,

    /// Terms used to derive invoice due dates
    pub payment_terms: PaymentTerms,

    /// Maximum current balance allowed for new purchases
    pub credit_limit: Decimal,

    /// Suspension policy for overdue receivables
    pub credit_policy: CreditPolicy,

    /// Active or suspended
    pub status: AccountStatus,

    /// Why the account was suspended
    pub suspension_reason: Option<String>,

    /// When the account was suspended
    pub suspended_at: Option<DateTime<Utc>>,

    /// Amount owed
    pub pending_balance: Decimal,

    /// Amount overpaid
    pub advance_balance: Decimal,

    /// pending - advance
    pub current_balance: Decimal,

    /// Optimistic concurrency token, bumped on every write
    pub version: u64,
}

impl CustomerAccount {
    /// Create an active account with zero balances
    ///
    /// # Arguments
    ///
    /// * `id` - Customer ID
    /// * `payment_terms` - Terms used for invoice due dates
    /// * `credit_limit` - Credit limit for new purchases
    /// * `credit_policy` - Overdue suspension policy
    pub fn new(
        id: CustomerId,
        payment_terms: PaymentTerms,
        credit_limit: Decimal,
        credit_policy: CreditPolicy,
    ) -> Self {
        Self {
            id,
            payment_terms,
            credit_limit,
            credit_policy,
            status: AccountStatus::Active,
            suspension_reason: None,
            suspended_at: None,
            pending_balance: Decimal::ZERO,
            advance_balance: Decimal::ZERO,
            current_balance: Decimal::ZERO,
            version: 0,
        }
    }

    /// Current balances as a snapshot
    pub fn balances(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            pending_balance: self.pending_balance,
            advance_balance: self.advance_balance,
            current_balance: self.current_balance,
        }
    }

    /// Overwrite the cached balances, recomputing current from the split
    pub fn set_balances(&mut self, balances: BalanceSnapshot) {
        let balances =
            BalanceSnapshot::from_split(balances.pending_balance, balances.advance_balance);
        self.pending_balance = balances.pending_balance;
        self.advance_balance = balances.advance_balance;
        self.current_balance = balances.current_balance;
    }

    /// True when the account may take on new purchases
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
