//! Ledger entry types
//!
//! This module defines the immutable-once-posted ledger entry together with
//! its classification enums (type, status, aging bucket) and the request
//! structure used to post new entries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::account::{BalanceSnapshot, CustomerId, PaymentTerms};
use super::error::LedgerError;
use super::payment::PaymentApplicationId;

/// Ledger entry identifier
pub type TransactionId = Uuid;

/// Kinds of ledger entries
///
/// The set is closed: every rule that depends on the type (balance impact,
/// numbering prefix, due dates) is an exhaustive match over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Sale on credit, increases what the customer owes
    Invoice,
    /// Money received from the customer
    Payment,
    /// Money returned to the customer
    Refund,
    /// Credit granted to the customer
    CreditNote,
    /// Additional charge
    DebitNote,
    /// Signed manual correction
    Adjustment,
    /// Uncollectible amount removed from pending
    WriteOff,
    /// Negation of a previously posted entry
    Reversal,
    /// Signed balance carried over from another system
    OpeningBalance,
}

impl TransactionType {
    /// All types, in declaration order
    pub const ALL: [TransactionType; 9] = [
        TransactionType::Invoice,
        TransactionType::Payment,
        TransactionType::Refund,
        TransactionType::CreditNote,
        TransactionType::DebitNote,
        TransactionType::Adjustment,
        TransactionType::WriteOff,
        TransactionType::Reversal,
        TransactionType::OpeningBalance,
    ];

    /// Prefix used in transaction numbers
    pub fn number_prefix(self) -> &'static str {
        match self {
            TransactionType::Invoice => "INV",
            TransactionType::Payment => "PAY",
            TransactionType::Refund => "REF",
            TransactionType::CreditNote => "CN",
            TransactionType::DebitNote => "DN",
            TransactionType::Adjustment => "ADJ",
            TransactionType::WriteOff => "WO",
            TransactionType::Reversal => "REV",
            TransactionType::OpeningBalance => "OB",
        }
    }

    /// Types whose net amount carries a sign
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            TransactionType::Adjustment | TransactionType::Reversal | TransactionType::OpeningBalance
        )
    }

    /// Every entry type moves the pending balance
    pub fn affects_pending(self) -> bool {
        true
    }

    /// Types that can spill into (or draw from) the advance balance
    pub fn affects_advance(self) -> bool {
        match self {
            TransactionType::Payment
            | TransactionType::Refund
            | TransactionType::CreditNote
            | TransactionType::Adjustment
            | TransactionType::Reversal
            | TransactionType::OpeningBalance => true,
            TransactionType::Invoice | TransactionType::DebitNote | TransactionType::WriteOff => {
                false
            }
        }
    }

    /// Canonical snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Invoice => "invoice",
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
            TransactionType::CreditNote => "credit_note",
            TransactionType::DebitNote => "debit_note",
            TransactionType::Adjustment => "adjustment",
            TransactionType::WriteOff => "write_off",
            TransactionType::Reversal => "reversal",
            TransactionType::OpeningBalance => "opening_balance",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                LedgerError::validation(
                    "transaction_type",
                    format!("unknown transaction type '{}'", s),
                )
            })
    }
}

/// Lifecycle status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting approval, has not touched balances
    Draft,
    #[default]
    Posted,
    /// Invoice with some payment applied
    PartiallyPaid,
    /// Invoice fully settled
    Paid,
    /// Negated by a reversal entry
    Reversed,
    /// Draft discarded before approval
    Cancelled,
}

impl TransactionStatus {
    /// Posted entries that have affected balances
    pub fn has_posted(self) -> bool {
        !matches!(self, TransactionStatus::Draft | TransactionStatus::Cancelled)
    }

    /// Invoice statuses that still carry a receivable
    pub fn is_open_receivable(self) -> bool {
        matches!(
            self,
            TransactionStatus::Posted | TransactionStatus::PartiallyPaid
        )
    }

    /// Canonical snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Posted => "posted",
            TransactionStatus::PartiallyPaid => "partially_paid",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Reversed => "reversed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receivables aging bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum AgingBucket {
    #[default]
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "1-30")]
    Days1To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "90+")]
    Over90,
}

impl AgingBucket {
    /// Bucket for a receivable that is `days_overdue` days past due
    pub fn from_days_overdue(days_overdue: i64) -> Self {
        match days_overdue {
            i64::MIN..=0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }
}

impl fmt::Display for AgingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aging attributes of a receivable, valid as of the date they were computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Aging {
    pub age_in_days: i64,
    pub bucket: AgingBucket,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl Aging {
    /// Aging of a receivable due on `due_date`, evaluated on `today`
    pub fn as_of(due_date: NaiveDate, today: NaiveDate) -> Self {
        let age = (today - due_date).num_days().max(0);
        Self {
            age_in_days: age,
            bucket: AgingBucket::from_days_overdue(age),
            is_overdue: age > 0,
            days_overdue: age,
        }
    }
}

/// Link from a ledger entry to the business document that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Kind of document ("sale", "dispute", "reversal", ...)
    pub reference_type: String,
    /// Identifier of the document
    pub reference_id: String,
    /// Human readable number of the document
    pub reference_number: Option<String>,
}

impl Reference {
    pub fn new(reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
            reference_number: None,
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.reference_number = Some(number.into());
        self
    }
}

/// Opaque line item carried on an entry for display purposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// One immutable fact about a customer's balance
///
/// Amount and balance fields are write-once after posting. The fields that
/// change later are status, payment tracking (`paid_amount`,
/// `remaining_amount`), aging and the reversal links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: TransactionId,

    /// Insertion order, assigned by the store
    pub sequence: u64,

    /// Order in which the balance effect was applied (`None` while draft)
    #[serde(default)]
    pub posting_sequence: Option<u64>,

    pub customer_id: CustomerId,

    /// `<PREFIX>-<YEAR>-<COUNT>-<SUFFIX>`
    pub transaction_number: String,

    pub transaction_type: TransactionType,
    pub transaction_date: DateTime<Utc>,

    /// Set for invoices only
    pub due_date: Option<NaiveDate>,

    pub gross_amount: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,

    /// Authoritative amount of the entry
    pub net_amount: Decimal,

    pub affects_pending_balance: bool,
    pub affects_advance_balance: bool,

    /// Signed change of the current balance caused by this entry
    pub balance_impact: Decimal,

    /// Balances right before posting (`None` while draft)
    pub balance_before: Option<BalanceSnapshot>,

    /// Balances right after posting (`None` while draft)
    pub balance_after: Option<BalanceSnapshot>,

    pub status: TransactionStatus,

    /// Invoices: amount settled so far
    pub paid_amount: Decimal,

    /// Invoices: amount still owed
    pub remaining_amount: Decimal,

    pub aging: Aging,

    pub reference: Option<Reference>,
    pub line_items: Vec<LineItem>,
    pub description: Option<String>,

    pub created_by: String,
    pub posted_by: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,

    /// Payments: application that settled invoices with this payment
    #[serde(default)]
    pub payment_application: Option<PaymentApplicationId>,

    /// Reversal entry that negated this one
    pub reversed_by: Option<TransactionId>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn is_invoice(&self) -> bool {
        self.transaction_type == TransactionType::Invoice
    }

    /// Invoice that still has something left to collect
    pub fn is_open_invoice(&self) -> bool {
        self.is_invoice() && self.status.is_open_receivable() && self.remaining_amount > Decimal::ZERO
    }

    /// Aging recomputed for `today`; entries without a due date never age
    pub fn aging_as_of(&self, today: NaiveDate) -> Aging {
        match self.due_date {
            Some(due) if self.is_invoice() => Aging::as_of(due, today),
            _ => Aging::default(),
        }
    }
}

/// Request to post a new ledger entry
///
/// Built with [`PostingRequest::new`] and the chained `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRequest {
    pub customer_id: CustomerId,
    pub transaction_type: TransactionType,
    pub net_amount: Decimal,
    pub gross_amount: Option<Decimal>,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    /// Defaults to the engine clock
    pub transaction_date: Option<DateTime<Utc>>,
    /// Overrides the customer's terms for this invoice
    pub payment_terms: Option<PaymentTerms>,
    pub reference: Option<Reference>,
    pub line_items: Vec<LineItem>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    /// Post as draft without touching balances
    pub requires_approval: bool,
}

impl PostingRequest {
    pub fn new(
        customer_id: CustomerId,
        transaction_type: TransactionType,
        net_amount: Decimal,
    ) -> Self {
        Self {
            customer_id,
            transaction_type,
            net_amount,
            gross_amount: None,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            transaction_date: None,
            payment_terms: None,
            reference: None,
            line_items: Vec::new(),
            description: None,
            created_by: None,
            requires_approval: false,
        }
    }

    pub fn dated(mut self, transaction_date: DateTime<Utc>) -> Self {
        self.transaction_date = Some(transaction_date);
        self
    }

    pub fn with_terms(mut self, terms: PaymentTerms) -> Self {
        self.payment_terms = Some(terms);
        self
    }

    pub fn with_breakdown(mut self, gross: Decimal, discount: Decimal, tax: Decimal) -> Self {
        self.gross_amount = Some(gross);
        self.discount_amount = discount;
        self.tax_amount = tax;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_line_items(mut self, line_items: Vec<LineItem>) -> Self {
        self.line_items = line_items;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}
