//! Dispute types
//!
//! A dispute is raised by a customer against one posted ledger entry and moves
//! through `open -> under_review -> resolved`. Resolutions other than
//! `rejected` are settled by posting a corrective ledger entry.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::account::CustomerId;
use super::error::LedgerError;
use super::transaction::{TransactionId, TransactionType};

/// Dispute identifier
pub type DisputeId = Uuid;

/// Reason category of a dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    #[default]
    BillingError,
    PricingError,
    QuantityMismatch,
    DamagedGoods,
    DuplicateCharge,
    Other,
}

/// Priority, which fixes the resolution deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl DisputePriority {
    /// Days allowed to resolve a dispute of this priority
    pub fn sla_days(self) -> i64 {
        match self {
            DisputePriority::Low => 14,
            DisputePriority::Medium => 7,
            DisputePriority::High => 3,
            DisputePriority::Urgent => 1,
        }
    }

    /// Resolution deadline for a dispute opened at `opened_at`
    pub fn due_date(self, opened_at: DateTime<Utc>) -> DateTime<Utc> {
        opened_at + Duration::days(self.sla_days())
    }
}

impl FromStr for DisputePriority {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(DisputePriority::Low),
            "medium" | "normal" => Ok(DisputePriority::Medium),
            "high" => Ok(DisputePriority::High),
            "urgent" | "critical" => Ok(DisputePriority::Urgent),
            _ => Err(LedgerError::validation(
                "priority",
                format!("unknown dispute priority '{}'", s),
            )),
        }
    }
}

/// Dispute lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[default]
    Open,
    UnderReview,
    Resolved,
}

impl DisputeStatus {
    /// Open and under-review disputes block new disputes on the same entry
    pub fn is_active(self) -> bool {
        !matches!(self, DisputeStatus::Resolved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::UnderReview => "under_review",
            DisputeStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    /// Refund the whole disputed amount
    RefundFull,
    /// Refund a caller-supplied amount
    RefundPartial,
    /// Grant credit instead of cash
    CreditNote,
    /// Negative adjustment of the customer's balance
    Adjustment,
    /// Nothing owed to the customer
    Rejected,
}

impl DisputeResolution {
    /// Ledger entry type posted for this resolution, if any
    pub fn posting_type(self) -> Option<TransactionType> {
        match self {
            DisputeResolution::RefundFull | DisputeResolution::RefundPartial => {
                Some(TransactionType::Refund)
            }
            DisputeResolution::CreditNote => Some(TransactionType::CreditNote),
            DisputeResolution::Adjustment => Some(TransactionType::Adjustment),
            DisputeResolution::Rejected => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisputeResolution::RefundFull => "refund_full",
            DisputeResolution::RefundPartial => "refund_partial",
            DisputeResolution::CreditNote => "credit_note",
            DisputeResolution::Adjustment => "adjustment",
            DisputeResolution::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DisputeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisputeResolution {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "refund_full" | "refund" => Ok(DisputeResolution::RefundFull),
            "refund_partial" => Ok(DisputeResolution::RefundPartial),
            "credit_note" => Ok(DisputeResolution::CreditNote),
            "adjustment" => Ok(DisputeResolution::Adjustment),
            "rejected" | "reject" => Ok(DisputeResolution::Rejected),
            _ => Err(LedgerError::validation(
                "resolution",
                format!("unknown dispute resolution '{}'", s),
            )),
        }
    }
}

/// Entry in a dispute's append-only communication log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communication {
    pub at: DateTime<Utc>,
    pub author: String,
    pub message: String,
}

/// Customer dispute against one ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub dispute_number: String,
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub dispute_type: DisputeType,
    pub disputed_amount: Decimal,
    pub reason: String,
    pub priority: DisputePriority,
    pub status: DisputeStatus,
    /// SLA deadline
    pub due_date: DateTime<Utc>,
    pub resolution: Option<DisputeResolution>,
    pub resolution_amount: Option<Decimal>,
    pub resolution_notes: Option<String>,
    /// Corrective ledger entry posted on resolution
    pub resolution_transaction_id: Option<TransactionId>,
    pub reviewed_by: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub communications: Vec<Communication>,
}

impl Dispute {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Active and past its SLA deadline
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.due_date
    }

    /// Append to the communication log
    pub fn log(&mut self, at: DateTime<Utc>, author: &str, message: impl Into<String>) {
        self.communications.push(Communication {
            at,
            author: author.to_string(),
            message: message.into(),
        });
    }
}

/// Request to open a dispute
#[derive(Debug, Clone, PartialEq)]
pub struct DisputeRequest {
    pub transaction_id: TransactionId,
    pub disputed_amount: Decimal,
    pub dispute_type: DisputeType,
    pub reason: String,
    pub priority: DisputePriority,
    pub raised_by: String,
}

impl DisputeRequest {
    pub fn new(transaction_id: TransactionId, disputed_amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            transaction_id,
            disputed_amount,
            dispute_type: DisputeType::default(),
            reason: reason.into(),
            priority: DisputePriority::default(),
            raised_by: "customer".to_string(),
        }
    }

    pub fn with_priority(mut self, priority: DisputePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_type(mut self, dispute_type: DisputeType) -> Self {
        self.dispute_type = dispute_type;
        self
    }

    pub fn raised_by(mut self, user: impl Into<String>) -> Self {
        self.raised_by = user.into();
        self
    }
}

/// Decision closing a dispute
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveDispute {
    pub resolution: DisputeResolution,
    /// Required for partial refunds, credit notes and adjustments
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
    pub resolved_by: String,
}

impl ResolveDispute {
    pub fn new(resolution: DisputeResolution, resolved_by: impl Into<String>) -> Self {
        Self {
            resolution,
            amount: None,
            notes: None,
            resolved_by: resolved_by.into(),
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(DisputePriority::Low, 14)]
    #[case(DisputePriority::Medium, 7)]
    #[case(DisputePriority::High, 3)]
    #[case(DisputePriority::Urgent, 1)]
    fn test_sla_days(#[case] priority: DisputePriority, #[case] days: i64) {
        let opened = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        assert_eq!(priority.sla_days(), days);
        assert_eq!(priority.due_date(opened), opened + Duration::days(days));
    }

    #[rstest]
    #[case(DisputeResolution::RefundFull, Some(TransactionType::Refund))]
    #[case(DisputeResolution::RefundPartial, Some(TransactionType::Refund))]
    #[case(DisputeResolution::CreditNote, Some(TransactionType::CreditNote))]
    #[case(DisputeResolution::Adjustment, Some(TransactionType::Adjustment))]
    #[case(DisputeResolution::Rejected, None)]
    fn test_posting_type(
        #[case] resolution: DisputeResolution,
        #[case] expected: Option<TransactionType>,
    ) {
        assert_eq!(resolution.posting_type(), expected);
    }

    #[rstest]
    #[case("refund_full", DisputeResolution::RefundFull)]
    #[case("Refund-Partial", DisputeResolution::RefundPartial)]
    #[case("credit note", DisputeResolution::CreditNote)]
    #[case("REJECTED", DisputeResolution::Rejected)]
    fn test_resolution_parsing(#[case] input: &str, #[case] expected: DisputeResolution) {
        assert_eq!(input.parse::<DisputeResolution>().unwrap(), expected);
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("URGENT".parse::<DisputePriority>().unwrap(), DisputePriority::Urgent);
        assert!("whenever".parse::<DisputePriority>().is_err());
    }

    #[test]
    fn test_only_resolved_is_inactive() {
        assert!(DisputeStatus::Open.is_active());
        assert!(DisputeStatus::UnderReview.is_active());
        assert!(!DisputeStatus::Resolved.is_active());
    }
}
