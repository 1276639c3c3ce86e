//! Payment application types
//!
//! A payment is a single ledger entry; how its amount was spread across the
//! customer's invoices is recorded separately as a [`PaymentApplication`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::CustomerId;
use super::transaction::{Reference, TransactionId};

/// Payment application identifier
pub type PaymentApplicationId = Uuid;

/// Requested allocation of part of a payment to one invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAllocation {
    pub invoice_id: TransactionId,
    /// Upper bound for this invoice; the engine may apply less
    pub amount: Decimal,
}

impl InvoiceAllocation {
    pub fn new(invoice_id: TransactionId, amount: Decimal) -> Self {
        Self { invoice_id, amount }
    }
}

/// Allocation that was actually applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAllocation {
    pub invoice_id: TransactionId,
    pub invoice_number: String,
    pub amount_applied: Decimal,
    pub applied_at: DateTime<Utc>,
}

/// Status of a payment application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Reversed,
}

/// Record of how one payment was distributed across invoices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentApplication {
    pub id: PaymentApplicationId,
    pub payment_id: TransactionId,
    pub customer_id: CustomerId,
    /// Allocations in the order they were applied
    pub applications: Vec<AppliedAllocation>,
    /// Part of the payment not matched to any invoice (kept as advance)
    pub unapplied_amount: Decimal,
    pub total_payment_amount: Decimal,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl PaymentApplication {
    /// Fresh application with nothing allocated yet
    pub fn new(
        payment_id: TransactionId,
        customer_id: CustomerId,
        total_payment_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            customer_id,
            applications: Vec::new(),
            unapplied_amount: total_payment_amount,
            total_payment_amount,
            status: ApplicationStatus::Applied,
            created_at,
            reversed_at: None,
        }
    }

    /// Sum of all applied allocations
    pub fn applied_amount(&self) -> Decimal {
        self.applications.iter().map(|a| a.amount_applied).sum()
    }

    /// Total applied to one invoice across all allocations
    pub fn applied_to(&self, invoice_id: TransactionId) -> Decimal {
        self.applications
            .iter()
            .filter(|a| a.invoice_id == invoice_id)
            .map(|a| a.amount_applied)
            .sum()
    }
}

/// Request to record a customer payment
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub customer_id: CustomerId,
    pub amount: Decimal,
    /// Invoices to settle, in priority order
    pub allocations: Vec<InvoiceAllocation>,
    pub payment_date: Option<DateTime<Utc>>,
    pub reference: Option<Reference>,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

impl PaymentRequest {
    pub fn new(customer_id: CustomerId, amount: Decimal) -> Self {
        Self {
            customer_id,
            amount,
            allocations: Vec::new(),
            payment_date: None,
            reference: None,
            description: None,
            created_by: None,
        }
    }

    pub fn allocate(mut self, invoice_id: TransactionId, amount: Decimal) -> Self {
        self.allocations
            .push(InvoiceAllocation::new(invoice_id, amount));
        self
    }

    pub fn dated(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }
}
