//! Payment allocation across invoices
//!
//! This module provides the `PaymentApplicationEngine`, which records an
//! incoming payment and spreads it across the customer's open invoices.
//!
//! # Design
//!
//! The payment entry is posted first, for the full amount, through the
//! [`LedgerEngine`]; that single posting moves the balances. Allocation then
//! walks the requested invoices in caller order and only updates invoice
//! payment tracking (`paid_amount`, `remaining_amount`, status) plus the
//! application record.
//!
//! Allocation is sequential and not transactional across invoices. After a
//! failure part-way through, the payment is fully posted and some invoices
//! are settled while others are not. [`PaymentApplicationEngine::resume_application`]
//! re-runs allocation for the same payment; each invoice is only topped up to
//! the running total requested for it, so re-running never applies twice.
//!
//! A payment with an application can only be reversed through
//! [`PaymentApplicationEngine::reverse_application`], which also hands back
//! what the invoices received.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::engine::LedgerEngine;
use super::traits::{CustomerDirectory, PaymentApplicationLog, TransactionLog};
use crate::types::{
    ApplicationStatus, AppliedAllocation, CustomerId, InvoiceAllocation, LedgerError,
    PaymentApplication, PaymentRequest, PostingRequest, TransactionId, TransactionStatus, TransactionType,
};

/// Engine allocating payments to invoices
pub struct PaymentApplicationEngine<D, T, P> {
    ledger: LedgerEngine<D, T>,
    applications: Arc<P>,
}

impl<D, T, P> Clone for PaymentApplicationEngine<D, T, P> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            applications: Arc::clone(&self.applications),
        }
    }
}

impl<D, T, P> PaymentApplicationEngine<D, T, P>
where
    D: CustomerDirectory,
    T: TransactionLog,
    P: PaymentApplicationLog,
{
    /// Create a new PaymentApplicationEngine
    ///
    /// # Arguments
    ///
    /// * `ledger` - Engine used to post (and reverse) the payment entry
    /// * `applications` - Store for payment application records
    pub fn new(ledger: LedgerEngine<D, T>, applications: Arc<P>) -> Self {
        Self {
            ledger,
            applications,
        }
    }

    /// Record a payment and allocate it to the requested invoices
    ///
    /// Each allocation applies `min(requested, invoice remaining, unapplied)`.
    /// Invoices that are no longer open (paid, cancelled, reversed, draft)
    /// receive nothing. What is left unapplied stays on the account as advance
    /// balance.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for non-positive amounts, or a target that is not
    ///   an invoice of this customer
    /// - `NotFound` if the customer or a target invoice does not exist
    /// - any posting error of the payment entry; nothing is allocated then
    pub fn apply_payment(&self, request: PaymentRequest) -> Result<PaymentApplication, LedgerError> {
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::validation(
                "amount",
                "payment amount must be positive",
            ));
        }
        self.validate_allocations(request.customer_id, &request.allocations)?;

        let mut posting =
            PostingRequest::new(request.customer_id, TransactionType::Payment, request.amount);
        if let Some(date) = request.payment_date {
            posting = posting.dated(date);
        }
        if let Some(reference) = request.reference {
            posting = posting.with_reference(reference);
        }
        if let Some(description) = request.description {
            posting = posting.with_description(description);
        }
        if let Some(user) = request.created_by {
            posting = posting.created_by(user);
        }
        let payment = self.ledger.post_transaction(posting)?;

        let application = self.applications.create(PaymentApplication::new(
            payment.id,
            payment.customer_id,
            payment.net_amount,
            self.ledger.clock().now(),
        ))?;
        self.ledger.transactions().update_by_id(payment.id, |entry| {
            entry.payment_application = Some(application.id);
            Ok(())
        })?;

        let application = self.allocate(application, &request.allocations)?;
        info!(
            payment = %payment.transaction_number,
            customer = payment.customer_id,
            applied = %application.applied_amount(),
            unapplied = %application.unapplied_amount,
            "Applied payment"
        );
        Ok(application)
    }

    /// Record a payment and allocate it to open invoices, oldest due first
    ///
    /// Any allocations already on `request` are replaced.
    pub fn apply_payment_to_oldest(
        &self,
        mut request: PaymentRequest,
    ) -> Result<PaymentApplication, LedgerError> {
        request.allocations = self
            .ledger
            .open_invoices(request.customer_id)
            .into_iter()
            .map(|invoice| InvoiceAllocation::new(invoice.id, invoice.remaining_amount))
            .collect();
        self.apply_payment(request)
    }

    /// Re-run allocation for an already posted payment
    ///
    /// # Errors
    ///
    /// - `NotFound` if the payment has no application
    /// - `InvalidState` if the application was reversed
    pub fn resume_application(
        &self,
        payment_id: TransactionId,
        allocations: &[InvoiceAllocation],
    ) -> Result<PaymentApplication, LedgerError> {
        let application = self.find_by_payment(payment_id)?;
        if application.status == ApplicationStatus::Reversed {
            return Err(LedgerError::invalid_state(
                "payment application",
                application.id,
                "resume",
                "application was reversed",
            ));
        }

        self.validate_allocations(application.customer_id, allocations)?;
        self.allocate(application, allocations)
    }

    /// Undo a payment: reverse its entry and give back what it settled
    ///
    /// # Errors
    ///
    /// - `NotFound` if the payment has no application
    /// - `InvalidState` if the application or the payment is already reversed
    pub fn reverse_application(
        &self,
        payment_id: TransactionId,
        reason: &str,
    ) -> Result<PaymentApplication, LedgerError> {
        let application = self.find_by_payment(payment_id)?;
        if application.status == ApplicationStatus::Reversed {
            return Err(LedgerError::invalid_state(
                "payment application",
                application.id,
                "reverse",
                "already reversed",
            ));
        }

        self.ledger.reverse_allocated_payment(payment_id, reason)?;

        for allocation in &application.applications {
            let amount = allocation.amount_applied;
            self.ledger
                .transactions()
                .update_by_id(allocation.invoice_id, |invoice| {
                    invoice.paid_amount = (invoice.paid_amount - amount).max(Decimal::ZERO);
                    invoice.remaining_amount =
                        (invoice.remaining_amount + amount).min(invoice.net_amount);
                    if matches!(
                        invoice.status,
                        TransactionStatus::Paid | TransactionStatus::PartiallyPaid
                    ) {
                        invoice.status = if invoice.paid_amount.is_zero() {
                            TransactionStatus::Posted
                        } else {
                            TransactionStatus::PartiallyPaid
                        };
                    }
                    Ok(())
                })?;
        }

        let now = self.ledger.clock().now();
        let reversed = self.applications.update_by_id(application.id, |app| {
            app.status = ApplicationStatus::Reversed;
            app.reversed_at = Some(now);
            Ok(())
        })?;

        info!(
            payment = %payment_id,
            invoices = reversed.applications.len(),
            reason,
            "Reversed payment application"
        );
        Ok(reversed)
    }

    /// Application record of a payment
    ///
    /// # Errors
    ///
    /// `NotFound` if the payment has no application.
    pub fn find_by_payment(
        &self,
        payment_id: TransactionId,
    ) -> Result<PaymentApplication, LedgerError> {
        self.applications
            .find_by_payment_id(payment_id)
            .ok_or_else(|| LedgerError::not_found("payment application", payment_id))
    }

    /// Check amounts and that every target is an invoice of `customer_id`
    fn validate_allocations(
        &self,
        customer_id: CustomerId,
        allocations: &[InvoiceAllocation],
    ) -> Result<(), LedgerError> {
        self.ledger.customers().find_by_id(customer_id)?;

        for allocation in allocations {
            if allocation.amount <= Decimal::ZERO {
                return Err(LedgerError::validation(
                    "allocation",
                    format!("amount for invoice {} must be positive", allocation.invoice_id),
                ));
            }

            let invoice = self.ledger.get_transaction(allocation.invoice_id)?;
            if invoice.customer_id != customer_id {
                return Err(LedgerError::validation(
                    "allocation",
                    format!(
                        "invoice {} belongs to customer {}",
                        invoice.transaction_number, invoice.customer_id
                    ),
                ));
            }
            if !invoice.is_invoice() {
                return Err(LedgerError::validation(
                    "allocation",
                    format!("{} is a {}", invoice.transaction_number, invoice.transaction_type),
                ));
            }
        }
        Ok(())
    }

    /// Apply the unapplied part of `application` to `allocations`, in order
    ///
    /// Allocations naming the same invoice add up. Each one only tops the
    /// invoice up to the running total requested for it so far, which makes
    /// re-running the same list a no-op.
    fn allocate(
        &self,
        mut application: PaymentApplication,
        allocations: &[InvoiceAllocation],
    ) -> Result<PaymentApplication, LedgerError> {
        let mut requested_totals: HashMap<TransactionId, Decimal> = HashMap::new();

        for allocation in allocations {
            let requested_total = requested_totals
                .entry(allocation.invoice_id)
                .or_insert(Decimal::ZERO);
            *requested_total += allocation.amount;
            let requested = (*requested_total - application.applied_to(allocation.invoice_id))
                .min(allocation.amount);

            let budget = application.unapplied_amount;
            if budget <= Decimal::ZERO {
                break;
            }
            let mut applied = Decimal::ZERO;

            let invoice = self
                .ledger
                .transactions()
                .update_by_id(allocation.invoice_id, |invoice| {
                    if !invoice.is_open_invoice() {
                        return Ok(());
                    }
                    let amount = requested.min(invoice.remaining_amount).min(budget);
                    if amount <= Decimal::ZERO {
                        return Ok(());
                    }

                    invoice.paid_amount += amount;
                    invoice.remaining_amount -= amount;
                    invoice.status = if invoice.remaining_amount <= Decimal::ZERO {
                        TransactionStatus::Paid
                    } else {
                        TransactionStatus::PartiallyPaid
                    };
                    applied = amount;
                    Ok(())
                })?;

            if applied.is_zero() {
                debug!(
                    invoice = %invoice.transaction_number,
                    status = %invoice.status,
                    "Nothing to apply to invoice"
                );
                continue;
            }

            let applied_at = self.ledger.clock().now();
            application = self.applications.update_by_id(application.id, |app| {
                app.applications.push(AppliedAllocation {
                    invoice_id: invoice.id,
                    invoice_number: invoice.transaction_number.clone(),
                    amount_applied: applied,
                    applied_at,
                });
                app.unapplied_amount -= applied;
                Ok(())
            })?;

            debug!(
                invoice = %invoice.transaction_number,
                applied = %applied,
                remaining = %invoice.remaining_amount,
                "Applied payment to invoice"
            );
        }

        Ok(application)
    }
}
