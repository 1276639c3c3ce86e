//! Dispute lifecycle and corrective postings
//!
//! This module provides the `DisputeResolutionEngine`. A dispute moves
//! `open -> under_review -> resolved`; `resolved` is terminal. Resolving
//! posts the corrective ledger entry through the [`LedgerEngine`]:
//!
//! | resolution       | entry        | amount                 |
//! |------------------|--------------|------------------------|
//! | `refund_full`    | refund       | disputed amount        |
//! | `refund_partial` | refund       | caller amount          |
//! | `credit_note`    | credit_note  | caller amount          |
//! | `adjustment`     | adjustment   | negated caller amount  |
//! | `rejected`       | none         |                        |
//!
//! The dispute is claimed as resolved before posting so two resolvers cannot
//! both post. If the posting fails the dispute is put back in its previous
//! status and the failure is written to its communication log.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::engine::{LedgerEngine, SYSTEM_USER};
use super::traits::{CustomerDirectory, DisputeFilter, DisputeLog, TransactionLog};
use crate::types::{
    Dispute, DisputeId, DisputeRequest, DisputeResolution, DisputeStatus, LedgerEntry,
    LedgerError, PostingRequest, Reference, ResolveDispute, TransactionId, TransactionStatus,
    TransactionType,
};

/// Resolved dispute and the entry posted for it
#[derive(Debug, Clone, PartialEq)]
pub struct DisputeOutcome {
    pub dispute: Dispute,
    /// `None` for rejected disputes
    pub entry: Option<LedgerEntry>,
}

/// Dispute resolution engine
pub struct DisputeResolutionEngine<D, T, G> {
    ledger: LedgerEngine<D, T>,
    disputes: Arc<G>,
}

impl<D, T, G> Clone for DisputeResolutionEngine<D, T, G> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            disputes: Arc::clone(&self.disputes),
        }
    }
}

impl<D, T, G> DisputeResolutionEngine<D, T, G>
where
    D: CustomerDirectory,
    T: TransactionLog,
    G: DisputeLog,
{
    /// Create a new DisputeResolutionEngine
    ///
    /// # Arguments
    ///
    /// * `ledger` - Engine used to post corrective entries
    /// * `disputes` - Dispute store
    pub fn new(ledger: LedgerEngine<D, T>, disputes: Arc<G>) -> Self {
        Self { ledger, disputes }
    }

    /// Open a dispute against a posted ledger entry
    ///
    /// The resolution deadline is the opening time plus the priority's SLA.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry does not exist
    /// - `InvalidState` if the entry is not posted or already has an active dispute
    /// - `ValidationFailed` if the amount is not in `(0, |net_amount|]`
    pub fn open_dispute(&self, request: DisputeRequest) -> Result<Dispute, LedgerError> {
        if request.disputed_amount <= Decimal::ZERO {
            return Err(LedgerError::validation(
                "disputed_amount",
                "disputed amount must be positive",
            ));
        }

        let entry = self.ledger.get_transaction(request.transaction_id)?;
        if matches!(
            entry.status,
            TransactionStatus::Draft | TransactionStatus::Cancelled | TransactionStatus::Reversed
        ) {
            return Err(LedgerError::invalid_state(
                "transaction",
                entry.id,
                "dispute",
                format!("entry is {}", entry.status),
            ));
        }
        if request.disputed_amount > entry.net_amount.abs() {
            return Err(LedgerError::validation(
                "disputed_amount",
                format!(
                    "{} exceeds transaction amount {}",
                    request.disputed_amount,
                    entry.net_amount.abs()
                ),
            ));
        }
        if let Some(active) = self.active_dispute_for(entry.id) {
            return Err(LedgerError::invalid_state(
                "transaction",
                entry.id,
                "dispute",
                format!("dispute {} is still {}", active.dispute_number, active.status),
            ));
        }

        let now = self.ledger.clock().now();
        let mut dispute = Dispute {
            id: Uuid::new_v4(),
            dispute_number: self.disputes.generate_dispute_number(now),
            transaction_id: entry.id,
            customer_id: entry.customer_id,
            dispute_type: request.dispute_type,
            disputed_amount: request.disputed_amount,
            reason: request.reason,
            priority: request.priority,
            status: DisputeStatus::Open,
            due_date: request.priority.due_date(now),
            resolution: None,
            resolution_amount: None,
            resolution_notes: None,
            resolution_transaction_id: None,
            reviewed_by: None,
            resolved_by: None,
            resolved_at: None,
            created_by: request.raised_by,
            created_at: now,
            communications: Vec::new(),
        };
        let opened_by = dispute.created_by.clone();
        let message = format!("Dispute opened: {}", dispute.reason);
        dispute.log(now, &opened_by, message);

        let dispute = self.disputes.create(dispute)?;
        info!(
            dispute = %dispute.dispute_number,
            transaction = %entry.transaction_number,
            amount = %dispute.disputed_amount,
            "Opened dispute"
        );
        Ok(dispute)
    }

    /// Move an open dispute under review
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the dispute is `open`.
    pub fn start_review(&self, id: DisputeId, reviewer: &str) -> Result<Dispute, LedgerError> {
        let now = self.ledger.clock().now();
        self.disputes.update_by_id(id, |dispute| {
            if dispute.status != DisputeStatus::Open {
                return Err(LedgerError::invalid_state(
                    "dispute",
                    dispute.id,
                    "review",
                    format!("dispute is {}", dispute.status),
                ));
            }
            dispute.status = DisputeStatus::UnderReview;
            dispute.reviewed_by = Some(reviewer.to_string());
            dispute.log(now, reviewer, "Review started");
            Ok(())
        })
    }

    /// Append a message to the dispute's communication log
    pub fn add_communication(
        &self,
        id: DisputeId,
        author: &str,
        message: &str,
    ) -> Result<Dispute, LedgerError> {
        let now = self.ledger.clock().now();
        self.disputes.update_by_id(id, |dispute| {
            dispute.log(now, author, message);
            Ok(())
        })
    }

    /// Resolve a dispute and post the corrective entry
    ///
    /// # Errors
    ///
    /// - `NotFound` if the dispute does not exist
    /// - `InvalidState` if it is already resolved
    /// - `ValidationFailed` if a required amount is missing or not in
    ///   `(0, disputed_amount]`
    /// - any posting error; the dispute is reopened in that case
    pub fn resolve_dispute(
        &self,
        id: DisputeId,
        decision: ResolveDispute,
    ) -> Result<DisputeOutcome, LedgerError> {
        let dispute = self.get_dispute(id)?;
        if dispute.status == DisputeStatus::Resolved {
            return Err(already_resolved(&dispute));
        }
        let amount = resolution_amount(&dispute, &decision)?;

        let now = self.ledger.clock().now();
        let mut prior_status = dispute.status;
        let claimed = self.disputes.update_by_id(id, |d| {
            if d.status == DisputeStatus::Resolved {
                return Err(already_resolved(d));
            }
            prior_status = d.status;
            d.status = DisputeStatus::Resolved;
            d.resolution = Some(decision.resolution);
            d.resolution_amount = amount;
            d.resolution_notes = decision.notes.clone();
            d.resolved_by = Some(decision.resolved_by.clone());
            d.resolved_at = Some(now);
            d.log(
                now,
                &decision.resolved_by,
                format!("Resolved as {}", decision.resolution),
            );
            Ok(())
        })?;

        let (Some(tx_type), Some(amount)) = (decision.resolution.posting_type(), amount) else {
            info!(dispute = %claimed.dispute_number, "Rejected dispute");
            return Ok(DisputeOutcome {
                dispute: claimed,
                entry: None,
            });
        };

        let net_amount = match tx_type {
            TransactionType::Adjustment => -amount,
            _ => amount,
        };
        let request = PostingRequest::new(claimed.customer_id, tx_type, net_amount)
            .with_reference(
                Reference::new("dispute", claimed.id.to_string())
                    .with_number(claimed.dispute_number.clone()),
            )
            .with_description(format!(
                "{} for dispute {}",
                decision.resolution, claimed.dispute_number
            ))
            .created_by(decision.resolved_by.clone());

        let entry = match self.ledger.post_transaction(request) {
            Ok(entry) => entry,
            Err(err) => {
                self.reopen(id, prior_status, &err);
                return Err(err);
            }
        };

        let dispute = self.disputes.update_by_id(id, |d| {
            d.resolution_transaction_id = Some(entry.id);
            Ok(())
        })?;

        info!(
            dispute = %dispute.dispute_number,
            resolution = %decision.resolution,
            entry = %entry.transaction_number,
            amount = %amount,
            "Resolved dispute"
        );
        Ok(DisputeOutcome {
            dispute,
            entry: Some(entry),
        })
    }

    /// Fetch one dispute
    ///
    /// # Errors
    ///
    /// `NotFound` if the dispute does not exist.
    pub fn get_dispute(&self, id: DisputeId) -> Result<Dispute, LedgerError> {
        self.disputes
            .find_by_id(id)
            .ok_or_else(|| LedgerError::not_found("dispute", id))
    }

    /// Open or under-review dispute on a transaction, if any
    pub fn active_dispute_for(&self, transaction_id: TransactionId) -> Option<Dispute> {
        self.disputes
            .find_one(&DisputeFilter::active_for(transaction_id))
    }

    pub fn list_disputes(&self, filter: &DisputeFilter) -> Vec<Dispute> {
        self.disputes.find_all(filter)
    }

    /// Active disputes past their SLA deadline
    pub fn overdue_disputes(&self) -> Vec<Dispute> {
        let now = self.ledger.clock().now();
        self.disputes
            .find_all(&DisputeFilter::default())
            .into_iter()
            .filter(|d| d.is_past_due(now))
            .collect()
    }

    /// Undo the resolution claim after a failed posting
    fn reopen(&self, id: DisputeId, status: DisputeStatus, cause: &LedgerError) {
        let now = self.ledger.clock().now();
        let reopened = self.disputes.update_by_id(id, |d| {
            d.status = status;
            d.resolution = None;
            d.resolution_amount = None;
            d.resolution_notes = None;
            d.resolved_by = None;
            d.resolved_at = None;
            d.log(now, SYSTEM_USER, format!("Resolution failed: {}", cause));
            Ok(())
        });

        match reopened {
            Ok(d) => warn!(
                dispute = %d.dispute_number,
                error = %cause,
                "Reopened dispute after failed posting"
            ),
            Err(err) => error!(
                dispute = %id,
                error = %err,
                cause = %cause,
                "Failed to reopen dispute"
            ),
        }
    }
}

fn already_resolved(dispute: &Dispute) -> LedgerError {
    LedgerError::invalid_state("dispute", dispute.id, "resolve", "dispute is already resolved")
}

/// Amount the resolution posts; `None` for rejections
fn resolution_amount(
    dispute: &Dispute,
    decision: &ResolveDispute,
) -> Result<Option<Decimal>, LedgerError> {
    match decision.resolution {
        DisputeResolution::Rejected => Ok(None),
        DisputeResolution::RefundFull => Ok(Some(dispute.disputed_amount)),
        DisputeResolution::RefundPartial
        | DisputeResolution::CreditNote
        | DisputeResolution::Adjustment => {
            let amount = decision.amount.ok_or_else(|| {
                LedgerError::validation(
                    "resolution_amount",
                    format!("{} requires an amount", decision.resolution),
                )
            })?;
            if amount <= Decimal::ZERO || amount > dispute.disputed_amount {
                return Err(LedgerError::validation(
                    "resolution_amount",
                    format!(
                        "{} must be within (0, {}]",
                        amount, dispute.disputed_amount
                    ),
                ));
            }
            Ok(Some(amount))
        }
    }
}
