//! Thread-safe dispute storage
//!
//! `DisputeStore` is the in-memory [`DisputeLog`]. Besides the disputes
//! themselves it keeps an index of the active dispute per transaction, which
//! is how "one active dispute per ledger entry" is enforced atomically: the
//! index slot is claimed in `create` and released when an update moves the
//! dispute to `resolved`.

use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::traits::{DisputeFilter, DisputeLog};
use super::transaction_store::random_suffix;
use crate::types::{Dispute, DisputeId, LedgerError, TransactionId};

/// In-memory dispute log
#[derive(Debug, Default)]
pub struct DisputeStore {
    disputes: DashMap<DisputeId, Dispute>,

    /// Active dispute per disputed transaction
    active_by_transaction: DashMap<TransactionId, DisputeId>,

    /// Dispute numbers issued so far
    issued: AtomicU64,
}

impl DisputeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the active slot for `transaction_id`; false if another dispute holds it
    fn claim_active(&self, transaction_id: TransactionId, dispute_id: DisputeId) -> bool {
        let holder = *self
            .active_by_transaction
            .entry(transaction_id)
            .or_insert(dispute_id)
            .value();
        holder == dispute_id
    }

    fn release_active(&self, transaction_id: TransactionId, dispute_id: DisputeId) {
        self.active_by_transaction
            .remove_if(&transaction_id, |_, holder| *holder == dispute_id);
    }
}

impl DisputeLog for DisputeStore {
    fn create(&self, dispute: Dispute) -> Result<Dispute, LedgerError> {
        if self.disputes.contains_key(&dispute.id) {
            return Err(LedgerError::duplicate("dispute", dispute.id));
        }

        if dispute.is_active() && !self.claim_active(dispute.transaction_id, dispute.id) {
            return Err(LedgerError::invalid_state(
                "transaction",
                dispute.transaction_id,
                "dispute",
                "an active dispute already exists",
            ));
        }

        self.disputes.insert(dispute.id, dispute.clone());
        debug!(
            dispute = %dispute.dispute_number,
            transaction = %dispute.transaction_id,
            "Stored dispute"
        );
        Ok(dispute)
    }

    fn find_by_id(&self, id: DisputeId) -> Option<Dispute> {
        self.disputes.get(&id).map(|d| d.value().clone())
    }

    fn find_one(&self, filter: &DisputeFilter) -> Option<Dispute> {
        self.find_all(filter).into_iter().next()
    }

    fn find_all(&self, filter: &DisputeFilter) -> Vec<Dispute> {
        let mut matching: Vec<Dispute> = self
            .disputes
            .iter()
            .filter(|d| filter.matches(d.value()))
            .map(|d| d.value().clone())
            .collect();
        matching.sort_by_key(|d| (d.created_at, d.dispute_number.clone()));
        matching
    }

    fn update_by_id<F>(&self, id: DisputeId, f: F) -> Result<Dispute, LedgerError>
    where
        F: FnOnce(&mut Dispute) -> Result<(), LedgerError>,
    {
        let updated = {
            let mut stored = self
                .disputes
                .get_mut(&id)
                .ok_or_else(|| LedgerError::not_found("dispute", id))?;

            let was_active = stored.is_active();
            let mut updated = stored.value().clone();
            f(&mut updated)?;

            if !was_active
                && updated.is_active()
                && !self.claim_active(updated.transaction_id, updated.id)
            {
                return Err(LedgerError::invalid_state(
                    "transaction",
                    updated.transaction_id,
                    "reopen dispute",
                    "another dispute is active",
                ));
            }

            *stored.value_mut() = updated.clone();
            updated
        };

        if !updated.is_active() {
            self.release_active(updated.transaction_id, updated.id);
        }

        Ok(updated)
    }

    fn generate_dispute_number(&self, at: DateTime<Utc>) -> String {
        let count = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("DSP-{}-{:06}-{}", at.year(), count, random_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisputePriority, DisputeStatus, DisputeType};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn dispute(transaction_id: TransactionId) -> Dispute {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        Dispute {
            id: Uuid::new_v4(),
            dispute_number: "DSP-TEST".to_string(),
            transaction_id,
            customer_id: 1,
            dispute_type: DisputeType::BillingError,
            disputed_amount: Decimal::new(50, 0),
            reason: "wrong price".to_string(),
            priority: DisputePriority::Medium,
            status: DisputeStatus::Open,
            due_date: DisputePriority::Medium.due_date(at),
            resolution: None,
            resolution_amount: None,
            resolution_notes: None,
            resolution_transaction_id: None,
            reviewed_by: None,
            resolved_by: None,
            resolved_at: None,
            created_by: "customer".to_string(),
            created_at: at,
            communications: Vec::new(),
        }
    }

    #[test]
    fn test_second_active_dispute_is_rejected() {
        let store = DisputeStore::new();
        let tx = Uuid::new_v4();
        store.create(dispute(tx)).unwrap();

        let result = store.create(dispute(tx));
        assert!(matches!(result, Err(LedgerError::InvalidState { .. })));
    }

    #[test]
    fn test_resolving_releases_active_slot() {
        let store = DisputeStore::new();
        let tx = Uuid::new_v4();
        let first = store.create(dispute(tx)).unwrap();

        store
            .update_by_id(first.id, |d| {
                d.status = DisputeStatus::Resolved;
                Ok(())
            })
            .unwrap();

        assert!(store.create(dispute(tx)).is_ok());
    }

    #[test]
    fn test_reopening_reclaims_active_slot() {
        let store = DisputeStore::new();
        let tx = Uuid::new_v4();
        let first = store.create(dispute(tx)).unwrap();

        store
            .update_by_id(first.id, |d| {
                d.status = DisputeStatus::Resolved;
                Ok(())
            })
            .unwrap();
        store
            .update_by_id(first.id, |d| {
                d.status = DisputeStatus::UnderReview;
                Ok(())
            })
            .unwrap();

        assert!(store.create(dispute(tx)).is_err());
    }

    #[test]
    fn test_failed_update_persists_nothing() {
        let store = DisputeStore::new();
        let created = store.create(dispute(Uuid::new_v4())).unwrap();

        let result = store.update_by_id(created.id, |d| {
            d.status = DisputeStatus::Resolved;
            Err(LedgerError::validation("resolution", "missing"))
        });

        assert!(result.is_err());
        assert_eq!(
            store.find_by_id(created.id).unwrap().status,
            DisputeStatus::Open
        );
    }

    #[test]
    fn test_find_one_active_for_transaction() {
        let store = DisputeStore::new();
        let tx = Uuid::new_v4();
        let created = store.create(dispute(tx)).unwrap();
        store.create(dispute(Uuid::new_v4())).unwrap();

        let found = store.find_one(&DisputeFilter::active_for(tx)).unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(store.find_all(&DisputeFilter::default()).len(), 2);
    }

    #[test]
    fn test_dispute_number_format() {
        let store = DisputeStore::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(store
            .generate_dispute_number(at)
            .starts_with("DSP-2026-000001-"));
    }
}
