//! Thread-safe ledger entry storage
//!
//! This module provides the `TransactionStore`, an in-memory
//! [`TransactionLog`] backed by `DashMap`.
//!
//! # Design
//!
//! Entries are keyed by their UUID. The store stamps each new entry with a
//! monotonically increasing `sequence`, which gives queries a stable
//! insertion order and breaks ties between entries posted in the same
//! instant. A second counter orders balance applications: a draft only gets
//! its `posting_sequence` when approved, so replay follows the order in
//! which balances actually moved. Transaction numbers are drawn from
//! per-(type, year) counters.
//!
//! # Thread Safety
//!
//! `update_by_id` runs its closure on a copy of the entry while holding the
//! shard lock and writes the copy back only when the closure succeeds, so a
//! failed update leaves no trace. The closure must not call back into the
//! store.

use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::traits::{EntryFilter, EntrySort, Page, TransactionLog};
use crate::types::{LedgerEntry, LedgerError, TransactionId, TransactionType};

/// In-memory ledger entry log
#[derive(Debug)]
pub struct TransactionStore {
    /// Entries by ID
    entries: DashMap<TransactionId, LedgerEntry>,

    /// Last assigned sequence number
    sequence: AtomicU64,

    /// Last issued posting sequence
    posting_sequence: AtomicU64,

    /// Running count of numbers issued per type and year
    number_counters: DashMap<(TransactionType, i32), u64>,
}

impl TransactionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            sequence: AtomicU64::new(0),
            posting_sequence: AtomicU64::new(0),
            number_counters: DashMap::new(),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLog for TransactionStore {
    fn create(&self, mut entry: LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let id = entry.id;
        if self.entries.contains_key(&id) {
            return Err(LedgerError::duplicate("transaction", id));
        }

        entry.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let mut inserted = false;
        let stored = self
            .entries
            .entry(id)
            .or_insert_with(|| {
                inserted = true;
                entry
            })
            .value()
            .clone();

        if !inserted {
            return Err(LedgerError::duplicate("transaction", id));
        }

        debug!(
            transaction = %stored.transaction_number,
            customer = stored.customer_id,
            sequence = stored.sequence,
            "Stored ledger entry"
        );
        Ok(stored)
    }

    fn find_by_id(&self, id: TransactionId) -> Option<LedgerEntry> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    fn update_by_id<F>(&self, id: TransactionId, f: F) -> Result<LedgerEntry, LedgerError>
    where
        F: FnOnce(&mut LedgerEntry) -> Result<(), LedgerError>,
    {
        let mut stored = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("transaction", id))?;

        let mut updated = stored.value().clone();
        f(&mut updated)?;
        *stored.value_mut() = updated.clone();

        Ok(updated)
    }

    fn find_all(
        &self,
        filter: &EntryFilter,
        sort: EntrySort,
        page: Option<Page>,
    ) -> Vec<LedgerEntry> {
        let mut matching: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        match sort {
            EntrySort::Sequence => matching.sort_by_key(|e| e.sequence),
            EntrySort::Posting => matching.sort_by_key(|e| {
                (e.posting_sequence.is_none(), e.posting_sequence, e.sequence)
            }),
            EntrySort::TransactionDateAsc => {
                matching.sort_by_key(|e| (e.transaction_date, e.sequence))
            }
            EntrySort::TransactionDateDesc => matching.sort_by(|a, b| {
                (b.transaction_date, b.sequence).cmp(&(a.transaction_date, a.sequence))
            }),
            EntrySort::DueDateAsc => {
                matching.sort_by_key(|e| (e.due_date.is_none(), e.due_date, e.sequence))
            }
        }

        match page {
            Some(page) => matching
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => matching,
        }
    }

    fn count(&self, filter: &EntryFilter) -> usize {
        self.entries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count()
    }

    fn next_posting_sequence(&self) -> u64 {
        self.posting_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn generate_transaction_number(&self, tx_type: TransactionType, at: DateTime<Utc>) -> String {
        let year = at.year();
        let count = {
            let mut counter = self.number_counters.entry((tx_type, year)).or_insert(0);
            *counter += 1;
            *counter
        };

        format!(
            "{}-{}-{:06}-{}",
            tx_type.number_prefix(),
            year,
            count,
            random_suffix()
        )
    }
}

/// Six uppercase hex characters
pub(crate) fn random_suffix() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Aging, Reference, TransactionStatus};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn entry(customer_id: u32, tx_type: TransactionType, day: u32) -> LedgerEntry {
        let at = Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap();
        LedgerEntry {
            id: Uuid::new_v4(),
            sequence: 0,
            posting_sequence: None,
            customer_id,
            transaction_number: format!("{}-{}", tx_type.number_prefix(), day),
            transaction_type: tx_type,
            transaction_date: at,
            due_date: None,
            gross_amount: Decimal::new(100, 0),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            net_amount: Decimal::new(100, 0),
            affects_pending_balance: true,
            affects_advance_balance: tx_type.affects_advance(),
            balance_impact: Decimal::new(100, 0),
            balance_before: None,
            balance_after: None,
            status: TransactionStatus::Posted,
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            aging: Aging::default(),
            reference: None,
            line_items: Vec::new(),
            description: None,
            created_by: "test".to_string(),
            posted_by: Some("test".to_string()),
            posted_at: Some(at),
            created_at: at,
            payment_application: None,
            reversed_by: None,
            reversed_at: None,
        }
    }

    #[test]
    fn test_create_assigns_increasing_sequence() {
        let store = TransactionStore::new();
        let first = store.create(entry(1, TransactionType::Invoice, 1)).unwrap();
        let second = store.create(entry(1, TransactionType::Payment, 2)).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let store = TransactionStore::new();
        let e = entry(1, TransactionType::Invoice, 1);
        store.create(e.clone()).unwrap();

        assert!(matches!(
            store.create(e),
            Err(LedgerError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_update_by_id_applies_closure() {
        let store = TransactionStore::new();
        let e = store.create(entry(1, TransactionType::Invoice, 1)).unwrap();

        let updated = store
            .update_by_id(e.id, |stored| {
                stored.status = TransactionStatus::Paid;
                Ok(())
            })
            .unwrap();

        assert_eq!(updated.status, TransactionStatus::Paid);
        assert_eq!(
            store.find_by_id(e.id).unwrap().status,
            TransactionStatus::Paid
        );
    }

    #[test]
    fn test_update_by_id_failure_persists_nothing() {
        let store = TransactionStore::new();
        let e = store.create(entry(1, TransactionType::Invoice, 1)).unwrap();

        let result = store.update_by_id(e.id, |stored| {
            stored.status = TransactionStatus::Reversed;
            Err(LedgerError::validation("status", "nope"))
        });

        assert!(result.is_err());
        assert_eq!(
            store.find_by_id(e.id).unwrap().status,
            TransactionStatus::Posted
        );
    }

    #[test]
    fn test_update_missing_entry() {
        let store = TransactionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(
            store.update_by_id(id, |_| Ok(())).unwrap_err(),
            LedgerError::not_found("transaction", id)
        );
    }

    #[test]
    fn test_find_all_filters_and_sorts() {
        let store = TransactionStore::new();
        store.create(entry(1, TransactionType::Invoice, 3)).unwrap();
        store.create(entry(2, TransactionType::Invoice, 2)).unwrap();
        store.create(entry(1, TransactionType::Payment, 1)).unwrap();
        store.create(entry(1, TransactionType::Invoice, 1)).unwrap();

        let filter = EntryFilter::for_customer(1).of_type(TransactionType::Invoice);
        let found = store.find_all(&filter, EntrySort::TransactionDateAsc, None);

        let days: Vec<_> = found.iter().map(|e| e.transaction_number.clone()).collect();
        assert_eq!(days, vec!["INV-1", "INV-3"]);
        assert_eq!(store.count(&filter), 2);
    }

    #[test]
    fn test_posting_sort_follows_posting_sequence() {
        let store = TransactionStore::new();
        let mut first = entry(1, TransactionType::Invoice, 1);
        first.posting_sequence = Some(store.next_posting_sequence() + 5);
        let mut second = entry(1, TransactionType::Payment, 1);
        second.posting_sequence = Some(store.next_posting_sequence());
        let mut draft = entry(1, TransactionType::Invoice, 1);
        draft.status = TransactionStatus::Draft;

        store.create(draft).unwrap();
        store.create(first).unwrap();
        store.create(second).unwrap();

        let found = store.find_all(&EntryFilter::default(), EntrySort::Posting, None);
        let order: Vec<_> = found.iter().map(|e| e.posting_sequence).collect();
        assert_eq!(order, vec![Some(2), Some(6), None]);
    }

    #[test]
    fn test_find_all_descending_with_page() {
        let store = TransactionStore::new();
        for day in 1..=5 {
            store.create(entry(1, TransactionType::Invoice, day)).unwrap();
        }

        let found = store.find_all(
            &EntryFilter::default(),
            EntrySort::TransactionDateDesc,
            Some(Page { offset: 1, limit: 2 }),
        );

        let numbers: Vec<_> = found.iter().map(|e| e.transaction_number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-4", "INV-3"]);
    }

    #[test]
    fn test_due_date_sort_puts_undated_last() {
        let store = TransactionStore::new();
        let mut early = entry(1, TransactionType::Invoice, 1);
        early.due_date = NaiveDate::from_ymd_opt(2026, 1, 10);
        let mut late = entry(1, TransactionType::Invoice, 2);
        late.due_date = NaiveDate::from_ymd_opt(2026, 2, 10);
        let undated = entry(1, TransactionType::Payment, 3);

        store.create(undated).unwrap();
        store.create(late).unwrap();
        store.create(early).unwrap();

        let found = store.find_all(&EntryFilter::default(), EntrySort::DueDateAsc, None);
        let numbers: Vec<_> = found.iter().map(|e| e.transaction_number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-1", "INV-2", "PAY-3"]);
    }

    #[test]
    fn test_filter_by_reference() {
        let store = TransactionStore::new();
        let mut referenced = entry(1, TransactionType::Refund, 1);
        referenced.reference = Some(Reference::new("dispute", "D-1"));
        store.create(referenced).unwrap();
        store.create(entry(1, TransactionType::Refund, 2)).unwrap();

        let filter = EntryFilter {
            reference_id: Some("D-1".to_string()),
            ..EntryFilter::default()
        };
        assert_eq!(store.count(&filter), 1);
    }

    #[test]
    fn test_transaction_number_format() {
        let store = TransactionStore::new();
        let at = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        let first = store.generate_transaction_number(TransactionType::Invoice, at);
        let second = store.generate_transaction_number(TransactionType::Invoice, at);
        let payment = store.generate_transaction_number(TransactionType::Payment, at);

        assert!(first.starts_with("INV-2026-000001-"), "{}", first);
        assert!(second.starts_with("INV-2026-000002-"), "{}", second);
        assert!(payment.starts_with("PAY-2026-000001-"), "{}", payment);

        let suffix = first.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
