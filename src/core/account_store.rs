//! Thread-safe customer account storage
//!
//! This module provides the `CustomerAccountStore`, an in-memory
//! [`CustomerDirectory`] backed by `DashMap`.
//!
//! # Design
//!
//! Each account carries a `version` counter. Writers pass the version they
//! read; the store compares and writes under the shard lock for that
//! customer, so two writers racing on the same customer cannot both succeed.
//! The loser gets `ConcurrencyConflict` and nothing is written.
//!
//! # Thread Safety
//!
//! All methods take `&self` and are safe to call from multiple tasks. Reads
//! clone the account to avoid holding shard locks.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::traits::CustomerDirectory;
use crate::types::{AccountStatus, BalanceSnapshot, CustomerAccount, CustomerId, LedgerError};

/// In-memory customer directory
#[derive(Debug)]
pub struct CustomerAccountStore {
    /// Accounts by customer ID
    accounts: DashMap<CustomerId, CustomerAccount>,
}

impl CustomerAccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Get an account, registering it with `init` on first use
    ///
    /// # Arguments
    ///
    /// * `id` - Customer ID
    /// * `init` - Builds the account if it does not exist yet
    pub fn get_or_create<F>(&self, id: CustomerId, init: F) -> CustomerAccount
    where
        F: FnOnce() -> CustomerAccount,
    {
        self.accounts.entry(id).or_insert_with(init).value().clone()
    }

    /// Number of registered customers
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Run `f` on the account if its version matches, then bump the version
    fn update_versioned<F>(
        &self,
        id: CustomerId,
        expected_version: u64,
        f: F,
    ) -> Result<CustomerAccount, LedgerError>
    where
        F: FnOnce(&mut CustomerAccount),
    {
        let mut entry = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("customer", id))?;
        let account = entry.value_mut();

        if account.version != expected_version {
            warn!(
                customer = id,
                expected = expected_version,
                actual = account.version,
                "Rejected stale customer update"
            );
            return Err(LedgerError::concurrency_conflict(
                id,
                expected_version,
                account.version,
            ));
        }

        f(account);
        account.version += 1;
        Ok(account.clone())
    }
}

impl Default for CustomerAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerDirectory for CustomerAccountStore {
    fn create(&self, account: CustomerAccount) -> Result<CustomerAccount, LedgerError> {
        let id = account.id;
        let mut inserted = false;
        let stored = self
            .accounts
            .entry(id)
            .or_insert_with(|| {
                inserted = true;
                account
            })
            .value()
            .clone();

        if !inserted {
            return Err(LedgerError::duplicate("customer", id));
        }
        debug!(customer = id, "Registered customer");
        Ok(stored)
    }

    fn find_by_id(&self, id: CustomerId) -> Result<CustomerAccount, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::not_found("customer", id))
    }

    fn update_balances(
        &self,
        id: CustomerId,
        expected_version: u64,
        balances: BalanceSnapshot,
    ) -> Result<CustomerAccount, LedgerError> {
        self.update_versioned(id, expected_version, |account| {
            account.set_balances(balances)
        })
    }

    fn update_status(
        &self,
        id: CustomerId,
        expected_version: u64,
        status: AccountStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<CustomerAccount, LedgerError> {
        self.update_versioned(id, expected_version, |account| {
            account.status = status;
            match status {
                AccountStatus::Suspended => {
                    account.suspension_reason = reason;
                    account.suspended_at = Some(at);
                }
                AccountStatus::Active => {
                    account.suspension_reason = None;
                    account.suspended_at = None;
                }
            }
        })
    }

    fn find_all(&self) -> Vec<CustomerAccount> {
        let mut accounts: Vec<CustomerAccount> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }
}
