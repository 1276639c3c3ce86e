//! Thread-safe payment application storage
//!
//! In-memory [`PaymentApplicationLog`] keyed by application ID with a
//! secondary index from payment entry to application, so each payment has at
//! most one application record.

use dashmap::DashMap;
use tracing::debug;

use super::traits::PaymentApplicationLog;
use crate::types::{LedgerError, PaymentApplication, PaymentApplicationId, TransactionId};

#[derive(Debug, Default)]
pub struct PaymentApplicationStore {
    applications: DashMap<PaymentApplicationId, PaymentApplication>,
    by_payment: DashMap<TransactionId, PaymentApplicationId>,
}

impl PaymentApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentApplicationLog for PaymentApplicationStore {
    fn create(&self, application: PaymentApplication) -> Result<PaymentApplication, LedgerError> {
        let holder = *self
            .by_payment
            .entry(application.payment_id)
            .or_insert(application.id)
            .value();
        if holder != application.id {
            return Err(LedgerError::duplicate(
                "payment application",
                application.payment_id,
            ));
        }

        self.applications
            .insert(application.id, application.clone());
        debug!(
            payment = %application.payment_id,
            amount = %application.total_payment_amount,
            "Stored payment application"
        );
        Ok(application)
    }

    fn find_by_id(&self, id: PaymentApplicationId) -> Option<PaymentApplication> {
        self.applications.get(&id).map(|a| a.value().clone())
    }

    fn find_by_payment_id(&self, payment_id: TransactionId) -> Option<PaymentApplication> {
        let id = *self.by_payment.get(&payment_id)?.value();
        self.find_by_id(id)
    }

    fn update_by_id<F>(
        &self,
        id: PaymentApplicationId,
        f: F,
    ) -> Result<PaymentApplication, LedgerError>
    where
        F: FnOnce(&mut PaymentApplication) -> Result<(), LedgerError>,
    {
        let mut stored = self
            .applications
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("payment application", id))?;

        let mut updated = stored.value().clone();
        f(&mut updated)?;
        *stored.value_mut() = updated.clone();
        Ok(updated)
    }
}
