//! Processing strategy module for command replay
//!
//! This module defines the Strategy pattern for complete processing pipelines,
//! covering CSV parsing, ledger processing and account output. This allows
//! different implementations (synchronous, asynchronous batch) to be selected
//! at runtime.

use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::cli::StrategyType;
use crate::config::LedgerConfig;
use crate::core::{Clock, FixedClock, Ledger, SystemClock};
use crate::io::csv_format::write_accounts_csv;
use crate::types::{CustomerId, LedgerError};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Complete processing pipeline from input file to account CSV
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the commands in `input_path` and write the resulting accounts
    ///
    /// # Errors
    ///
    /// Returns an error message for fatal failures (unreadable input, failed
    /// output). Individual bad rows are logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// How the ledger behind a strategy is built and finished
#[derive(Debug, Clone, Default)]
pub struct LedgerSettings {
    pub config: LedgerConfig,
    /// Fixed "today"; the system clock is used when absent
    pub as_of: Option<NaiveDate>,
    /// Run the overdue scan after the last command
    pub scan_overdue: bool,
}

impl LedgerSettings {
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.as_of {
            Some(date) => Arc::new(FixedClock::at_date(date)),
            None => Arc::new(SystemClock),
        }
    }

    /// Fresh in-memory ledger for one run
    pub fn build_ledger(&self) -> Ledger {
        Ledger::in_memory(self.config.clone(), self.clock())
    }

    /// Run the post-processing steps and write the accounts
    pub fn finish(&self, ledger: &Ledger, output: &mut dyn Write) -> Result<(), String> {
        if self.scan_overdue {
            for (customer, error) in ledger.scan_overdue().failures {
                warn!(customer, error = %error, "Overdue scan failed for customer");
            }
        }
        write_accounts_csv(&ledger.accounts(), output)
    }
}

/// Log a command the ledger refused
pub(crate) fn log_rejected(customer: CustomerId, error: &LedgerError) {
    warn!(customer, error = %error, "Command rejected");
}

/// Create a processing strategy
///
/// # Arguments
///
/// * `strategy_type` - Sync or async pipeline
/// * `config` - Batch settings for the async pipeline; defaults when `None`
/// * `settings` - Ledger configuration shared by both pipelines
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    settings: LedgerSettings,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(settings)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            config.unwrap_or_default(),
            settings,
        )),
    }
}
