use crate::config::LedgerConfig;
use crate::strategy::{BatchConfig, LedgerSettings};
use crate::types::LedgerError;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay customer ledger commands and report account balances
#[derive(Parser, Debug)]
#[command(name = "customer-ledger")]
#[command(about = "Replay customer ledger commands and report account balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Parsing strategy to use for processing commands
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Parsing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of concurrent batches (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of batches processing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Ledger configuration file
    #[arg(
        long = "config",
        value_name = "FILE",
        help = "TOML file with credit limits, payment terms and credit policy"
    )]
    pub config: Option<PathBuf>,

    /// Date treated as today for undated commands and aging
    #[arg(
        long = "as-of",
        value_name = "YYYY-MM-DD",
        help = "Date treated as today (default: the system date)"
    )]
    pub as_of: Option<NaiveDate>,

    /// Suspend overdue customers after the last command
    #[arg(
        long = "scan-overdue",
        help = "Run the overdue scan before writing the accounts"
    )]
    pub scan_overdue: bool,
}

/// Available parsing strategies for CSV processing
#[derive(Clone, Debug, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Batch settings for the async pipeline
    ///
    /// Options left out take their defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }

    /// Load the ledger configuration and combine it with the date options
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Config` if the config file cannot be used.
    pub fn to_settings(&self) -> Result<LedgerSettings, LedgerError> {
        Ok(LedgerSettings {
            config: LedgerConfig::load(self.config.as_deref())?,
            as_of: self.as_of,
            scan_overdue: self.scan_overdue,
        })
    }
}
