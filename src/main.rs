//! Customer ledger CLI
//!
//! Replays ledger commands from a CSV file and prints the resulting customer
//! accounts.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --strategy sync commands.csv > accounts.csv
//! cargo run -- --config ledger.toml --as-of 2026-06-30 --scan-overdue commands.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 commands.csv
//! ```
//!
//! Accounts are written to stdout; logs go to stderr and are filtered with
//! `RUST_LOG` (default `info,customer_ledger=debug`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad configuration, unreadable input, failed output)

use customer_ledger::cli;
use customer_ledger::strategy;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,customer_ledger=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let settings = match args.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load ledger configuration");
            process::exit(1);
        }
    };

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, config, settings)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "Processing failed");
        process::exit(1);
    }
}
