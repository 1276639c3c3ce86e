//! Synchronous processing strategy
//!
//! This module provides a synchronous, single-threaded implementation of the
//! ProcessingStrategy trait. It orchestrates command replay by coordinating
//! between the SyncReader (for CSV input) and the Ledger (for business logic).
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command processing to `Ledger` (business logic)
//! - CSV output to `LedgerSettings::finish` (overdue scan, account output)
//!
//! Commands are applied strictly in file order.

use crate::io::sync_reader::SyncReader;
use crate::strategy::{log_rejected, LedgerSettings, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Single-threaded pipeline
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    settings: LedgerSettings,
}

impl SyncProcessingStrategy {
    pub fn new(settings: LedgerSettings) -> Self {
        Self { settings }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let ledger = self.settings.build_ledger();
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        for result in reader {
            match result {
                Ok(command) => {
                    let customer = command.customer;
                    match ledger.process(command) {
                        Ok(()) => applied += 1,
                        Err(e) => log_rejected(customer, &e),
                    }
                }
                Err(e) => warn!(error = %e, "Skipping record"),
            }
        }
        debug!(applied, "Finished replaying commands");

        self.settings.finish(&ledger, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,customer,ref,target,amount,date,detail\n";

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(strategy: &SyncProcessingStrategy, rows: &str) -> String {
        let file = create_temp_csv(rows);
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_sync_strategy_invoice_and_payment() {
        let output = run(
            &SyncProcessingStrategy::default(),
            "invoice,1,inv-1,,300,2026-01-10,\n\
             payment,1,,inv-1,500,2026-01-20,\n",
        );

        assert_eq!(
            output,
            "customer,pending,advance,current,credit_limit,status\n\
             1,0.00,200.00,-200.00,1000.00,active\n"
        );
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let mut output = Vec::new();
        let result =
            SyncProcessingStrategy::default().process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_sync_strategy_continues_on_bad_rows() {
        let output = run(
            &SyncProcessingStrategy::default(),
            "invoice,1,a,,100,,\n\
             invoice,2,b,,invalid,,\n\
             reverse,3,,missing,,,\n\
             invoice,4,c,,50,,\n",
        );

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,100.00"));
        // Customer 3 is provisioned even though its command failed
        assert!(lines[2].starts_with("3,0.00"));
        assert!(lines[3].starts_with("4,50.00"));
    }

    #[test]
    fn test_sync_strategy_scans_overdue() {
        let strategy = SyncProcessingStrategy::new(LedgerSettings {
            as_of: NaiveDate::from_ymd_opt(2026, 6, 1),
            scan_overdue: true,
            ..LedgerSettings::default()
        });

        let output = run(&strategy, "invoice,1,a,,100,2026-01-01,\n");
        assert!(output.contains("1,100.00,0.00,100.00,1000.00,suspended"));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
