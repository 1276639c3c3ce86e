//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory (and config.toml if present)
//! 2. Replays all commands through the ledger
//! 3. Generates output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Invoicing and payment allocation
//! - Overpayments carried as advance
//! - Credit limit enforcement
//! - Full, partial and payment reversals
//! - Dispute resolution
//! - Write-offs, opening balances and signed adjustments
//! - Overdue suspension
//! - Per-customer configuration
//! - Malformed and rejected rows
//!
//! Each test is run twice: once with the synchronous strategy and once with the async strategy.

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use customer_ledger::cli::StrategyType;
    use customer_ledger::strategy::{create_strategy, BatchConfig, LedgerSettings};
    use customer_ledger::LedgerConfig;
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Run a fixture and compare its output with expected.csv
    ///
    /// # Arguments
    ///
    /// * `fixture_name` - Name of the fixture directory (e.g., "happy_path")
    /// * `strategy_type` - Sync or Async
    /// * `as_of` - Fixed "today"; when given, the overdue scan runs too
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, as_of: Option<&str>) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);
        let config_path = format!("{}/config.toml", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let config = if Path::new(&config_path).exists() {
            LedgerConfig::load(Some(Path::new(&config_path)))
                .unwrap_or_else(|e| panic!("Failed to load {}: {}", config_path, e))
        } else {
            LedgerConfig::default()
        };
        let as_of = as_of.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap());
        let settings = LedgerSettings {
            config,
            as_of,
            scan_overdue: as_of.is_some(),
        };

        // Small batches so labels cross batch boundaries in async mode
        let strategy = create_strategy(strategy_type.clone(), Some(BatchConfig::new(3, 2)), settings);

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process commands: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    /// End-to-end test for all fixtures with both strategies
    #[rstest]
    #[case("happy_path", None)]
    #[case("overpayment_advance", None)]
    #[case("credit_limit", None)]
    #[case("reversals", None)]
    #[case("dispute_resolution", None)]
    #[case("write_offs_and_openings", None)]
    #[case("malformed_data", None)]
    #[case("configured_customers", None)]
    #[case("overdue_suspension", Some("2026-06-01"))]
    fn test_fixtures(
        #[case] fixture: &str,
        #[case] as_of: Option<&str>,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, as_of);
    }
}
