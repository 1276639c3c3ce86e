//! CSV format handling for ledger commands and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to [`CommandRecord`]s, including the
//!   normalization of type-name aliases
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{CommandKind, CommandRecord, CustomerAccount, CustomerId, TransactionType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Date format of the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header of the account output
pub const ACCOUNT_HEADER: [&str; 6] = [
    "customer",
    "pending",
    "advance",
    "current",
    "credit_limit",
    "status",
];

/// Raw row of the import CSV
///
/// Every column except `type` and `customer` is optional; empty cells are
/// treated as absent.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub customer: CustomerId,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub target: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub detail: Option<String>,
}

/// Convert a CsvRecord into a CommandRecord
///
/// Type names are case-insensitive and treat `-`, `_` and spaces alike.
///
/// # Errors
///
/// Returns a message naming the row's customer if the type, amount or date
/// cannot be parsed, or if a required amount or target is missing.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<CommandRecord, String> {
    let kind = parse_kind(&csv_record.kind).ok_or_else(|| {
        format!(
            "Invalid command type: '{}' for customer {}",
            csv_record.kind, csv_record.customer
        )
    })?;

    let amount = match non_empty(csv_record.amount) {
        Some(raw) => Some(Decimal::from_str(&raw).map_err(|_| {
            format!(
                "Invalid amount '{}' for customer {}",
                raw, csv_record.customer
            )
        })?),
        None => None,
    };

    let date = match non_empty(csv_record.date) {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| {
            format!(
                "Invalid date '{}' for customer {}, expected YYYY-MM-DD",
                raw, csv_record.customer
            )
        })?),
        None => None,
    };

    let target = non_empty(csv_record.target);

    if kind.requires_amount() && amount.is_none() {
        return Err(format!(
            "{} command for customer {} requires an amount",
            csv_record.kind.trim(),
            csv_record.customer
        ));
    }
    if kind.requires_target() && target.is_none() {
        return Err(format!(
            "{} command for customer {} requires a target",
            csv_record.kind.trim(),
            csv_record.customer
        ));
    }

    Ok(CommandRecord {
        kind,
        customer: csv_record.customer,
        reference: non_empty(csv_record.reference),
        target,
        amount,
        date,
        detail: non_empty(csv_record.detail),
    })
}

/// Map a type column value onto a command kind
fn parse_kind(raw: &str) -> Option<CommandKind> {
    let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");

    match normalized.as_str() {
        "payment" => Some(CommandKind::Payment),
        "reverse" | "reversal" => Some(CommandKind::Reverse),
        "partial_reverse" | "partial_reversal" => Some(CommandKind::PartialReverse),
        "dispute" => Some(CommandKind::Dispute),
        "review" => Some(CommandKind::Review),
        "resolve" => Some(CommandKind::Resolve),
        other => TransactionType::from_str(other).ok().map(CommandKind::Post),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Render an amount with two decimals, never as "-0.00"
fn money(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded.is_zero() {
        format!("{:.2}", Decimal::ZERO)
    } else {
        format!("{:.2}", rounded)
    }
}

/// Write account states to CSV
///
/// Accounts are sorted by customer ID for deterministic output.
///
/// # Errors
///
/// Returns an error message if writing fails.
pub fn write_accounts_csv(
    accounts: &[CustomerAccount],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(ACCOUNT_HEADER)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&CustomerAccount> = accounts.iter().collect();
    sorted.sort_by_key(|account| account.id);

    for account in sorted {
        writer
            .write_record(&[
                account.id.to_string(),
                money(account.pending_balance),
                money(account.advance_balance),
                money(account.current_balance),
                money(account.credit_limit),
                account.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
