//! Balance arithmetic
//!
//! Pure functions mapping a ledger entry onto a customer's pending / advance
//! split. Nothing here touches storage; the ledger engine calls these to build
//! the before/after snapshots it persists, and reconciliation calls
//! [`replay`] to rebuild balances from the log.
//!
//! # Rules
//!
//! - A charge (positive impact) increases pending.
//! - A credit (negative impact) pays down pending first; any remainder
//!   becomes advance.
//! - A write-off only ever reduces pending and never creates advance.
//! - A negative opening balance is carried straight into advance.
//!
//! Pending and advance are never negative. All arithmetic is checked.

use rust_decimal::Decimal;

use crate::types::{BalanceSnapshot, CustomerId, LedgerError, TransactionType};

/// Tolerance used when deciding whether an invoice is settled
pub const SETTLEMENT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Result of applying one entry to a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: BalanceSnapshot,
    pub after: BalanceSnapshot,
    /// Signed change of the current balance
    pub impact: Decimal,
}

/// Apply a new entry of `tx_type` with `net_amount` to `before`
///
/// # Arguments
///
/// * `customer` - Customer the balances belong to (for error context)
/// * `tx_type` - Type of the entry being posted
/// * `net_amount` - Net amount as supplied by the caller
/// * `before` - Balances prior to posting
///
/// # Errors
///
/// Returns `ArithmeticOverflow` if any intermediate value overflows.
pub fn apply(
    customer: CustomerId,
    tx_type: TransactionType,
    net_amount: Decimal,
    before: BalanceSnapshot,
) -> Result<BalanceChange, LedgerError> {
    let op = tx_type.as_str();

    let (after, impact) = match tx_type {
        TransactionType::Invoice | TransactionType::DebitNote => {
            (charge(customer, op, before, net_amount)?, net_amount)
        }
        TransactionType::Payment | TransactionType::Refund | TransactionType::CreditNote => {
            (credit(customer, op, before, net_amount)?, -net_amount)
        }
        TransactionType::Adjustment | TransactionType::Reversal => {
            if net_amount >= Decimal::ZERO {
                (charge(customer, op, before, net_amount)?, net_amount)
            } else {
                (credit(customer, op, before, -net_amount)?, net_amount)
            }
        }
        TransactionType::WriteOff => {
            let written_off = net_amount.min(before.pending_balance).max(Decimal::ZERO);
            let pending = checked_sub(customer, op, before.pending_balance, written_off)?;
            (
                BalanceSnapshot::from_split(pending, before.advance_balance),
                -written_off,
            )
        }
        TransactionType::OpeningBalance => {
            if net_amount >= Decimal::ZERO {
                (charge(customer, op, before, net_amount)?, net_amount)
            } else {
                let advance = checked_add(customer, op, before.advance_balance, -net_amount)?;
                (
                    BalanceSnapshot::from_split(before.pending_balance, advance),
                    net_amount,
                )
            }
        }
    };

    Ok(BalanceChange {
        before,
        after,
        impact,
    })
}

/// Re-apply a posted entry from its recorded impact
///
/// Used by reconciliation: the stored `balance_impact` is authoritative, so
/// the net amount is recovered from it before running the posting rules.
pub fn replay(
    customer: CustomerId,
    tx_type: TransactionType,
    balance_impact: Decimal,
    before: BalanceSnapshot,
) -> Result<BalanceSnapshot, LedgerError> {
    let net_amount = match tx_type {
        TransactionType::Payment
        | TransactionType::Refund
        | TransactionType::CreditNote
        | TransactionType::WriteOff => -balance_impact,
        TransactionType::Invoice
        | TransactionType::DebitNote
        | TransactionType::Adjustment
        | TransactionType::Reversal
        | TransactionType::OpeningBalance => balance_impact,
    };

    apply(customer, tx_type, net_amount, before).map(|change| change.after)
}

/// Increase pending by `amount`
fn charge(
    customer: CustomerId,
    op: &str,
    before: BalanceSnapshot,
    amount: Decimal,
) -> Result<BalanceSnapshot, LedgerError> {
    let pending = checked_add(customer, op, before.pending_balance, amount)?;
    Ok(BalanceSnapshot::from_split(pending, before.advance_balance))
}

/// Reduce pending by `amount`, spilling the excess into advance
fn credit(
    customer: CustomerId,
    op: &str,
    before: BalanceSnapshot,
    amount: Decimal,
) -> Result<BalanceSnapshot, LedgerError> {
    let from_pending = amount.min(before.pending_balance);
    let to_advance = checked_sub(customer, op, amount, from_pending)?;

    let pending = checked_sub(customer, op, before.pending_balance, from_pending)?;
    let advance = checked_add(customer, op, before.advance_balance, to_advance)?;

    Ok(BalanceSnapshot::from_split(pending, advance))
}

fn checked_add(
    customer: CustomerId,
    op: &str,
    lhs: Decimal,
    rhs: Decimal,
) -> Result<Decimal, LedgerError> {
    lhs.checked_add(rhs)
        .ok_or_else(|| LedgerError::arithmetic_overflow(op, customer))
}

fn checked_sub(
    customer: CustomerId,
    op: &str,
    lhs: Decimal,
    rhs: Decimal,
) -> Result<Decimal, LedgerError> {
    lhs.checked_sub(rhs)
        .ok_or_else(|| LedgerError::arithmetic_overflow(op, customer))
}
