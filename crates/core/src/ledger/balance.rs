//! The sign convention and balance-chain arithmetic.
//!
//! One convention applies to every account type: a credit raises the chain
//! balance, a debit lowers it. Loan chains follow it too, so an outstanding
//! loan balance is positive and repayments (debits) reduce it.

use chrono::{DateTime, NaiveDate, Utc};
use coopbank_shared::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::{EntryDirection, GeneralLedgerEntry};
use super::error::PostingError;
use crate::account::AccountType;

/// Signed effect of an entry on its chain balance.
#[must_use]
pub fn signed_change(
    account_type: AccountType,
    direction: EntryDirection,
    amount: Decimal,
) -> Decimal {
    let credit_positive = match direction {
        EntryDirection::Credit => amount,
        EntryDirection::Debit => -amount,
    };
    match account_type {
        AccountType::Deposit
        | AccountType::Other
        | AccountType::Loan
        | AccountType::Receivable
        | AccountType::Payable
        | AccountType::Fines
        | AccountType::Interest
        | AccountType::SvfLedger
        | AccountType::WriteOff => credit_positive,
    }
}

/// Balance after applying an entry to `previous`.
#[must_use]
pub fn next_balance(
    account_type: AccountType,
    previous: Decimal,
    direction: EntryDirection,
    amount: Decimal,
) -> Decimal {
    previous + signed_change(account_type, direction, amount)
}

/// Checks a resulting balance against `[min, max]`.
///
/// A zero `max` leaves the upper side open.
///
/// # Errors
///
/// Returns `PostingError::LimitExceeded` when the balance is out of range.
pub fn check_limits(limits: Option<(Decimal, Decimal)>, balance: Decimal) -> Result<(), PostingError> {
    let Some((min, max)) = limits else {
        return Ok(());
    };
    if balance < min || (!max.is_zero() && balance > max) {
        return Err(PostingError::LimitExceeded { balance, min, max });
    }
    Ok(())
}

/// Replays a chain in order and verifies every stored balance.
///
/// Returns the final balance.
///
/// # Errors
///
/// Returns `PostingError::BrokenChain` at the first entry whose stored
/// balances disagree with the replay.
pub fn replay(entries: &[GeneralLedgerEntry]) -> Result<Decimal, PostingError> {
    let mut ordered: Vec<&GeneralLedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.entry_date, e.seq));

    let mut balance = Decimal::ZERO;
    for entry in ordered {
        let expected = next_balance(entry.account_type, balance, entry.direction(), entry.amount());
        if entry.previous_balance != balance || entry.balance != expected {
            return Err(PostingError::BrokenChain { seq: entry.seq });
        }
        balance = expected;
    }
    Ok(balance)
}

/// Ending balance of one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    /// Local date in the account currency's timezone.
    pub date: NaiveDate,
    /// Chain balance at the end of that day.
    pub balance: Decimal,
}

/// Day-by-day ending balances between two instants, inclusive.
///
/// Days are cut in the currency's timezone. The opening balance is the last
/// entry before the first day; days without entries carry the prior balance.
#[must_use]
pub fn daily_ending_balances(
    entries: &[GeneralLedgerEntry],
    currency: &Currency,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<DailyBalance> {
    let first_day = currency.local_date(from);
    let last_day = currency.local_date(to);
    if last_day < first_day {
        return Vec::new();
    }

    let mut ordered: Vec<&GeneralLedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.entry_date, e.seq));

    let mut cursor = ordered.iter().peekable();
    let mut balance = Decimal::ZERO;
    while let Some(entry) = cursor.next_if(|e| currency.local_date(e.entry_date) < first_day) {
        balance = entry.balance;
    }

    let mut result = Vec::new();
    for day in first_day.iter_days().take_while(|d| *d <= last_day) {
        while let Some(entry) = cursor.next_if(|e| currency.local_date(e.entry_date) == day) {
            balance = entry.balance;
        }
        result.push(DailyBalance { date: day, balance });
    }
    result
}
