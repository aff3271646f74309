//! Release planning: which ledger postings a loan release makes and which
//! accounts get a pinned loan account.

use coopbank_shared::types::AccountId;
use rust_decimal::Decimal;

use super::error::LoanError;
use super::types::{LoanTransaction, LoanTransactionEntry};
use crate::account::{Account, AccountSnapshot, AccountType};
use crate::ledger::EntryDirection;

/// One ledger posting of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLeg {
    /// Voucher position of the source leg.
    pub index: u32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Direction on the member ledger.
    pub direction: EntryDirection,
    /// Positive amount.
    pub amount: Decimal,
    /// Leg name, used as the entry description.
    pub name: String,
}

/// Checks that `loan` can be released.
///
/// # Errors
///
/// Returns `LoanError::AlreadyReleased` or `LoanError::NotPrinted`.
pub fn ensure_releasable(loan: &LoanTransaction) -> Result<(), LoanError> {
    if loan.released_date.is_some() {
        return Err(LoanError::AlreadyReleased(loan.id));
    }
    if loan.printed_date.is_none() {
        return Err(LoanError::NotPrinted(loan.id));
    }
    Ok(())
}

/// Ledger postings for the balanced `entries` of a loan, in voucher order.
///
/// Deleted automatic deductions and empty legs are skipped. Legs on
/// loan-type accounts are mirrored: the disbursement debited on the voucher
/// is a credit on the member's loan ledger.
///
/// # Errors
///
/// Returns a `LoanError` when a leg has no account or its account is not
/// among `accounts`.
pub fn plan_release(
    entries: &[LoanTransactionEntry],
    accounts: &[AccountSnapshot],
) -> Result<Vec<ReleaseLeg>, LoanError> {
    let mut ordered: Vec<&LoanTransactionEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.index);

    let mut legs = Vec::with_capacity(ordered.len());
    for entry in ordered {
        if entry.is_automatic_loan_deduction_deleted {
            continue;
        }
        let account_id = entry
            .account_id
            .ok_or(LoanError::EntryWithoutAccount(entry.index))?;
        let account = accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .ok_or(LoanError::MissingAccount(account_id))?;

        let (voucher_direction, amount) = if entry.debit > Decimal::ZERO {
            (EntryDirection::Debit, entry.debit)
        } else {
            (EntryDirection::Credit, entry.credit)
        };
        if amount <= Decimal::ZERO {
            continue;
        }
        let direction = match account.rules.account_type {
            AccountType::Loan => voucher_direction.opposite(),
            _ => voucher_direction,
        };
        legs.push(ReleaseLeg {
            index: entry.index,
            account_id,
            direction,
            amount,
            name: entry.name.clone(),
        });
    }
    Ok(legs)
}

/// Accounts that get a loan account at release: the loan account and every
/// account attached to it.
#[must_use]
pub fn related_accounts<'a>(loan: &LoanTransaction, accounts: &'a [Account]) -> Vec<&'a Account> {
    let mut related: Vec<&Account> = accounts
        .iter()
        .filter(|a| a.id == loan.account_id || a.rules.loan_account_id == Some(loan.account_id))
        .collect();
    related.sort_by_key(|a| (a.rules.account_type.schedule_precedence(), a.id));
    related.dedup_by_key(|a| a.id);
    related
}
