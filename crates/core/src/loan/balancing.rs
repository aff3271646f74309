//! Loan balancing: rebuilding a loan's voucher legs.
//!
//! The rebuilt set always starts with the cash leg followed by the loan
//! leg, then manual deductions, automatic deductions and the previous-loan
//! settlement. Callers replace every stored leg with the returned ones.

use coopbank_shared::types::round_money;
use rust_decimal::Decimal;

use super::error::LoanError;
use super::formulas::{amortization_amount, loan_computation};
use super::types::{AutomaticLoanDeduction, LoanEntryKind, LoanTransaction, LoanTransactionEntry};
use crate::account::AccountSnapshot;

/// Everything balancing reads.
#[derive(Debug, Clone, Copy)]
pub struct BalancingInput<'a> {
    /// The loan being balanced.
    pub loan: &'a LoanTransaction,
    /// Snapshot of the loan account.
    pub loan_account: &'a AccountSnapshot,
    /// Disbursing account, used when the static pair has to be created.
    pub cash_account: Option<&'a AccountSnapshot>,
    /// Currently stored legs.
    pub existing: &'a [LoanTransactionEntry],
    /// Rules of the loan account's computation sheet.
    pub deduction_rules: &'a [AutomaticLoanDeduction],
    /// Loan settled by a renewal or restructure.
    pub previous: Option<PreviousLoan<'a>>,
}

/// A loan settled by the one being balanced.
#[derive(Debug, Clone, Copy)]
pub struct PreviousLoan<'a> {
    /// The settled loan.
    pub loan: &'a LoanTransaction,
    /// Name of its loan account.
    pub account_name: &'a str,
}

/// Loan totals produced by balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTotals {
    /// Sum of debits of non-deleted legs.
    pub total_debit: Decimal,
    /// Sum of credits of non-deleted legs.
    pub total_credit: Decimal,
    /// Per-period amortization.
    pub amortization: Decimal,
}

impl LoanTotals {
    /// Writes the totals onto `loan`. Principal and balance follow the credit total.
    pub fn apply(&self, loan: &mut LoanTransaction) {
        loan.total_debit = self.total_debit;
        loan.total_credit = self.total_credit;
        loan.total_principal = self.total_credit;
        loan.balance = self.total_credit;
        loan.amortization = self.amortization;
    }
}

/// The rebuilt legs and totals.
#[derive(Debug, Clone)]
pub struct BalancedLoan {
    /// Legs with a dense index, cash leg first.
    pub entries: Vec<LoanTransactionEntry>,
    /// Totals to store on the loan.
    pub totals: LoanTotals,
}

#[derive(Default)]
struct DeductionTotals {
    add_on: Decimal,
    non_add_on: Decimal,
}

impl DeductionTotals {
    fn add(&mut self, is_add_on: bool, amount: Decimal) {
        if is_add_on {
            self.add_on += amount;
        } else {
            self.non_add_on += amount;
        }
    }
}

/// Rebuilds the legs of a loan.
///
/// # Errors
///
/// Returns a `LoanError` when the static pair cannot be built or has more
/// than two legs, the previous loan is missing, deductions exceed the
/// applied amount, a leg has no account, or the result does not balance.
pub fn balance_loan(input: BalancingInput<'_>) -> Result<BalancedLoan, LoanError> {
    let loan = input.loan;
    let skip_automatic = loan.loan_type.skips_automatic_deductions();

    let mut statics = Vec::new();
    let mut manual = Vec::new();
    let mut automatic = Vec::new();
    for entry in input.existing {
        match entry.kind {
            LoanEntryKind::Static => statics.push(entry.clone()),
            LoanEntryKind::Deduction => manual.push(entry.clone()),
            LoanEntryKind::AutomaticDeduction if !skip_automatic => automatic.push(entry.clone()),
            LoanEntryKind::AutomaticDeduction | LoanEntryKind::Previous => {}
        }
    }

    let (mut cash, mut loan_leg) = static_pair(input, statics)?;
    let mut totals = DeductionTotals::default();
    let mut rest = Vec::new();

    for entry in manual {
        totals.add(entry.is_add_on, entry.credit);
        rest.push(entry);
    }

    for mut entry in automatic.iter().cloned() {
        if entry.is_automatic_loan_deduction_deleted {
            rest.push(entry);
            continue;
        }
        if entry.amount != Decimal::ZERO {
            entry.credit = entry.amount;
        } else if let Some(rule) = entry
            .automatic_loan_deduction_id
            .and_then(|id| input.deduction_rules.iter().find(|r| r.id == id))
        {
            entry.credit = loan_computation(rule, loan);
        }
        totals.add(entry.is_add_on, entry.credit);
        if entry.credit > Decimal::ZERO {
            rest.push(entry);
        }
    }

    if !skip_automatic {
        for rule in input.deduction_rules {
            let present = automatic
                .iter()
                .any(|e| e.automatic_loan_deduction_id == Some(rule.id));
            if present {
                continue;
            }
            let mut entry = LoanTransactionEntry::new(loan, LoanEntryKind::AutomaticDeduction, &rule.name);
            entry.account_id = Some(rule.account_id);
            entry.automatic_loan_deduction_id = Some(rule.id);
            entry.is_add_on = rule.add_on;
            entry.credit = loan_computation(rule, loan);
            totals.add(entry.is_add_on, entry.credit);
            if entry.credit > Decimal::ZERO {
                rest.push(entry);
            }
        }
    }

    if loan.loan_type.settles_previous_loan() && loan.previous_loan_id.is_some() {
        let previous = input.previous.ok_or(LoanError::MissingPreviousLoan)?;
        let mut entry = LoanTransactionEntry::new(loan, LoanEntryKind::Previous, previous.account_name);
        entry.account_id = Some(previous.loan.account_id);
        entry.credit = previous.loan.balance;
        totals.non_add_on += entry.credit;
        rest.push(entry);
    }

    cash.credit = if loan.is_add_on {
        loan.applied - totals.non_add_on
    } else {
        loan.applied - totals.non_add_on - totals.add_on
    };
    if cash.credit < Decimal::ZERO {
        return Err(LoanError::NegativeCashLeg(cash.credit));
    }

    loan_leg.debit = loan.applied;
    loan_leg.name = format!("{}{}", input.loan_account.name, loan.loan_type.entry_suffix());
    if loan.is_add_on && totals.add_on > Decimal::ZERO {
        loan_leg.name = format!("{} + Add On Interest (+{})", loan_leg.name, totals.add_on);
        loan_leg.debit += totals.add_on;
    }

    let mut entries = Vec::with_capacity(rest.len() + 2);
    entries.push(cash);
    entries.push(loan_leg);
    entries.extend(rest);

    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.index = u32::try_from(index).unwrap_or(u32::MAX);
        entry.loan_transaction_id = loan.id;
        entry.scope = loan.scope;
        entry.debit = round_money(entry.debit);
        entry.credit = round_money(entry.credit);
        if entry.account_id.is_none() {
            return Err(LoanError::EntryWithoutAccount(entry.index));
        }
        if !entry.is_automatic_loan_deduction_deleted {
            total_debit += entry.debit;
            total_credit += entry.credit;
        }
    }
    if total_debit != total_credit {
        return Err(LoanError::Unbalanced {
            debit: total_debit,
            credit: total_credit,
        });
    }

    Ok(BalancedLoan {
        entries,
        totals: LoanTotals {
            total_debit,
            total_credit,
            amortization: amortization_amount(loan)?,
        },
    })
}

/// Cash and loan legs, existing or default, in that order.
fn static_pair(
    input: BalancingInput<'_>,
    mut statics: Vec<LoanTransactionEntry>,
) -> Result<(LoanTransactionEntry, LoanTransactionEntry), LoanError> {
    let loan = input.loan;
    if statics.len() > 2 {
        return Err(LoanError::TooManyStaticEntries(statics.len()));
    }
    if statics.len() == 2 {
        let loan_at = statics
            .iter()
            .position(|e| e.account_id == Some(loan.account_id))
            .unwrap_or(1);
        let loan_leg = statics.remove(loan_at);
        let cash = statics.remove(0);
        return Ok((cash, loan_leg));
    }

    let cash_account = input
        .cash_account
        .ok_or(LoanError::EntryWithoutAccount(0))?;
    if !cash_account.rules.cash_and_cash_equivalence {
        return Err(LoanError::NotCashEquivalent(cash_account.account_id));
    }
    let mut cash = LoanTransactionEntry::new(loan, LoanEntryKind::Static, &cash_account.name);
    cash.account_id = Some(cash_account.account_id);
    cash.credit = loan.applied;

    let mut loan_leg = LoanTransactionEntry::new(loan, LoanEntryKind::Static, &input.loan_account.name);
    loan_leg.account_id = Some(loan.account_id);
    loan_leg.debit = loan.applied;
    Ok((cash, loan_leg))
}

#[cfg(test)]
#[path = "balancing_tests.rs"]
mod tests;
