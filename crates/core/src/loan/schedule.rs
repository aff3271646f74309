//! Amortization schedule.
//!
//! `compute_schedule` is a pure function of the loan, the account
//! snapshots in effect at the print date and the holiday list. Row 0 is the
//! print date with zero values; rows `1..=n` are the due dates.

use chrono::{Datelike, NaiveDate};
use coopbank_shared::types::{round_money, AccountId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::calendar::{advance, skipped_days, Holiday, HolidayCalendar};
use super::error::ScheduleError;
use super::formulas::{compute_fines, compute_interest, number_of_payments, FinesInput};
use super::types::LoanTransaction;
use crate::account::{AccountSnapshot, AccountType, ComputationType};

/// Value of one account in one schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodValue {
    /// Account.
    pub account_id: AccountId,
    /// Account type, which fixes the row order.
    pub account_type: AccountType,
    /// Account name.
    pub name: String,
    /// Amount due for this account in this row.
    pub value: Decimal,
    /// Running total of `value` for this account up to this row.
    pub total: Decimal,
}

/// One row of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    /// Row number; 0 is the initial row.
    pub index: u32,
    /// Nominal due date from the mode rule.
    pub actual_date: NaiveDate,
    /// Due date after skipping excluded days.
    pub scheduled_date: NaiveDate,
    /// Excluded days between the nominal and the scheduled date.
    pub days_skipped: u32,
    /// Per-account values in type-precedence order.
    pub accounts: Vec<PeriodValue>,
    /// Remaining principal after this row.
    pub balance: Decimal,
    /// Sum of this row's values.
    pub total: Decimal,
}

impl SchedulePeriod {
    /// Value of `account_id` in this row, zero when absent.
    #[must_use]
    pub fn value_of(&self, account_id: AccountId) -> Decimal {
        self.accounts
            .iter()
            .find(|v| v.account_id == account_id)
            .map_or(Decimal::ZERO, |v| v.value)
    }
}

/// Computes the schedule of `loan`.
///
/// `accounts` are the related account snapshots in effect at the print
/// date and must include the loan account itself. Dates are local to the
/// loan account's currency.
///
/// # Errors
///
/// Returns a `ScheduleError` when the loan is not printed, the loan account
/// is missing, the terms give no payments, or the calendar runs out.
pub fn compute_schedule(
    loan: &LoanTransaction,
    accounts: &[AccountSnapshot],
    holidays: &[Holiday],
) -> Result<Vec<SchedulePeriod>, ScheduleError> {
    let printed = loan.printed_date.ok_or(ScheduleError::NotPrinted)?;
    let loan_account = accounts
        .iter()
        .find(|a| a.account_id == loan.account_id)
        .ok_or(ScheduleError::MissingLoanAccount(loan.account_id))?;
    let n = number_of_payments(loan.mode_of_payment, loan.terms)?;

    let currency = &loan_account.currency;
    let calendar = HolidayCalendar::new(holidays, currency);

    let mut ordered: Vec<&AccountSnapshot> = accounts.iter().collect();
    ordered.sort_by_key(|a| a.rules.account_type.schedule_precedence());

    let principal = loan.principal();
    let installment = round_money(principal / Decimal::from(n));
    let mut balance = principal;
    let mut totals = vec![Decimal::ZERO; ordered.len()];

    let mut nominal = currency.local_date(printed);
    let anchor_day = nominal.day();
    let mut periods = Vec::with_capacity(n as usize + 1);

    for index in 0..=n {
        if index > 0 {
            nominal = advance(nominal, loan.mode_of_payment, loan.calendar, anchor_day)?;
        }
        let days_skipped = skipped_days(nominal, loan.exclusions, &calendar)?;
        let scheduled_date = nominal
            .checked_add_days(chrono::Days::new(u64::from(days_skipped)))
            .ok_or(ScheduleError::DateOutOfRange)?;

        let opening = balance;
        let mut row_total = Decimal::ZERO;
        let mut values = Vec::with_capacity(ordered.len());

        for (slot, account) in ordered.iter().enumerate() {
            let value = if index == 0 {
                Decimal::ZERO
            } else {
                period_value(
                    loan,
                    account,
                    PeriodState {
                        principal,
                        opening,
                        installment,
                        is_last: index == n,
                        days_skipped,
                    },
                )
            };
            if account.account_id == loan.account_id {
                balance -= value;
            }
            totals[slot] += value;
            row_total += value;
            values.push(PeriodValue {
                account_id: account.account_id,
                account_type: account.rules.account_type,
                name: account.name.clone(),
                value,
                total: totals[slot],
            });
        }

        periods.push(SchedulePeriod {
            index,
            actual_date: nominal,
            scheduled_date,
            days_skipped,
            accounts: values,
            balance,
            total: row_total,
        });
    }

    Ok(periods)
}

#[derive(Debug, Clone, Copy)]
struct PeriodState {
    principal: Decimal,
    opening: Decimal,
    installment: Decimal,
    is_last: bool,
    days_skipped: u32,
}

fn period_value(loan: &LoanTransaction, account: &AccountSnapshot, state: PeriodState) -> Decimal {
    let rules = &account.rules;
    match rules.account_type {
        AccountType::Loan if account.account_id == loan.account_id => {
            // The last row takes the whole remaining balance, so it can
            // exceed the installment by the rounding remainder.
            if state.is_last {
                state.opening
            } else {
                state.installment.min(state.opening)
            }
        }
        AccountType::Fines if !rules.fines_waived => compute_fines(
            FinesInput {
                principal: state.principal,
                amortization_rate: rules.fines_amortization,
                maturity_rate: rules.fines_maturity,
                days_skipped: state.days_skipped,
                mode: loan.mode_of_payment,
            },
            &rules.fines_grace,
        ),
        AccountType::Interest | AccountType::SvfLedger => {
            let base = match rules.computation_type {
                ComputationType::Straight => state.principal,
                ComputationType::Diminishing | ComputationType::DiminishingStraight => {
                    state.opening
                }
            };
            compute_interest(base, rules.interest_standard, loan.mode_of_payment)
        }
        AccountType::Loan
        | AccountType::Fines
        | AccountType::Deposit
        | AccountType::Receivable
        | AccountType::Payable
        | AccountType::WriteOff
        | AccountType::Other => Decimal::ZERO,
    }
}
