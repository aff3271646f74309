//! Loan arithmetic: payment counts, per-period interest and fines,
//! automatic deduction amounts and amortization.
//!
//! Rates are percentages. Every result is rounded to two decimals.

use coopbank_shared::types::round_money;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ScheduleError;
use super::types::{AutomaticLoanDeduction, LoanTransaction, ModeOfPayment};
use crate::account::FinesGracePeriod;

const HUNDRED: Decimal = dec!(100);
const THIRTY: Decimal = dec!(30);

/// Number of scheduled payments for `mode` over `terms`.
///
/// # Errors
///
/// Returns `ScheduleError::InvalidTerms` when the mode yields no payments,
/// e.g. a quarterly loan with fewer than three terms.
pub fn number_of_payments(mode: ModeOfPayment, terms: u32) -> Result<u32, ScheduleError> {
    let n = match mode {
        ModeOfPayment::Daily => terms.saturating_mul(30),
        ModeOfPayment::Weekly => terms.saturating_mul(4),
        ModeOfPayment::SemiMonthly => terms.saturating_mul(2),
        ModeOfPayment::Monthly | ModeOfPayment::FixedDays => terms,
        ModeOfPayment::Quarterly => terms / 3,
        ModeOfPayment::SemiAnnual => terms / 6,
        ModeOfPayment::Lumpsum => 1,
    };
    if n == 0 {
        return Err(ScheduleError::InvalidTerms { mode, terms });
    }
    Ok(n)
}

/// Interest for one period of `mode` on `base` at `rate` percent a month.
#[must_use]
pub fn compute_interest(base: Decimal, rate: Decimal, mode: ModeOfPayment) -> Decimal {
    let monthly = base * rate / HUNDRED;
    let value = match mode {
        ModeOfPayment::Monthly | ModeOfPayment::Lumpsum => monthly,
        ModeOfPayment::Daily | ModeOfPayment::FixedDays => monthly / THIRTY,
        ModeOfPayment::Weekly => monthly / THIRTY * dec!(7),
        ModeOfPayment::SemiMonthly => monthly / THIRTY * dec!(15),
        ModeOfPayment::Quarterly => monthly * dec!(3),
        ModeOfPayment::SemiAnnual => monthly * dec!(6),
    };
    round_money(value)
}

/// Days covered by one fines period of `mode`.
const fn fines_period_days(mode: ModeOfPayment) -> Option<i64> {
    match mode {
        ModeOfPayment::Daily | ModeOfPayment::FixedDays => Some(1),
        ModeOfPayment::Weekly => Some(7),
        ModeOfPayment::SemiMonthly => Some(15),
        ModeOfPayment::Monthly => Some(30),
        ModeOfPayment::Quarterly => Some(90),
        ModeOfPayment::SemiAnnual => Some(180),
        ModeOfPayment::Lumpsum => None,
    }
}

/// Inputs of a fines computation.
#[derive(Debug, Clone, Copy)]
pub struct FinesInput {
    /// Amount fines are charged on.
    pub principal: Decimal,
    /// Rate for ordinary late amortizations.
    pub amortization_rate: Decimal,
    /// Rate once more than a month has been skipped.
    pub maturity_rate: Decimal,
    /// Excluded days in front of the due date.
    pub days_skipped: u32,
    /// Mode of payment.
    pub mode: ModeOfPayment,
}

/// Fines for skipped days in front of a due date.
#[must_use]
pub fn compute_fines(input: FinesInput, grace: &FinesGracePeriod) -> Decimal {
    if input.days_skipped == 0 {
        return Decimal::ZERO;
    }
    let mut rate = if input.days_skipped > 30 {
        input.maturity_rate
    } else {
        input.amortization_rate
    };
    if rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let grace = grace.for_mode(input.mode);
    if grace >= HUNDRED {
        return Decimal::ZERO;
    }
    if grace > Decimal::ZERO {
        rate *= Decimal::ONE - grace / HUNDRED;
    }

    let value = match fines_period_days(input.mode) {
        Some(days) => {
            let periods = Decimal::from(input.days_skipped) / Decimal::from(days);
            input.principal * rate / HUNDRED * periods
        }
        None => {
            let lump = if input.maturity_rate > Decimal::ZERO {
                input.maturity_rate
            } else {
                input.amortization_rate
            };
            input.principal * lump / HUNDRED
        }
    };
    round_money(value)
}

/// Amount an automatic deduction rule charges `loan`.
#[must_use]
pub fn loan_computation(rule: &AutomaticLoanDeduction, loan: &LoanTransaction) -> Decimal {
    let applied = loan.applied;
    if rule.min_amount > Decimal::ZERO && applied < rule.min_amount {
        return Decimal::ZERO;
    }
    if rule.max_amount > Decimal::ZERO && applied > rule.max_amount {
        return Decimal::ZERO;
    }

    let p1 = rule.charges_percentage_1;
    let p2 = rule.charges_percentage_2;
    let mut result = applied;
    if p1 > Decimal::ZERO || p2 > Decimal::ZERO {
        let pct = if p1 > Decimal::ZERO && p2 > Decimal::ZERO {
            if rule.add_on { p2 } else { p1 }
        } else if p1 > Decimal::ZERO {
            p1
        } else {
            p2
        };
        result = result * pct / HUNDRED;
    }

    if rule.charges_divisor > Decimal::ZERO && result > Decimal::ZERO {
        result = result / rule.charges_divisor * rule.charges_amount;
    }

    let terms = Decimal::from(loan.terms);
    match rule.number_of_months {
        0 if rule.anum => result /= dec!(12),
        -1 => result = result * terms / dec!(12),
        m if m > 0 => result = result * terms / Decimal::from(m),
        _ => {}
    }

    // No percentage, divisor or month scaling applied: the rule is a flat charge.
    if result == applied {
        return rule.charges_amount;
    }
    round_money(result)
}

/// Per-period amortization of the applied amount.
///
/// # Errors
///
/// Returns `ScheduleError::InvalidTerms` when `terms` is zero for a
/// mode that divides by it.
pub fn amortization_amount(loan: &LoanTransaction) -> Result<Decimal, ScheduleError> {
    let mode = loan.mode_of_payment;
    if mode == ModeOfPayment::Lumpsum {
        return Ok(round_money(loan.applied));
    }
    if loan.terms == 0 {
        return Err(ScheduleError::InvalidTerms {
            mode,
            terms: loan.terms,
        });
    }
    let terms = Decimal::from(loan.terms);
    let value = match mode {
        ModeOfPayment::Daily => loan.applied / terms / THIRTY,
        ModeOfPayment::Weekly => loan.applied / terms / dec!(4),
        ModeOfPayment::SemiMonthly => loan.applied / terms / dec!(2),
        ModeOfPayment::Monthly | ModeOfPayment::FixedDays => loan.applied / terms,
        ModeOfPayment::Quarterly => loan.applied / (terms / dec!(3)),
        ModeOfPayment::SemiAnnual => loan.applied / (terms / dec!(6)),
        ModeOfPayment::Lumpsum => loan.applied,
    };
    Ok(round_money(value))
}

#[cfg(test)]
#[path = "formulas_tests.rs"]
mod tests;
