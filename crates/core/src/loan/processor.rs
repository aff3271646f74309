//! Processing plan: the accruals due for schedule rows that have elapsed
//! since a loan was last processed.

use chrono::NaiveDate;
use coopbank_shared::types::AccountId;
use rust_decimal::Decimal;

use super::error::LoanError;
use super::schedule::SchedulePeriod;
use super::types::LoanTransaction;
use crate::account::AccountType;

/// One accrual to post to the member ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accrual {
    /// Schedule row the accrual belongs to.
    pub period: u32,
    /// Due date of the row.
    pub scheduled_date: NaiveDate,
    /// Account credited.
    pub account_id: AccountId,
    /// Account type.
    pub account_type: AccountType,
    /// Account name.
    pub name: String,
    /// Amount.
    pub amount: Decimal,
}

/// Accruals to post and the loan's count afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessPlan {
    /// Accruals in row order, then type precedence.
    pub accruals: Vec<Accrual>,
    /// Rows processed after posting the accruals.
    pub new_count: u32,
}

impl ProcessPlan {
    /// True when there is nothing to post and the count does not move.
    #[must_use]
    pub fn is_noop(&self, current_count: u32) -> bool {
        self.accruals.is_empty() && self.new_count == current_count
    }
}

/// Plans processing of `loan` up to `today` (exclusive).
///
/// Rows from `loan.count` whose scheduled date is before `today` are
/// processed in order. Loan-type values are never accrued here; they are
/// collected through payments.
///
/// # Errors
///
/// Returns `LoanError::NotReleased` for unreleased loans.
pub fn plan_processing(
    loan: &LoanTransaction,
    schedule: &[SchedulePeriod],
    today: NaiveDate,
) -> Result<ProcessPlan, LoanError> {
    if loan.released_date.is_none() {
        return Err(LoanError::NotReleased(loan.id));
    }

    let mut plan = ProcessPlan {
        accruals: Vec::new(),
        new_count: loan.count,
    };
    for period in schedule.iter().skip(loan.count as usize) {
        if period.scheduled_date >= today {
            break;
        }
        plan.accruals.extend(
            period
                .accounts
                .iter()
                .filter(|v| v.account_type.accrues_per_period() && v.value > Decimal::ZERO)
                .map(|v| Accrual {
                    period: period.index,
                    scheduled_date: period.scheduled_date,
                    account_id: v.account_id,
                    account_type: v.account_type,
                    name: v.name.clone(),
                    amount: v.value,
                }),
        );
        plan.new_count = period.index + 1;
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ComputationType;
    use crate::loan::fixtures::{rules, sample_loan, snapshot};
    use crate::loan::schedule::compute_schedule;
    use crate::loan::types::ModeOfPayment;
    use rust_decimal_macros::dec;

    fn released_loan() -> (LoanTransaction, Vec<SchedulePeriod>, AccountId) {
        let mut loan = sample_loan(dec!(12000), ModeOfPayment::Monthly, 12);
        loan.released_date = loan.printed_date;
        let interest_id = AccountId::new();
        let mut interest = rules(AccountType::Interest);
        interest.computation_type = ComputationType::Straight;
        interest.interest_standard = dec!(2);
        let accounts = vec![
            snapshot(loan.scope, loan.account_id, rules(AccountType::Loan)),
            snapshot(loan.scope, interest_id, interest),
        ];
        let schedule = compute_schedule(&loan, &accounts, &[]).unwrap();
        (loan, schedule, interest_id)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unreleased_loan_rejected() {
        let (mut loan, schedule, _) = released_loan();
        loan.released_date = None;
        assert!(matches!(
            plan_processing(&loan, &schedule, date(2026, 6, 1)),
            Err(LoanError::NotReleased(_))
        ));
    }

    #[test]
    fn test_elapsed_rows_accrue_interest_only() {
        // Rows: 01-05, 02-04, 03-06, 04-05 ... (30-day steps)
        let (loan, schedule, interest_id) = released_loan();
        let plan = plan_processing(&loan, &schedule, date(2026, 3, 7)).unwrap();

        assert_eq!(plan.new_count, 3);
        assert_eq!(plan.accruals.len(), 2);
        assert!(plan.accruals.iter().all(|a| a.account_id == interest_id));
        assert!(plan.accruals.iter().all(|a| a.amount == dec!(240.00)));
        assert_eq!(plan.accruals[0].period, 1);
    }

    #[test]
    fn test_processing_resumes_from_count() {
        let (mut loan, schedule, _) = released_loan();
        let first = plan_processing(&loan, &schedule, date(2026, 3, 7)).unwrap();
        loan.count = first.new_count;

        let again = plan_processing(&loan, &schedule, date(2026, 3, 7)).unwrap();
        assert!(again.is_noop(loan.count));

        let later = plan_processing(&loan, &schedule, date(2030, 1, 1)).unwrap();
        assert_eq!(later.new_count, 13);
        assert_eq!(later.accruals.len(), 10);
        assert_eq!(later.accruals[0].period, 3);
    }
}
