//! Loan lifecycle logic.
//!
//! This module implements:
//! - Due-date arithmetic with weekend and holiday skipping
//! - Interest, fines and automatic deduction formulas
//! - The amortization schedule
//! - Balancing a loan's voucher legs
//! - Release and processing plans

pub mod balancing;
pub mod calendar;
pub mod error;
pub mod formulas;
pub mod processor;
pub mod release;
pub mod schedule;
pub mod types;

#[cfg(test)]
mod fixtures;
#[cfg(test)]
mod schedule_props;

pub use balancing::{balance_loan, BalancedLoan, BalancingInput, LoanTotals, PreviousLoan};
pub use calendar::{advance, skipped_days, Holiday, HolidayCalendar};
pub use error::{LoanError, ScheduleError};
pub use formulas::{
    amortization_amount, compute_fines, compute_interest, loan_computation, number_of_payments,
    FinesInput,
};
pub use processor::{plan_processing, Accrual, ProcessPlan};
pub use release::{ensure_releasable, plan_release, related_accounts, ReleaseLeg};
pub use schedule::{compute_schedule, PeriodValue, SchedulePeriod};
pub use types::{
    AutomaticLoanDeduction, Exclusions, LoanAccount, LoanEntryKind, LoanTransaction,
    LoanTransactionEntry, LoanType, ModeOfPayment, PaymentCalendar,
};
