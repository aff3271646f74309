//! Loan error types.

use chrono::NaiveDate;
use coopbank_shared::types::{AccountId, LoanTransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::ModeOfPayment;

/// Errors that can occur while computing an amortization schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Mode and terms produce no payments.
    #[error("Terms {terms} give no payments for {mode:?} loans")]
    InvalidTerms {
        /// Mode of payment.
        mode: ModeOfPayment,
        /// Requested terms.
        terms: u32,
    },

    /// The schedule starts at the print date, which is not set.
    #[error("Loan has not been printed")]
    NotPrinted,

    /// The loan account itself is missing from the account set.
    #[error("Loan account {0} is missing from the schedule accounts")]
    MissingLoanAccount(AccountId),

    /// Every day for a long stretch is excluded.
    #[error("No business day found after {0}")]
    NoBusinessDay(NaiveDate),

    /// A date computation left the supported calendar.
    #[error("Date out of range")]
    DateOutOfRange,
}

impl ScheduleError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTerms { .. } => "INVALID_TERMS",
            Self::NotPrinted => "LOAN_NOT_PRINTED",
            Self::MissingLoanAccount(_) => "MISSING_LOAN_ACCOUNT",
            Self::NoBusinessDay(_) => "NO_BUSINESS_DAY",
            Self::DateOutOfRange => "DATE_OUT_OF_RANGE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidTerms { .. } | Self::MissingLoanAccount(_) | Self::DateOutOfRange => 400,
            Self::NotPrinted | Self::NoBusinessDay(_) => 422,
        }
    }
}

/// Errors that can occur during loan balancing, release and processing.
#[derive(Debug, Error)]
pub enum LoanError {
    // ========== State Errors ==========
    /// Release is one-time.
    #[error("Loan {0} is already released")]
    AlreadyReleased(LoanTransactionId),

    /// Processing needs a released loan.
    #[error("Loan {0} is not released")]
    NotReleased(LoanTransactionId),

    /// Release needs a printed voucher.
    #[error("Loan {0} is not printed")]
    NotPrinted(LoanTransactionId),

    /// Another processor holds the loan.
    #[error("Loan {0} is already being processed")]
    AlreadyProcessing(LoanTransactionId),

    // ========== Balancing Errors ==========
    /// The disbursing account is not cash or cash equivalent.
    #[error("Account {0} is not a cash or cash-equivalent account")]
    NotCashEquivalent(AccountId),

    /// An account referenced by the loan was not supplied.
    #[error("Account {0} not found for loan")]
    MissingAccount(AccountId),

    /// A voucher leg has no account.
    #[error("Loan entry at index {0} has no account")]
    EntryWithoutAccount(u32),

    /// A voucher has one cash leg and one loan leg, no more.
    #[error("Loan voucher has {0} static legs; at most 2 are allowed")]
    TooManyStaticEntries(usize),

    /// Deductions exceed the applied amount.
    #[error("Deductions exceed the applied amount; cash leg would be {0}")]
    NegativeCashLeg(Decimal),

    /// Renewals and restructures need the previous loan.
    #[error("Previous loan is required for this loan type")]
    MissingPreviousLoan,

    /// Voucher debits and credits differ.
    #[error("Loan voucher is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    // ========== Wrapped ==========
    /// Schedule computation failed.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl LoanError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyReleased(_) => "LOAN_ALREADY_RELEASED",
            Self::NotReleased(_) => "LOAN_NOT_RELEASED",
            Self::NotPrinted(_) => "LOAN_NOT_PRINTED",
            Self::AlreadyProcessing(_) => "LOAN_ALREADY_PROCESSING",
            Self::NotCashEquivalent(_) => "NOT_CASH_EQUIVALENT",
            Self::MissingAccount(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryWithoutAccount(_) => "ENTRY_WITHOUT_ACCOUNT",
            Self::TooManyStaticEntries(_) => "TOO_MANY_STATIC_ENTRIES",
            Self::NegativeCashLeg(_) => "NEGATIVE_CASH_LEG",
            Self::MissingPreviousLoan => "MISSING_PREVIOUS_LOAN",
            Self::Unbalanced { .. } => "UNBALANCED_VOUCHER",
            Self::Schedule(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingAccount(_) => 404,
            Self::NotCashEquivalent(_)
            | Self::EntryWithoutAccount(_)
            | Self::MissingPreviousLoan => 400,
            Self::AlreadyReleased(_)
            | Self::NotReleased(_)
            | Self::NotPrinted(_)
            | Self::AlreadyProcessing(_)
            | Self::TooManyStaticEntries(_)
            | Self::NegativeCashLeg(_)
            | Self::Unbalanced { .. } => 422,
            Self::Schedule(e) => e.http_status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let id = LoanTransactionId::new();
        assert_eq!(LoanError::AlreadyProcessing(id).error_code(), "LOAN_ALREADY_PROCESSING");
        assert_eq!(LoanError::AlreadyProcessing(id).http_status_code(), 422);
        assert_eq!(
            LoanError::from(ScheduleError::NotPrinted).error_code(),
            "LOAN_NOT_PRINTED"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ScheduleError::InvalidTerms {
            mode: ModeOfPayment::Quarterly,
            terms: 2,
        };
        assert_eq!(err.to_string(), "Terms 2 give no payments for Quarterly loans");
    }
}
