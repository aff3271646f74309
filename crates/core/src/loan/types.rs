//! Loan domain types.

use chrono::{DateTime, Utc, Weekday};
use coopbank_shared::types::{
    AccountHistoryId, AccountId, AutomaticLoanDeductionId, ComputationSheetId, LoanAccountId,
    LoanTransactionEntryId, LoanTransactionId, MemberProfileId, Scope, TransactionBatchId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Periodicity rule governing due-date advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeOfPayment {
    /// Every day.
    Daily,
    /// Every week on a configured weekday.
    Weekly,
    /// Twice a month on two configured paydays.
    SemiMonthly,
    /// Every month.
    Monthly,
    /// Every three months.
    Quarterly,
    /// Every six months.
    SemiAnnual,
    /// One payment at maturity.
    Lumpsum,
    /// Every day, for a fixed number of days.
    FixedDays,
}

/// How a loan relates to earlier loans of the same member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    /// A fresh loan.
    Standard,
    /// A fresh loan that carries a previous loan without deductions.
    StandardPrevious,
    /// The remaining balance of a previous loan rewritten with new terms.
    Restructured,
    /// A new loan that pays off the previous one.
    Renewal,
    /// A renewal that skips automatic deductions.
    RenewalWithoutDeduct,
}

impl LoanType {
    /// Automatic deductions are not applied to these loan types.
    #[must_use]
    pub const fn skips_automatic_deductions(self) -> bool {
        match self {
            Self::RenewalWithoutDeduct | Self::Restructured | Self::StandardPrevious => true,
            Self::Standard | Self::Renewal => false,
        }
    }

    /// These loan types settle the previous loan's balance at release.
    #[must_use]
    pub const fn settles_previous_loan(self) -> bool {
        match self {
            Self::Restructured | Self::Renewal | Self::RenewalWithoutDeduct => true,
            Self::Standard | Self::StandardPrevious => false,
        }
    }

    /// Suffix appended to the loan-account leg name.
    #[must_use]
    pub const fn entry_suffix(self) -> &'static str {
        match self {
            Self::Standard | Self::StandardPrevious => "",
            Self::Restructured => " - RESTRUCTURED",
            Self::Renewal | Self::RenewalWithoutDeduct => " - CURRENT",
        }
    }
}

/// Day selection for modes that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCalendar {
    /// Weekly loans fall due on this weekday.
    pub weekly_day: Weekday,
    /// First semi-monthly payday (day of month).
    pub semi_monthly_pay1: u32,
    /// Second semi-monthly payday (day of month).
    pub semi_monthly_pay2: u32,
    /// Monthly loans keep the same calendar day; otherwise they advance 30 days.
    pub monthly_exact_day: bool,
}

impl Default for PaymentCalendar {
    fn default() -> Self {
        Self {
            weekly_day: Weekday::Mon,
            semi_monthly_pay1: 15,
            semi_monthly_pay2: 30,
            monthly_exact_day: false,
        }
    }
}

/// Days a due date may not land on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusions {
    /// Skip Saturdays.
    pub saturday: bool,
    /// Skip Sundays.
    pub sunday: bool,
    /// Skip listed holidays.
    pub holidays: bool,
}

/// A member loan from application to full payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransaction {
    /// Identifier.
    pub id: LoanTransactionId,
    /// Organization and branch.
    pub scope: Scope,
    /// Borrower.
    pub member_profile_id: MemberProfileId,
    /// Loan account.
    pub account_id: AccountId,
    /// Voucher number stamped on release entries.
    pub voucher: String,
    /// Relation to earlier loans.
    pub loan_type: LoanType,
    /// Loan being renewed or restructured.
    pub previous_loan_id: Option<LoanTransactionId>,
    /// Applied amount.
    pub applied: Decimal,
    /// Add-on interest is capitalized into the loan.
    pub is_add_on: bool,
    /// Periodicity.
    pub mode_of_payment: ModeOfPayment,
    /// Term count, in months for most modes and days for fixed-days loans.
    pub terms: u32,
    /// Day selection.
    pub calendar: PaymentCalendar,
    /// Skip rules.
    pub exclusions: Exclusions,
    /// Voucher print time; the schedule starts here.
    pub printed_date: Option<DateTime<Utc>>,
    /// Release time.
    pub released_date: Option<DateTime<Utc>>,
    /// Releasing user.
    pub released_by: Option<UserId>,
    /// Teller batch the release was posted through.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// Schedule periods already processed.
    pub count: u32,
    /// Advisory flag set while a processor works this loan.
    pub processing: bool,
    /// Sum of entry debits after balancing.
    pub total_debit: Decimal,
    /// Sum of entry credits after balancing.
    pub total_credit: Decimal,
    /// Principal after balancing.
    pub total_principal: Decimal,
    /// Outstanding principal.
    pub balance: Decimal,
    /// Per-period amortization.
    pub amortization: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl LoanTransaction {
    /// Principal the schedule amortizes: the balanced total when present.
    #[must_use]
    pub fn principal(&self) -> Decimal {
        if self.total_credit > Decimal::ZERO {
            self.total_credit
        } else {
            self.applied
        }
    }
}

/// Kind of a loan balancing leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanEntryKind {
    /// The cash and loan-account pair.
    Static,
    /// Manual deduction.
    Deduction,
    /// Deduction generated from a computation-sheet rule.
    AutomaticDeduction,
    /// Settlement of a previous loan.
    Previous,
}

/// One leg of a loan's balancing voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTransactionEntry {
    /// Identifier.
    pub id: LoanTransactionEntryId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning loan.
    pub loan_transaction_id: LoanTransactionId,
    /// Dense position in the voucher.
    pub index: u32,
    /// Leg kind.
    pub kind: LoanEntryKind,
    /// Account; every leg must carry one before balancing succeeds.
    pub account_id: Option<AccountId>,
    /// Rule that produced an automatic deduction.
    pub automatic_loan_deduction_id: Option<AutomaticLoanDeductionId>,
    /// Display name.
    pub name: String,
    /// Deduction is add-on interest.
    pub is_add_on: bool,
    /// Voucher debit.
    pub debit: Decimal,
    /// Voucher credit.
    pub credit: Decimal,
    /// Manual override for automatic deductions; zero computes from the rule.
    pub amount: Decimal,
    /// The officer removed this automatic deduction.
    pub is_automatic_loan_deduction_deleted: bool,
}

impl LoanTransactionEntry {
    /// A blank leg for `loan`.
    #[must_use]
    pub fn new(loan: &LoanTransaction, kind: LoanEntryKind, name: impl Into<String>) -> Self {
        Self {
            id: LoanTransactionEntryId::new(),
            scope: loan.scope,
            loan_transaction_id: loan.id,
            index: 0,
            kind,
            account_id: None,
            automatic_loan_deduction_id: None,
            name: name.into(),
            is_add_on: false,
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            amount: Decimal::ZERO,
            is_automatic_loan_deduction_deleted: false,
        }
    }
}

/// Per-loan state of one related account, pinned at release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAccount {
    /// Identifier.
    pub id: LoanAccountId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning loan.
    pub loan_transaction_id: LoanTransactionId,
    /// Related account.
    pub account_id: AccountId,
    /// Rule snapshot in effect at release; never changes afterwards.
    pub account_history_id: AccountHistoryId,
    /// Running accrued amount.
    pub amount: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A computation-sheet rule that adds a deduction to loans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomaticLoanDeduction {
    /// Identifier.
    pub id: AutomaticLoanDeductionId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning computation sheet.
    pub computation_sheet_id: ComputationSheetId,
    /// Account credited by the deduction.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Rate in percent for non add-on loans.
    pub charges_percentage_1: Decimal,
    /// Rate in percent for add-on loans.
    pub charges_percentage_2: Decimal,
    /// Flat amount, or multiplier when a divisor is set.
    pub charges_amount: Decimal,
    /// Divisor applied before `charges_amount`.
    pub charges_divisor: Decimal,
    /// Lowest applied amount the rule applies to; zero for none.
    pub min_amount: Decimal,
    /// Highest applied amount the rule applies to; zero for none.
    pub max_amount: Decimal,
    /// Annual rate, divided by twelve when `number_of_months` is zero.
    pub anum: bool,
    /// Month scaling: `-1` scales by terms over twelve, positive scales by terms over months.
    pub number_of_months: i32,
    /// Deduction is add-on interest.
    pub add_on: bool,
}
