//! Account domain types.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    AccountId, ComputationSheetId, Currency, PaymentTypeId, Scope,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan::ModeOfPayment;

/// What an account tracks.
///
/// Every match on this enum is exhaustive; adding a variant forces each
/// generator and posting rule to decide how it handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Member savings and share capital.
    Deposit,
    /// Loan receivable per member.
    Loan,
    /// Accounts receivable ledger.
    Receivable,
    /// Accounts payable ledger.
    Payable,
    /// Penalty accrual on late loan periods.
    Fines,
    /// Interest accrual on loans.
    Interest,
    /// Service fee accrual charged per loan period.
    SvfLedger,
    /// Written-off balances.
    WriteOff,
    /// Coop-level accounts such as cash on hand.
    Other,
}

impl AccountType {
    /// Position of this account in a schedule row. Lower renders first.
    #[must_use]
    pub const fn schedule_precedence(self) -> u8 {
        match self {
            Self::Loan => 1,
            Self::Interest => 2,
            Self::SvfLedger => 3,
            Self::Fines => 4,
            Self::Deposit
            | Self::Receivable
            | Self::Payable
            | Self::WriteOff
            | Self::Other => 5,
        }
    }

    /// True for accounts the loan processor accrues into.
    #[must_use]
    pub const fn accrues_per_period(self) -> bool {
        match self {
            Self::Fines | Self::Interest | Self::SvfLedger => true,
            Self::Deposit
            | Self::Loan
            | Self::Receivable
            | Self::Payable
            | Self::WriteOff
            | Self::Other => false,
        }
    }

    /// True when ledger entries are kept per member rather than per coop.
    #[must_use]
    pub const fn is_member_scoped(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// How periodic interest is based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationType {
    /// On the original principal.
    Straight,
    /// On the remaining balance.
    Diminishing,
    /// On the remaining balance, recomputed with straight amortization.
    DiminishingStraight,
}

/// Per-mode grace allowance for fines, in percent of the computed fine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesGracePeriod {
    /// Daily loans.
    pub daily: Decimal,
    /// Weekly loans.
    pub weekly: Decimal,
    /// Semi-monthly loans.
    pub semi_monthly: Decimal,
    /// Monthly loans.
    pub monthly: Decimal,
    /// Quarterly loans.
    pub quarterly: Decimal,
    /// Semi-annual loans.
    pub semi_annual: Decimal,
    /// Lumpsum loans.
    pub lumpsum: Decimal,
    /// Fixed-days loans.
    pub fixed_days: Decimal,
}

impl FinesGracePeriod {
    /// Grace percentage for a mode of payment.
    #[must_use]
    pub const fn for_mode(&self, mode: ModeOfPayment) -> Decimal {
        match mode {
            ModeOfPayment::Daily => self.daily,
            ModeOfPayment::Weekly => self.weekly,
            ModeOfPayment::SemiMonthly => self.semi_monthly,
            ModeOfPayment::Monthly => self.monthly,
            ModeOfPayment::Quarterly => self.quarterly,
            ModeOfPayment::SemiAnnual => self.semi_annual,
            ModeOfPayment::Lumpsum => self.lumpsum,
            ModeOfPayment::FixedDays => self.fixed_days,
        }
    }
}

/// The rule set of an account. Snapshotted into [`AccountHistory`](super::AccountHistory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRules {
    /// Account type.
    pub account_type: AccountType,
    /// Interest base.
    pub computation_type: ComputationType,
    /// Interest rate in percent per month.
    pub interest_standard: Decimal,
    /// Fines rate in percent applied per late amortization.
    pub fines_amortization: Decimal,
    /// Fines rate in percent applied past maturity.
    pub fines_maturity: Decimal,
    /// Per-mode grace allowance.
    pub fines_grace: FinesGracePeriod,
    /// When set, skipped days never produce fines.
    pub fines_waived: bool,
    /// Lowest allowed balance. Zero together with `max_amount` means unlimited.
    pub min_amount: Decimal,
    /// Highest allowed balance.
    pub max_amount: Decimal,
    /// Cash or cash equivalent (used as the disbursing leg of loans).
    pub cash_and_cash_equivalence: bool,
    /// Whether interest earned is subject to withholding tax.
    pub taxable: bool,
    /// The loan account this account accrues for, if any.
    pub loan_account_id: Option<AccountId>,
    /// Computation sheet holding automatic deductions.
    pub computation_sheet_id: Option<ComputationSheetId>,
    /// Payment type stamped on system-generated entries.
    pub default_payment_type_id: Option<PaymentTypeId>,
}

impl AccountRules {
    /// Rules with every rate zero and no limits.
    #[must_use]
    pub fn new(account_type: AccountType) -> Self {
        Self {
            account_type,
            computation_type: ComputationType::Straight,
            interest_standard: Decimal::ZERO,
            fines_amortization: Decimal::ZERO,
            fines_maturity: Decimal::ZERO,
            fines_grace: FinesGracePeriod::default(),
            fines_waived: false,
            min_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
            cash_and_cash_equivalence: false,
            taxable: true,
            loan_account_id: None,
            computation_sheet_id: None,
            default_payment_type_id: None,
        }
    }

    /// Balance limits, `None` when both bounds are zero.
    #[must_use]
    pub fn limits(&self) -> Option<(Decimal, Decimal)> {
        if self.min_amount.is_zero() && self.max_amount.is_zero() {
            None
        } else {
            Some((self.min_amount, self.max_amount))
        }
    }
}

/// A chart-of-accounts entry owned by an organization branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identifier.
    pub id: AccountId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Display name.
    pub name: String,
    /// Currency the account books in.
    pub currency: Currency,
    /// Current rules. Loans and postings read snapshots, not this field.
    pub rules: AccountRules,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}
