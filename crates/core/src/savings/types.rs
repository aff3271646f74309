//! Savings interest types.

use chrono::{DateTime, NaiveDate, Utc};
use coopbank_shared::types::{
    AccountId, BrowseReferenceId, GeneratedSavingsInterestEntryId, GeneratedSavingsInterestId,
    MemberProfileId, MemberTypeId, Scope, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lifecycle::ReviewState;

/// Which tier table picks the rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestType {
    /// By the year the member took the type.
    Year,
    /// By the date the member took the type.
    Date,
    /// By the ending balance.
    Amount,
}

/// Rate for members whose type began within a year range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearTier {
    /// First year, inclusive.
    pub from_year: i32,
    /// Last year, inclusive.
    pub to_year: i32,
    /// Rate in percent per year.
    pub interest_rate: Decimal,
}

/// Rate for members whose type began within a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTier {
    /// First day, inclusive.
    pub from_date: NaiveDate,
    /// Last day, inclusive.
    pub to_date: NaiveDate,
    /// Rate in percent per year.
    pub interest_rate: Decimal,
}

/// Rate for balances within a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountTier {
    /// Lowest balance, inclusive.
    pub from_amount: Decimal,
    /// Highest balance, inclusive.
    pub to_amount: Decimal,
    /// Rate in percent per year.
    pub interest_rate: Decimal,
}

/// Interest rate scheme of one account, optionally per member type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseReference {
    /// Identifier.
    pub id: BrowseReferenceId,
    /// Organization and branch.
    pub scope: Scope,
    /// Display name.
    pub name: String,
    /// Savings account the scheme applies to.
    pub account_id: AccountId,
    /// Member type the scheme applies to; `None` for all members.
    pub member_type_id: Option<MemberTypeId>,
    /// Flat rate, used when no tier matches.
    pub interest_rate: Decimal,
    /// Balances below this earn no interest.
    pub minimum_balance: Decimal,
    /// Charge for balances below the minimum; zero skips them.
    pub charges: Decimal,
    /// Tier table in use.
    pub interest_type: InterestType,
    /// Year tiers.
    pub year_tiers: Vec<YearTier>,
    /// Date tiers.
    pub date_tiers: Vec<DateTier>,
    /// Balance tiers.
    pub amount_tiers: Vec<AmountTier>,
}

/// How the interest base is taken from daily balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsComputationType {
    /// Lowest daily balance over the window.
    DailyLowestBalance,
    /// Average daily balance.
    AverageDailyBalance,
    /// Lowest of the month-end balances.
    MonthlyEndLowestBalance,
    /// Average daily balance combined with the end balance.
    AdbEndBalance,
    /// Average of monthly lowest balances.
    MonthlyLowestBalanceAverage,
    /// Average of month-end balances.
    MonthlyEndBalanceAverage,
    /// Each month's end balance earns for that month's days.
    MonthlyEndBalanceTotal,
}

/// One savings-interest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSavingsInterest {
    /// Identifier.
    pub id: GeneratedSavingsInterestId,
    /// Organization and branch.
    pub scope: Scope,
    /// Document number.
    pub document_no: String,
    /// Window start.
    pub last_computation_date: DateTime<Utc>,
    /// Window end.
    pub new_computation_date: DateTime<Utc>,
    /// Restrict to one account.
    pub account_id: Option<AccountId>,
    /// Restrict to one member type.
    pub member_type_id: Option<MemberTypeId>,
    /// Interest base.
    pub computation_type: SavingsComputationType,
    /// Withholding tax in percent of interest.
    pub interest_tax_rate: Decimal,
    /// Sum of entry interest.
    pub total_interest: Decimal,
    /// Sum of entry tax.
    pub total_tax: Decimal,
    /// Print and post stamps.
    pub review: ReviewState,
    /// Creating user.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Provisional interest for one member ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSavingsInterestEntry {
    /// Identifier.
    pub id: GeneratedSavingsInterestEntryId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning run.
    pub generated_savings_interest_id: GeneratedSavingsInterestId,
    /// Member.
    pub member_profile_id: MemberProfileId,
    /// Savings account.
    pub account_id: AccountId,
    /// Interest, negative when a below-minimum charge applies.
    pub interest_amount: Decimal,
    /// Withholding tax.
    pub interest_tax: Decimal,
    /// Projected balance after posting.
    pub ending_balance: Decimal,
}

impl GeneratedSavingsInterestEntry {
    /// Amount posted to the member ledger.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.interest_amount - self.interest_tax
    }
}
