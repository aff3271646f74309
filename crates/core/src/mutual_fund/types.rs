//! Mutual fund types.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    AccountId, MemberProfileId, MemberTypeId, MutualFundEntryId, MutualFundId, Scope, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lifecycle::ReviewState;

/// How each member's contribution is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutualFundComputationType {
    /// Every eligible member pays the fund amount.
    Continuous,
    /// Pay what the balance allows, up to the fund amount.
    UpToZero,
    /// Pay the fund amount only when the balance covers it.
    Sufficient,
    /// Per member type share of the fund amount.
    ByMemberClassAmount,
    /// Amount by months of membership.
    ByMembershipYear,
}

/// Contribution share for one member type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFundAdditionalMember {
    /// Member type.
    pub member_type_id: MemberTypeId,
    /// Members of the type charged, zero for all.
    pub number_of_members: u32,
    /// Percent of the fund amount.
    pub ratio: Decimal,
}

/// Amount for a membership-length bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFundTable {
    /// First month, inclusive.
    pub month_from: i64,
    /// Last month, inclusive.
    pub month_to: i64,
    /// Contribution.
    pub amount: Decimal,
}

/// A death-benefit fund raised from member contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFund {
    /// Identifier.
    pub id: MutualFundId,
    /// Organization and branch.
    pub scope: Scope,
    /// The member the fund is raised for. Never charged.
    pub member_profile_id: MemberProfileId,
    /// Restrict contributors to one member type.
    pub member_type_id: Option<MemberTypeId>,
    /// Display name.
    pub name: String,
    /// Free text.
    pub description: String,
    /// Date of death of the beneficiary member.
    pub date_of_death: DateTime<Utc>,
    /// Extension-only fund.
    pub extension_only: bool,
    /// Benefit amount per contributor.
    pub amount: Decimal,
    /// Contribution rule.
    pub computation_type: MutualFundComputationType,
    /// Sum of entry amounts.
    pub total_amount: Decimal,
    /// Account contributions are taken from.
    pub account_id: Option<AccountId>,
    /// Per member type shares.
    pub additional_members: Vec<MutualFundAdditionalMember>,
    /// Membership-length brackets.
    pub tables: Vec<MutualFundTable>,
    /// Print and post stamps.
    pub review: ReviewState,
    /// Creating user.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One member's contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualFundEntry {
    /// Identifier.
    pub id: MutualFundEntryId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning fund.
    pub mutual_fund_id: MutualFundId,
    /// Contributor.
    pub member_profile_id: MemberProfileId,
    /// Account charged.
    pub account_id: AccountId,
    /// Contribution.
    pub amount: Decimal,
}
