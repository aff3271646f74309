//! Members and their membership-type history.

use chrono::{DateTime, Datelike, Utc};
use coopbank_shared::types::{MemberProfileId, MemberTypeHistoryId, MemberTypeId, Scope};
use serde::{Deserialize, Serialize};

/// A cooperative member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// Identifier.
    pub id: MemberProfileId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Full name.
    pub full_name: String,
    /// Current member type.
    pub member_type_id: Option<MemberTypeId>,
    /// Enrolled in mutual-fund contributions.
    pub is_mutual_fund_member: bool,
    /// Membership start.
    pub created_at: DateTime<Utc>,
}

/// A member-type assignment. The newest record is the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTypeHistory {
    /// Identifier.
    pub id: MemberTypeHistoryId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// The member.
    pub member_profile_id: MemberProfileId,
    /// The type assigned.
    pub member_type_id: MemberTypeId,
    /// When the assignment was made.
    pub created_at: DateTime<Utc>,
}

/// The newest assignment of `member_type_id` for a member.
#[must_use]
pub fn active_type_history<'a>(
    histories: &'a [MemberTypeHistory],
    member_profile_id: MemberProfileId,
    member_type_id: MemberTypeId,
) -> Option<&'a MemberTypeHistory> {
    histories
        .iter()
        .filter(|h| h.member_profile_id == member_profile_id && h.member_type_id == member_type_id)
        .max_by_key(|h| (h.created_at, h.id))
}

/// Whole calendar months from `from` to `to`, zero when `to` is earlier.
#[must_use]
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    if to <= from {
        return 0;
    }
    let mut months = i64::from(to.year() - from.year()) * 12
        + i64::from(to.month()) - i64::from(from.month());
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0)
}
