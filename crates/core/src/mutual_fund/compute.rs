//! Contribution generation and the post plan of a fund.

use std::collections::HashMap;

use coopbank_shared::types::{AccountId, MemberTypeId, MutualFundEntryId, round_money};
use rust_decimal::Decimal;

use super::error::MutualFundError;
use super::types::{MutualFund, MutualFundComputationType, MutualFundEntry};
use crate::ledger::EntryDirection;
use crate::lifecycle::PostLeg;
use crate::member::{MemberProfile, months_between};

/// A member with their current balance on the contribution account.
#[derive(Debug, Clone, Copy)]
pub struct Contributor<'a> {
    /// The member.
    pub member: &'a MemberProfile,
    /// Latest balance on the fund's account, zero without a ledger.
    pub balance: Decimal,
}

/// Whether `member` takes part in `fund` at all.
#[must_use]
pub fn is_eligible(fund: &MutualFund, member: &MemberProfile) -> bool {
    member.is_mutual_fund_member
        && member.id != fund.member_profile_id
        && member.scope == fund.scope
        && fund
            .member_type_id
            .is_none_or(|t| member.member_type_id == Some(t))
}

/// The contribution of one member, before the per-type member caps.
#[must_use]
pub fn contribution(fund: &MutualFund, contributor: &Contributor<'_>) -> Decimal {
    let amount = match fund.computation_type {
        MutualFundComputationType::Continuous => fund.amount,
        MutualFundComputationType::UpToZero => contributor.balance.clamp(Decimal::ZERO, fund.amount),
        MutualFundComputationType::Sufficient => {
            if contributor.balance >= fund.amount {
                fund.amount
            } else {
                Decimal::ZERO
            }
        }
        MutualFundComputationType::ByMemberClassAmount => contributor
            .member
            .member_type_id
            .and_then(|t| fund.additional_members.iter().find(|a| a.member_type_id == t))
            .map_or(Decimal::ZERO, |a| fund.amount * a.ratio / Decimal::ONE_HUNDRED),
        MutualFundComputationType::ByMembershipYear => {
            let months = months_between(contributor.member.created_at, fund.date_of_death);
            fund.tables
                .iter()
                .find(|t| (t.month_from..=t.month_to).contains(&months))
                .map_or(fund.amount, |t| t.amount)
        }
    };
    round_money(amount)
}

/// Builds the provisional entries of `fund`.
///
/// Contributors are taken oldest membership first, so per-type member caps
/// charge the longest-standing members. Ineligible members and zero
/// contributions produce no entry.
///
/// # Errors
///
/// Returns `MutualFundError` when the fund has no account or a negative
/// amount, or when class amounts are requested without any class rows.
pub fn generate_entries(
    fund: &MutualFund,
    contributors: &[Contributor<'_>],
) -> Result<Vec<MutualFundEntry>, MutualFundError> {
    let account_id = fund
        .account_id
        .ok_or(MutualFundError::MissingAccount(fund.id))?;
    if fund.amount.is_sign_negative() {
        return Err(MutualFundError::NegativeAmount(fund.amount));
    }
    if fund.computation_type == MutualFundComputationType::ByMemberClassAmount
        && fund.additional_members.is_empty()
    {
        return Err(MutualFundError::MissingTable(fund.computation_type));
    }

    let mut ordered: Vec<&Contributor<'_>> = contributors
        .iter()
        .filter(|c| is_eligible(fund, c.member))
        .collect();
    ordered.sort_by_key(|c| (c.member.created_at, c.member.id));

    let mut charged: HashMap<MemberTypeId, u32> = HashMap::new();
    let mut entries = Vec::new();
    for contributor in ordered {
        let amount = contribution(fund, contributor);
        if amount <= Decimal::ZERO {
            continue;
        }
        if fund.computation_type == MutualFundComputationType::ByMemberClassAmount
            && let Some(type_id) = contributor.member.member_type_id
        {
            let cap = fund
                .additional_members
                .iter()
                .find(|a| a.member_type_id == type_id)
                .map_or(0, |a| a.number_of_members);
            let count = charged.entry(type_id).or_insert(0);
            if cap > 0 && *count >= cap {
                continue;
            }
            *count += 1;
        }
        entries.push(MutualFundEntry {
            id: MutualFundEntryId::new(),
            scope: fund.scope,
            mutual_fund_id: fund.id,
            member_profile_id: contributor.member.id,
            account_id,
            amount,
        });
    }
    Ok(entries)
}

/// Sum of entry amounts.
#[must_use]
pub fn total_amount(entries: &[MutualFundEntry]) -> Decimal {
    entries.iter().map(|e| e.amount).sum()
}

/// Ledger legs for posting a fund: each contribution is debited from the
/// member, mirrored as a credit on `post_account_id` when set.
#[must_use]
pub fn plan_post(entries: &[MutualFundEntry], post_account_id: Option<AccountId>) -> Vec<PostLeg> {
    entries
        .iter()
        .filter(|e| !e.amount.is_zero())
        .flat_map(|entry| {
            PostLeg {
                member_profile_id: Some(entry.member_profile_id),
                account_id: entry.account_id,
                direction: EntryDirection::Debit,
                amount: entry.amount,
            }
            .with_mirror(post_account_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ReviewState;
    use crate::mutual_fund::types::{MutualFundAdditionalMember, MutualFundTable};
    use chrono::{DateTime, TimeZone, Utc};
    use coopbank_shared::types::{
        BranchId, MemberProfileId, MutualFundId, OrganizationId, Scope, UserId,
    };
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn fund(scope: Scope, kind: MutualFundComputationType) -> MutualFund {
        MutualFund {
            id: MutualFundId::new(),
            scope,
            member_profile_id: MemberProfileId::new(),
            member_type_id: None,
            name: "Damayan".to_string(),
            description: String::new(),
            date_of_death: at(2026, 3, 1),
            extension_only: false,
            amount: dec!(100),
            computation_type: kind,
            total_amount: Decimal::ZERO,
            account_id: Some(AccountId::new()),
            additional_members: Vec::new(),
            tables: Vec::new(),
            review: ReviewState::default(),
            created_by: UserId::new(),
            created_at: at(2026, 3, 2),
        }
    }

    fn member(scope: Scope, joined: DateTime<Utc>, member_type_id: Option<MemberTypeId>) -> MemberProfile {
        MemberProfile {
            id: MemberProfileId::new(),
            scope,
            full_name: "Member".to_string(),
            member_type_id,
            is_mutual_fund_member: true,
            created_at: joined,
        }
    }

    fn scope() -> Scope {
        Scope::new(OrganizationId::new(), BranchId::new())
    }

    #[rstest]
    #[case(MutualFundComputationType::Continuous, dec!(40), dec!(100))]
    #[case(MutualFundComputationType::UpToZero, dec!(40), dec!(40))]
    #[case(MutualFundComputationType::UpToZero, dec!(250), dec!(100))]
    #[case(MutualFundComputationType::UpToZero, dec!(-10), dec!(0))]
    #[case(MutualFundComputationType::Sufficient, dec!(99.99), dec!(0))]
    #[case(MutualFundComputationType::Sufficient, dec!(100), dec!(100))]
    fn test_contribution_by_balance(
        #[case] kind: MutualFundComputationType,
        #[case] balance: Decimal,
        #[case] expected: Decimal,
    ) {
        let scope = scope();
        let fund = fund(scope, kind);
        let member = member(scope, at(2020, 1, 1), None);
        let contributor = Contributor { member: &member, balance };
        assert_eq!(contribution(&fund, &contributor), expected);
    }

    #[rstest]
    #[case(at(2025, 9, 1), dec!(20))]
    #[case(at(2023, 1, 1), dec!(50))]
    #[case(at(2010, 1, 1), dec!(100))]
    fn test_contribution_by_membership_months(#[case] joined: DateTime<Utc>, #[case] expected: Decimal) {
        let scope = scope();
        let mut fund = fund(scope, MutualFundComputationType::ByMembershipYear);
        fund.tables = vec![
            MutualFundTable { month_from: 0, month_to: 11, amount: dec!(20) },
            MutualFundTable { month_from: 12, month_to: 59, amount: dec!(50) },
        ];
        let member = member(scope, joined, None);
        let contributor = Contributor { member: &member, balance: Decimal::ZERO };
        assert_eq!(contribution(&fund, &contributor), expected);
    }

    #[test]
    fn test_generate_filters_and_excludes_owner() {
        let scope = scope();
        let regular = MemberTypeId::new();
        let mut fund = fund(scope, MutualFundComputationType::Continuous);
        fund.member_type_id = Some(regular);

        let owner = MemberProfile {
            id: fund.member_profile_id,
            ..member(scope, at(2015, 1, 1), Some(regular))
        };
        let payer = member(scope, at(2016, 1, 1), Some(regular));
        let other_type = member(scope, at(2016, 1, 1), Some(MemberTypeId::new()));
        let not_enrolled = MemberProfile {
            is_mutual_fund_member: false,
            ..member(scope, at(2016, 1, 1), Some(regular))
        };
        let members = [owner, payer.clone(), other_type, not_enrolled];
        let contributors: Vec<Contributor<'_>> = members
            .iter()
            .map(|m| Contributor { member: m, balance: dec!(500) })
            .collect();

        let entries = generate_entries(&fund, &contributors).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].member_profile_id, payer.id);
        assert_eq!(entries[0].amount, dec!(100));
        assert_eq!(Some(entries[0].account_id), fund.account_id);
        assert_eq!(total_amount(&entries), dec!(100));
    }

    #[test]
    fn test_member_class_ratio_and_cap() {
        let scope = scope();
        let regular = MemberTypeId::new();
        let associate = MemberTypeId::new();
        let mut fund = fund(scope, MutualFundComputationType::ByMemberClassAmount);
        fund.additional_members = vec![
            MutualFundAdditionalMember { member_type_id: regular, number_of_members: 2, ratio: dec!(100) },
            MutualFundAdditionalMember { member_type_id: associate, number_of_members: 0, ratio: dec!(50) },
        ];
        let members = [
            member(scope, at(2012, 1, 1), Some(regular)),
            member(scope, at(2011, 1, 1), Some(regular)),
            member(scope, at(2013, 1, 1), Some(regular)),
            member(scope, at(2014, 1, 1), Some(associate)),
            member(scope, at(2014, 1, 1), None),
        ];
        let contributors: Vec<Contributor<'_>> = members
            .iter()
            .map(|m| Contributor { member: m, balance: Decimal::ZERO })
            .collect();

        let entries = generate_entries(&fund, &contributors).unwrap();
        assert_eq!(entries.len(), 3);
        // The two oldest regular members are charged.
        assert_eq!(entries[0].member_profile_id, members[1].id);
        assert_eq!(entries[1].member_profile_id, members[0].id);
        assert_eq!(entries[2].amount, dec!(50));
    }

    #[test]
    fn test_generate_requires_account_and_class_rows() {
        let scope = scope();
        let mut no_account = fund(scope, MutualFundComputationType::Continuous);
        no_account.account_id = None;
        assert!(matches!(
            generate_entries(&no_account, &[]),
            Err(MutualFundError::MissingAccount(_))
        ));

        let by_class = fund(scope, MutualFundComputationType::ByMemberClassAmount);
        assert!(matches!(
            generate_entries(&by_class, &[]),
            Err(MutualFundError::MissingTable(_))
        ));
    }

    #[test]
    fn test_plan_post_debits_members() {
        let scope = scope();
        let fund = fund(scope, MutualFundComputationType::Continuous);
        let members = [member(scope, at(2016, 1, 1), None), member(scope, at(2017, 1, 1), None)];
        let contributors: Vec<Contributor<'_>> = members
            .iter()
            .map(|m| Contributor { member: m, balance: Decimal::ZERO })
            .collect();
        let entries = generate_entries(&fund, &contributors).unwrap();

        let payable = AccountId::new();
        let legs = plan_post(&entries, Some(payable));
        assert_eq!(legs.len(), 4);
        assert_eq!(legs[0].direction, EntryDirection::Debit);
        assert_eq!(legs[1].account_id, payable);
        assert_eq!(legs[1].direction, EntryDirection::Credit);
        assert_eq!(legs[1].amount, dec!(100));
    }
}
