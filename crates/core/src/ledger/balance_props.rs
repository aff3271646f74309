//! Property-based tests for the balance chain.
//!
//! - Balance continuity: replaying a chain reproduces every stored balance
//! - Daily ending balances agree with the chain

use chrono::{Duration, TimeZone, Utc};
use coopbank_shared::types::{
    AccountId, BranchId, Currency, MemberProfileId, OrganizationId, Scope, UserId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::{daily_ending_balances, replay};
use super::entry::{EntryDirection, GeneralLedgerEntry, LedgerSource};
use super::posting::{prepare_entry, PostingRequest};
use crate::account::{AccountRules, AccountSnapshot, AccountType};

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn direction() -> impl Strategy<Value = EntryDirection> {
    prop_oneof![Just(EntryDirection::Debit), Just(EntryDirection::Credit)]
}

fn account_type() -> impl Strategy<Value = AccountType> {
    prop_oneof![
        Just(AccountType::Deposit),
        Just(AccountType::Loan),
        Just(AccountType::Fines),
        Just(AccountType::Interest),
        Just(AccountType::Other),
    ]
}

/// Posts `steps` in order, each `hours` after the previous one.
fn build_chain(
    account_type: AccountType,
    steps: &[(EntryDirection, Decimal, i64)],
) -> Vec<GeneralLedgerEntry> {
    let scope = Scope::new(OrganizationId::new(), BranchId::new());
    let snapshot = AccountSnapshot {
        account_id: AccountId::new(),
        scope,
        history_id: None,
        name: "Chain".to_string(),
        currency: Currency::new("PHP", chrono_tz::Asia::Manila),
        rules: AccountRules::new(account_type),
    };
    let member = MemberProfileId::new();
    let mut at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut chain: Vec<GeneralLedgerEntry> = Vec::new();

    for (direction, amount, hours) in steps {
        at += Duration::hours(*hours);
        let request = PostingRequest {
            scope,
            account: snapshot.clone(),
            member_profile_id: Some(member),
            direction: *direction,
            amount: *amount,
            entry_date: at,
            source: LedgerSource::Journal,
            transaction_batch_id: None,
            transaction_id: None,
            loan_transaction_id: None,
            payment_type_id: None,
            reference_number: String::new(),
            description: String::new(),
            created_by: UserId::new(),
        };
        let entry = prepare_entry(&request, chain.last(), at).unwrap();
        chain.push(entry);
    }
    chain
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Replaying any posted chain reproduces its final balance, which equals
    /// the signed sum of its entries.
    #[test]
    fn prop_replay_reproduces_balances(
        account_type in account_type(),
        steps in prop::collection::vec((direction(), positive_amount(), 0i64..48), 1..30),
    ) {
        let chain = build_chain(account_type, &steps);
        let replayed = replay(&chain).unwrap();

        let expected: Decimal = steps
            .iter()
            .map(|(d, a, _)| match d {
                EntryDirection::Credit => *a,
                EntryDirection::Debit => -*a,
            })
            .sum();
        prop_assert_eq!(replayed, expected);
        prop_assert_eq!(chain.last().map(|e| e.balance), Some(expected));
    }

    /// Tampering with any stored balance is detected.
    #[test]
    fn prop_tampered_chain_detected(
        steps in prop::collection::vec((direction(), positive_amount(), 1i64..48), 2..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut chain = build_chain(AccountType::Deposit, &steps);
        let i = pick.index(chain.len());
        chain[i].balance += Decimal::ONE;
        prop_assert!(replay(&chain).is_err());
    }

    /// The last daily ending balance equals the chain's final balance.
    #[test]
    fn prop_daily_balances_end_at_chain_balance(
        steps in prop::collection::vec((direction(), positive_amount(), 1i64..72), 1..20),
    ) {
        let chain = build_chain(AccountType::Deposit, &steps);
        let currency = Currency::new("PHP", chrono_tz::Asia::Manila);
        let first = chain.first().unwrap().entry_date;
        let last = chain.last().unwrap().entry_date;

        let days = daily_ending_balances(&chain, &currency, first, last + Duration::days(1));
        prop_assert!(!days.is_empty());
        prop_assert_eq!(days.last().map(|d| d.balance), chain.last().map(|e| e.balance));
        for pair in days.windows(2) {
            prop_assert_eq!(pair[1].date, pair[0].date.succ_opt().unwrap());
        }
    }
}
