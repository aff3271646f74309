//! Property-based tests for the amortization schedule.
//!
//! - Determinism: identical inputs give identical schedules
//! - The loan column amortizes the principal exactly
//! - Scheduled dates never fall on an excluded day

use chrono::{Datelike, Weekday};
use coopbank_shared::types::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::fixtures::{rules, sample_loan, snapshot};
use super::schedule::compute_schedule;
use super::types::{Exclusions, ModeOfPayment};
use crate::account::{AccountType, ComputationType};

fn mode() -> impl Strategy<Value = ModeOfPayment> {
    prop_oneof![
        Just(ModeOfPayment::Daily),
        Just(ModeOfPayment::Weekly),
        Just(ModeOfPayment::SemiMonthly),
        Just(ModeOfPayment::Monthly),
        Just(ModeOfPayment::Quarterly),
        Just(ModeOfPayment::SemiAnnual),
        Just(ModeOfPayment::Lumpsum),
        Just(ModeOfPayment::FixedDays),
    ]
}

fn computation() -> impl Strategy<Value = ComputationType> {
    prop_oneof![
        Just(ComputationType::Straight),
        Just(ComputationType::Diminishing),
        Just(ComputationType::DiminishingStraight),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_schedule_is_deterministic_and_amortizes_principal(
        mode in mode(),
        terms in 6u32..24,
        cents in 100_000i64..10_000_000,
        rate_bp in 0i64..500,
        computation in computation(),
        saturday in any::<bool>(),
        sunday in any::<bool>(),
    ) {
        let mut loan = sample_loan(Decimal::new(cents, 2), mode, terms);
        loan.exclusions = Exclusions { saturday, sunday, holidays: false };

        let mut interest = rules(AccountType::Interest);
        interest.computation_type = computation;
        interest.interest_standard = Decimal::new(rate_bp, 2);
        let accounts = vec![
            snapshot(loan.scope, AccountId::new(), interest),
            snapshot(loan.scope, loan.account_id, rules(AccountType::Loan)),
        ];

        let first = compute_schedule(&loan, &accounts, &[]).unwrap();
        let second = compute_schedule(&loan, &accounts, &[]).unwrap();
        prop_assert_eq!(&first, &second);

        let paid: Decimal = first.iter().map(|p| p.value_of(loan.account_id)).sum();
        prop_assert_eq!(paid, loan.applied);
        prop_assert_eq!(first.last().map(|p| p.balance), Some(Decimal::ZERO));

        for pair in first.windows(2) {
            prop_assert!(pair[1].balance <= pair[0].balance);
            prop_assert!(pair[1].actual_date >= pair[0].actual_date);
        }
        for period in &first {
            let day = period.scheduled_date.weekday();
            prop_assert!(!(saturday && day == Weekday::Sat));
            prop_assert!(!(sunday && day == Weekday::Sun));
        }
    }
}
