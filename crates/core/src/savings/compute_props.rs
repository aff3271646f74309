//! Property-based tests for savings interest.
//!
//! - Non-taxable accounts never withhold tax
//! - The projected balance is last balance plus interest less tax

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::compute::{SavingsParams, compute_interest};
use super::types::SavingsComputationType;
use crate::ledger::DailyBalance;

fn daily() -> impl Strategy<Value = Vec<DailyBalance>> {
    prop::collection::vec(0i64..10_000_000i64, 1..90).prop_map(|cents| {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default();
        start
            .iter_days()
            .zip(cents)
            .map(|(date, c)| DailyBalance { date, balance: Decimal::new(c, 2) })
            .collect()
    })
}

fn kind() -> impl Strategy<Value = SavingsComputationType> {
    prop_oneof![
        Just(SavingsComputationType::DailyLowestBalance),
        Just(SavingsComputationType::AverageDailyBalance),
        Just(SavingsComputationType::MonthlyEndBalanceTotal),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_non_taxable_has_zero_tax(
        daily in daily(),
        kind in kind(),
        rate in 0u32..1500u32,
        tax in 0u32..=100u32,
    ) {
        let params = SavingsParams {
            computation_type: kind,
            interest_tax_rate: Decimal::from(tax),
            annual_divisor: Decimal::from(360),
        };
        let result = compute_interest(&daily, Decimal::new(i64::from(rate), 2), &params, false).unwrap();
        prop_assert_eq!(result.tax, Decimal::ZERO);
        prop_assert!(result.interest >= Decimal::ZERO);
    }

    #[test]
    fn prop_ending_balance_identity(
        daily in daily(),
        kind in kind(),
        rate in 0u32..1500u32,
        tax in 0u32..=100u32,
    ) {
        let params = SavingsParams {
            computation_type: kind,
            interest_tax_rate: Decimal::from(tax),
            annual_divisor: Decimal::from(365),
        };
        let result = compute_interest(&daily, Decimal::new(i64::from(rate), 2), &params, true).unwrap();
        let last = daily.last().map(|d| d.balance).unwrap_or_default();
        prop_assert_eq!(result.ending_balance, last + result.interest - result.tax);
        prop_assert!(result.tax <= result.interest);
    }
}
