//! Property-based tests for batch reconciliation.
//!
//! - The variance identity always holds
//! - Recomputing from unchanged sums is idempotent

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::reconcile::{BatchSums, BatchTotals};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn sums() -> impl Strategy<Value = BatchSums> {
    (
        (amount(), amount(), amount(), amount()),
        (amount(), amount(), amount(), amount(), amount()),
    )
        .prop_map(
            |(
                (beginning_balance, deposit_in_bank, cash_collection, deposit_entry),
                (withdraw_total, petty_cash, cash_count, check_remittance, online_remittance),
            )| BatchSums {
                beginning_balance,
                deposit_in_bank,
                cash_collection,
                deposit_entry,
                withdraw_total,
                petty_cash,
                cash_count,
                check_remittance,
                online_remittance,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_variance_identity(sums in sums()) {
        let totals = BatchTotals::compute(sums);
        prop_assert_eq!(
            totals.variance,
            totals.total_actual_remittance - totals.total_supposed_remittance
        );
        prop_assert_eq!(
            totals.total_cash_handled,
            sums.beginning_balance + sums.deposit_in_bank + sums.cash_collection
        );
        prop_assert!(totals.less <= Decimal::ZERO);
    }

    #[test]
    fn prop_reconcile_idempotent(sums in sums()) {
        let first = BatchTotals::compute(sums);
        let second = BatchTotals::compute(first.sums);
        prop_assert_eq!(first, second);
    }
}
