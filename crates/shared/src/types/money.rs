//! Monetary rounding.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount is a `rust_decimal::Decimal`; stored values are rounded to
//! [`MONEY_SCALE`] places with [`round_money`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places persisted for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to [`MONEY_SCALE`] places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
