//! Savings interest generation.
//!
//! A run covers one window and optionally one account or member type. For
//! each member ledger in scope it resolves the account's rate scheme,
//! computes interest from daily ending balances and stores a provisional
//! entry. Posting a printed run writes the net-of-tax amounts.

pub mod compute;
pub mod error;
pub mod types;

#[cfg(test)]
mod compute_props;

pub use compute::{
    compute_interest, generate_entry, override_entry, plan_post, resolve_rate, select_reference,
    InterestResult, MemberLedger, SavingsParams, SavingsTotals,
};
pub use error::SavingsError;
pub use types::{
    AmountTier, BrowseReference, DateTier, GeneratedSavingsInterest,
    GeneratedSavingsInterestEntry, InterestType, SavingsComputationType, YearTier,
};
