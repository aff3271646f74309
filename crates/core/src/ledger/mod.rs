//! Append-only ledger logic.
//!
//! This module implements the pure side of the ledger:
//! - Entries, sources and balance-chain keys
//! - The sign convention shared by every account type
//! - Preparing the next entry of a chain against its locked latest entry
//! - Chain replay and daily ending balances

pub mod balance;
pub mod entry;
pub mod error;
pub mod posting;

#[cfg(test)]
mod balance_props;

pub use balance::{
    check_limits, daily_ending_balances, next_balance, replay, signed_change, DailyBalance,
};
pub use entry::{EntryDirection, GeneralLedgerEntry, LedgerKey, LedgerSource};
pub use error::PostingError;
pub use posting::{prepare_entry, PostingRequest};
