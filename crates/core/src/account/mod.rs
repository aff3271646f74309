//! Accounts, their rule sets and the snapshot history of those rules.

pub mod history;
pub mod types;

pub use history::{latest_at, AccountHistory, AccountSnapshot};
pub use types::{Account, AccountRules, AccountType, ComputationType, FinesGracePeriod};
