//! Immutable, time-keyed snapshots of account rules.
//!
//! Rule changes never touch existing snapshots. A new snapshot is appended
//! with its own `valid_from`, and every consumer asks for the snapshot that
//! was in effect at a given instant.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{AccountHistoryId, AccountId, Currency, Scope};
use serde::{Deserialize, Serialize};

use super::types::{Account, AccountRules};

/// One snapshot of an account's rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHistory {
    /// Identifier.
    pub id: AccountHistoryId,
    /// The account this snapshot belongs to.
    pub account_id: AccountId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// Account name at snapshot time.
    pub name: String,
    /// Account currency at snapshot time.
    pub currency: Currency,
    /// Frozen rules.
    pub rules: AccountRules,
    /// First instant this snapshot is in effect.
    pub valid_from: DateTime<Utc>,
}

impl AccountHistory {
    /// Captures the current state of an account.
    #[must_use]
    pub fn capture(account: &Account, valid_from: DateTime<Utc>) -> Self {
        Self {
            id: AccountHistoryId::new(),
            account_id: account.id,
            scope: account.scope,
            name: account.name.clone(),
            currency: account.currency.clone(),
            rules: account.rules.clone(),
            valid_from,
        }
    }

    /// The resolved view used by computations.
    #[must_use]
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account_id,
            scope: self.scope,
            history_id: Some(self.id),
            name: self.name.clone(),
            currency: self.currency.clone(),
            rules: self.rules.clone(),
        }
    }
}

/// Account rules as seen by a computation at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// The account.
    pub account_id: AccountId,
    /// Owning organization and branch.
    pub scope: Scope,
    /// The snapshot the rules came from, `None` for live rules.
    pub history_id: Option<AccountHistoryId>,
    /// Account name.
    pub name: String,
    /// Account currency.
    pub currency: Currency,
    /// Rules in effect.
    pub rules: AccountRules,
}

impl AccountSnapshot {
    /// True when the account is owned by another organization or branch.
    #[must_use]
    pub fn scope_mismatch(&self, scope: Scope) -> bool {
        self.scope != scope
    }
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            scope: account.scope,
            history_id: None,
            name: account.name.clone(),
            currency: account.currency.clone(),
            rules: account.rules.clone(),
        }
    }
}

/// The latest snapshot at or before `at`.
///
/// Snapshots sharing a `valid_from` are ordered by id, so the answer is
/// unique for any series.
#[must_use]
pub fn latest_at(histories: &[AccountHistory], at: DateTime<Utc>) -> Option<&AccountHistory> {
    histories
        .iter()
        .filter(|h| h.valid_from <= at)
        .max_by_key(|h| (h.valid_from, h.id))
}
