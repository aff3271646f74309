//! Posting error types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while preparing a ledger posting.
#[derive(Debug, Error)]
pub enum PostingError {
    // ========== Validation Errors ==========
    /// Entry amount cannot be zero.
    #[error("Entry amount cannot be zero")]
    ZeroAmount,

    /// Entry amount cannot be negative.
    #[error("Entry amount cannot be negative")]
    NegativeAmount,

    /// Entry date is earlier than the latest entry on the same chain.
    #[error("Entry date {requested} is before the latest entry at {latest}")]
    BackdatedEntry {
        /// Entry date of the chain's latest entry.
        latest: DateTime<Utc>,
        /// Requested entry date.
        requested: DateTime<Utc>,
    },

    /// The account belongs to another organization or branch.
    #[error("Account does not belong to the requesting branch")]
    ScopeMismatch,

    // ========== Business Rule Errors ==========
    /// Resulting balance would leave the configured range.
    #[error("Resulting balance {balance} is outside the allowed range [{min}, {max}]")]
    LimitExceeded {
        /// Balance the posting would produce.
        balance: Decimal,
        /// Configured minimum.
        min: Decimal,
        /// Configured maximum, zero for none.
        max: Decimal,
    },

    // ========== Integrity Errors ==========
    /// A stored balance disagrees with a replay of the chain.
    #[error("Balance chain broken at sequence {seq}")]
    BrokenChain {
        /// Sequence number of the first bad entry.
        seq: u64,
    },
}

impl PostingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::BackdatedEntry { .. } => "BACKDATED_ENTRY",
            Self::ScopeMismatch => "SCOPE_MISMATCH",
            Self::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            Self::BrokenChain { .. } => "BROKEN_CHAIN",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NegativeAmount | Self::BackdatedEntry { .. } => 400,
            Self::ScopeMismatch => 403,
            Self::ZeroAmount | Self::LimitExceeded { .. } => 422,
            Self::BrokenChain { .. } => 500,
        }
    }
}
