//! Mutual fund error types.

use coopbank_shared::types::MutualFundId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::MutualFundComputationType;
use crate::lifecycle::LifecycleError;

/// Errors that can occur while generating or posting a mutual fund.
#[derive(Debug, Error)]
pub enum MutualFundError {
    /// Contributions need an account to draw from.
    #[error("Mutual fund {0} has no contribution account")]
    MissingAccount(MutualFundId),

    /// Benefit amounts are never negative.
    #[error("Mutual fund amount {0} is negative")]
    NegativeAmount(Decimal),

    /// The computation type needs a table that is empty.
    #[error("Mutual fund computation {0:?} has no table rows")]
    MissingTable(MutualFundComputationType),

    /// Print or post transition refused.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl MutualFundError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingAccount(_) => "MUTUAL_FUND_ACCOUNT_MISSING",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::MissingTable(_) => "MUTUAL_FUND_TABLE_MISSING",
            Self::Lifecycle(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingAccount(_) | Self::NegativeAmount(_) | Self::MissingTable(_) => 400,
            Self::Lifecycle(e) => e.http_status_code(),
        }
    }
}
