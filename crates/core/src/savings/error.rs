//! Savings interest error types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::SavingsComputationType;
use crate::lifecycle::LifecycleError;

/// Errors that can occur while generating or posting savings interest.
#[derive(Debug, Error)]
pub enum SavingsError {
    /// The computation type has no implemented formula.
    #[error("Savings computation {0:?} is not supported")]
    UnsupportedComputation(SavingsComputationType),

    /// The computation window is empty or reversed.
    #[error("Computation window {from} to {to} is empty")]
    InvalidWindow {
        /// Last computation date.
        from: DateTime<Utc>,
        /// New computation date.
        to: DateTime<Utc>,
    },

    /// The branch annual divisor must be positive.
    #[error("Annual divisor must be positive, got {0}")]
    InvalidDivisor(Decimal),

    /// Tax rate outside 0..=100.
    #[error("Interest tax rate {0} is out of range")]
    InvalidTaxRate(Decimal),

    /// Print or post transition refused.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl SavingsError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedComputation(_) => "UNSUPPORTED_SAVINGS_COMPUTATION",
            Self::InvalidWindow { .. } => "INVALID_COMPUTATION_WINDOW",
            Self::InvalidDivisor(_) => "INVALID_ANNUAL_DIVISOR",
            Self::InvalidTaxRate(_) => "INVALID_TAX_RATE",
            Self::Lifecycle(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::UnsupportedComputation(_) | Self::InvalidWindow { .. } | Self::InvalidTaxRate(_) => {
                400
            }
            Self::InvalidDivisor(_) => 500,
            Self::Lifecycle(e) => e.http_status_code(),
        }
    }
}
