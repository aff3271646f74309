//! Application-wide error types.
//!
//! Every failure that leaves the engine is classified into one of these
//! variants. Validation and business-rule messages are safe to show to the
//! caller verbatim; persistence failures carry a generic message only.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The actor may not perform the operation (or its origin is blocked).
    #[error("Access denied: {0}")]
    Authorization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation (insufficient balance, overpayment, limits...).
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflicting concurrent access; the caller may retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Conflict(_) => 409,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "PERSISTENCE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
