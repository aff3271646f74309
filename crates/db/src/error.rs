//! Storage error types.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using `StoreError`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store or one of its units of work.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record of this kind with this id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Record id.
        id: Uuid,
    },

    /// A row or ledger anchor stayed locked past the lock timeout.
    #[error("Timed out waiting for lock on {0}")]
    LockTimeout(String),

    /// A record with this id already exists.
    #[error("{kind} {id} already exists")]
    Conflict {
        /// Record kind.
        kind: &'static str,
        /// Record id.
        id: Uuid,
    },

    /// A stored payload could not be encoded or decoded.
    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Backend(#[from] DbErr),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Conflict { .. } => "CONFLICT",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::Backend(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if retrying the whole unit of work may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}
