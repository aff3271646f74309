//! Batch error types.

use coopbank_shared::types::{TransactionBatchId, UserId};
use thiserror::Error;

/// Errors that can occur while reconciling or closing a teller batch.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Closed batches are immutable.
    #[error("Transaction batch {0} is closed")]
    BatchClosed(TransactionBatchId),

    /// A line handed to reconciliation belongs to another batch.
    #[error("Line belongs to batch {found}, expected {expected}")]
    ForeignLine {
        /// Batch being reconciled.
        expected: TransactionBatchId,
        /// Batch the line belongs to.
        found: TransactionBatchId,
    },

    /// Only the owning teller may close a batch.
    #[error("Batch {batch} is owned by another teller than {user}")]
    NotBatchOwner {
        /// The batch.
        batch: TransactionBatchId,
        /// The acting user.
        user: UserId,
    },
}

impl ReconciliationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BatchClosed(_) => "BATCH_CLOSED",
            Self::ForeignLine { .. } => "FOREIGN_BATCH_LINE",
            Self::NotBatchOwner { .. } => "NOT_BATCH_OWNER",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::BatchClosed(_) => 422,
            Self::ForeignLine { .. } => 400,
            Self::NotBatchOwner { .. } => 403,
        }
    }
}
