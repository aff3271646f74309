//! Payment error types.

use coopbank_shared::types::{TransactionBatchId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::PostingError;

/// Errors that can occur while posting a teller payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    // ========== Validation Errors ==========
    /// Payment amount cannot be zero.
    #[error("Payment amount cannot be zero")]
    ZeroAmount,

    /// A referenced record belongs to another organization or branch.
    #[error("{0} does not belong to the current branch")]
    ScopeMismatch(&'static str),

    /// The transaction header belongs to another batch.
    #[error("Transaction {transaction} does not belong to batch {batch}")]
    ForeignTransaction {
        /// The header.
        transaction: TransactionId,
        /// The teller's current batch.
        batch: TransactionBatchId,
    },

    /// The teller's batch is closed.
    #[error("Transaction batch {0} is closed")]
    BatchClosed(TransactionBatchId),

    // ========== Business Rule Errors ==========
    /// Withdrawal exceeds the available balance.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        /// Current balance.
        available: Decimal,
        /// Requested withdrawal.
        required: Decimal,
    },

    /// Loan payment exceeds the outstanding balance.
    #[error("Payment {payment} exceeds loan balance {balance}")]
    Overpayment {
        /// Outstanding balance.
        balance: Decimal,
        /// Requested payment.
        payment: Decimal,
    },

    /// The teller's receipt series is used up.
    #[error("Official receipt series exhausted at {end}")]
    ReceiptsExhausted {
        /// Last receipt of the series.
        end: u64,
    },

    /// Ledger posting refused.
    #[error(transparent)]
    Posting(#[from] PostingError),
}

impl PaymentError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::ScopeMismatch(_) => "SCOPE_MISMATCH",
            Self::ForeignTransaction { .. } => "FOREIGN_TRANSACTION",
            Self::BatchClosed(_) => "BATCH_CLOSED",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::Overpayment { .. } => "LOAN_OVERPAYMENT",
            Self::ReceiptsExhausted { .. } => "RECEIPTS_EXHAUSTED",
            Self::Posting(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::ForeignTransaction { .. } => 400,
            Self::ScopeMismatch(_) => 403,
            Self::ZeroAmount
            | Self::BatchClosed(_)
            | Self::InsufficientBalance { .. }
            | Self::Overpayment { .. }
            | Self::ReceiptsExhausted { .. } => 422,
            Self::Posting(e) => e.http_status_code(),
        }
    }
}
