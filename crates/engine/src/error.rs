//! Engine error types.
//!
//! Every failure leaving a service is an [`EngineError`]. Core and storage
//! errors convert in with `?`; [`ResultExt::context`] records the step and
//! entity that failed. [`EngineError::kind`] classifies the innermost cause.

use std::fmt;

use coopbank_core::batch::ReconciliationError;
use coopbank_core::ledger::PostingError;
use coopbank_core::lifecycle::LifecycleError;
use coopbank_core::loan::{LoanError, ScheduleError};
use coopbank_core::mutual_fund::MutualFundError;
use coopbank_core::payment::PaymentError;
use coopbank_core::savings::SavingsError;
use coopbank_db::StoreError;
use coopbank_shared::AppError;
use thiserror::Error;

/// Result type alias using `EngineError`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before any write.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// The actor or origin may not perform the operation.
    Authorization,
    /// A business rule refused the operation.
    BusinessRule,
    /// Lost a lock race; retrying may succeed.
    Conflict,
    /// Storage or integrity failure. Never shown verbatim.
    Persistence,
}

impl ErrorKind {
    fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Validation,
            403 => Self::Authorization,
            404 => Self::NotFound,
            409 => Self::Conflict,
            422 => Self::BusinessRule,
            _ => Self::Persistence,
        }
    }
}

/// Errors that can occur in an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    // ========== Core Errors ==========
    /// Ledger posting refused.
    #[error(transparent)]
    Posting(#[from] PostingError),

    /// Schedule computation failed.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Loan balancing, release or processing refused.
    #[error(transparent)]
    Loan(#[from] LoanError),

    /// Batch reconciliation refused.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// Savings interest generation or posting refused.
    #[error(transparent)]
    Savings(#[from] SavingsError),

    /// Mutual fund generation or posting refused.
    #[error(transparent)]
    MutualFund(#[from] MutualFundError),

    /// Payment refused.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Print or post transition refused.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    // ========== Engine Errors ==========
    /// Request rejected before any work.
    #[error("{0}")]
    Validation(String),

    /// The actor may not touch the record.
    #[error("{0} does not belong to the current branch")]
    Forbidden(&'static str),

    /// The actor has no open transaction batch.
    #[error("No open transaction batch for the current teller")]
    NoOpenBatch,

    /// Too many recent failures from this origin.
    #[error("Origin {0} is temporarily blocked")]
    OriginBlocked(String),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ========== Wrapped ==========
    /// A failure with the step and entity it happened on.
    #[error("{step} failed for {entity}: {source}")]
    Context {
        /// Operation step.
        step: &'static str,
        /// Entity id or key.
        entity: String,
        /// Cause.
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// The innermost error, below any context wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classification of the root cause.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::Posting(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Schedule(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Loan(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Reconciliation(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Savings(e) => ErrorKind::from_status(e.http_status_code()),
            Self::MutualFund(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Payment(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Lifecycle(e) => ErrorKind::from_status(e.http_status_code()),
            Self::Validation(_) => ErrorKind::Validation,
            Self::Forbidden(_) | Self::OriginBlocked(_) => ErrorKind::Authorization,
            Self::NoOpenBatch => ErrorKind::BusinessRule,
            Self::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Store(StoreError::LockTimeout(_) | StoreError::Conflict { .. }) => {
                ErrorKind::Conflict
            }
            Self::Store(StoreError::Encoding(_) | StoreError::Backend(_)) | Self::Context { .. } => {
                ErrorKind::Persistence
            }
        }
    }

    /// Returns the error code of the root cause.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            Self::Posting(e) => e.error_code(),
            Self::Schedule(e) => e.error_code(),
            Self::Loan(e) => e.error_code(),
            Self::Reconciliation(e) => e.error_code(),
            Self::Savings(e) => e.error_code(),
            Self::MutualFund(e) => e.error_code(),
            Self::Payment(e) => e.error_code(),
            Self::Lifecycle(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden(_) => "SCOPE_MISMATCH",
            Self::NoOpenBatch => "NO_OPEN_BATCH",
            Self::OriginBlocked(_) => "ORIGIN_BLOCKED",
            Self::Store(e) => e.error_code(),
            Self::Context { .. } => "INTERNAL_ERROR",
        }
    }

    /// True when the same request may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.root(), Self::Store(e) if e.is_retryable())
    }
}

/// Attaches the failing step and entity to an error.
pub trait ResultExt<T> {
    /// Wraps the error with `step` and `entity`.
    fn context(self, step: &'static str, entity: impl fmt::Display) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn context(self, step: &'static str, entity: impl fmt::Display) -> EngineResult<T> {
        self.map_err(|e| EngineError::Context {
            step,
            entity: entity.to_string(),
            source: Box::new(e.into()),
        })
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.root().to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Authorization => Self::Authorization(message),
            ErrorKind::BusinessRule => Self::BusinessRule(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Persistence => Self::Database("persistence failure".to_string()),
        }
    }
}
