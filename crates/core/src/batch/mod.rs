//! Teller batches and their reconciliation.

pub mod error;
pub mod reconcile;
pub mod types;

#[cfg(test)]
mod reconcile_props;

pub use error::ReconciliationError;
pub use reconcile::{close_batch, reconcile, summarize, BatchLines, BatchSums, BatchTotals};
pub use types::{
    BatchFunding, CashCount, CheckRemittance, DisbursementTransaction, OnlineRemittance,
    TransactionBatch,
};
