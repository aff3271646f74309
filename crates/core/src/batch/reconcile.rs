//! Teller batch reconciliation.
//!
//! Every derived total is recomputed from the batch's constituent rows, so
//! running it twice over unchanged rows gives identical results. Variance
//! is a stored figure for review, never an error.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{TransactionBatchId, UserId};
use rust_decimal::Decimal;

use super::error::ReconciliationError;
use super::types::{
    BatchFunding, CashCount, CheckRemittance, DisbursementTransaction, OnlineRemittance,
    TransactionBatch,
};
use crate::ledger::{GeneralLedgerEntry, LedgerSource};

/// Rows a batch is reconciled from.
#[derive(Debug, Clone, Copy)]
pub struct BatchLines<'a> {
    /// Ledger entries posted through the batch.
    pub ledger: &'a [GeneralLedgerEntry],
    /// Funding lines.
    pub fundings: &'a [BatchFunding],
    /// Cash count lines.
    pub cash_counts: &'a [CashCount],
    /// Check remittance lines.
    pub checks: &'a [CheckRemittance],
    /// Online remittance lines.
    pub online: &'a [OnlineRemittance],
    /// Petty-cash lines.
    pub disbursements: &'a [DisbursementTransaction],
}

/// Aggregated inputs of the reconciliation formulas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSums {
    /// Sum of funding lines.
    pub beginning_balance: Decimal,
    /// Teller-entered bank deposits.
    pub deposit_in_bank: Decimal,
    /// Payments and deposits received.
    pub cash_collection: Decimal,
    /// Deposits alone.
    pub deposit_entry: Decimal,
    /// Withdrawals paid out.
    pub withdraw_total: Decimal,
    /// Petty cash paid out.
    pub petty_cash: Decimal,
    /// Counted cash.
    pub cash_count: Decimal,
    /// Checks turned over.
    pub check_remittance: Decimal,
    /// Online transfers turned over.
    pub online_remittance: Decimal,
}

/// Every derived batch figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTotals {
    /// The inputs the totals were derived from.
    pub sums: BatchSums,
    /// Beginning balance plus bank deposits plus collections.
    pub total_cash_handled: Decimal,
    /// Negated outflows.
    pub less: Decimal,
    /// Cash handled minus `less`.
    pub total_supposed_remittance: Decimal,
    /// Counted cash plus bank deposits plus funding.
    pub grand_total: Decimal,
    /// Checks plus online plus counted cash plus bank deposits.
    pub total_actual_remittance: Decimal,
    /// Actual minus supposed remittance.
    pub variance: Decimal,
}

impl BatchTotals {
    /// Applies the reconciliation formulas.
    #[must_use]
    pub fn compute(sums: BatchSums) -> Self {
        let total_cash_handled = sums.beginning_balance + sums.deposit_in_bank + sums.cash_collection;
        let less = -(sums.withdraw_total + sums.petty_cash);
        let total_supposed_remittance = total_cash_handled - less;
        let grand_total = sums.cash_count + sums.deposit_in_bank + sums.beginning_balance;
        let total_actual_remittance = sums.check_remittance
            + sums.online_remittance
            + sums.cash_count
            + sums.deposit_in_bank;
        Self {
            sums,
            total_cash_handled,
            less,
            total_supposed_remittance,
            grand_total,
            total_actual_remittance,
            variance: total_actual_remittance - total_supposed_remittance,
        }
    }

    /// Stores the totals on `batch`.
    pub fn apply(&self, batch: &mut TransactionBatch, now: DateTime<Utc>) {
        batch.beginning_balance = self.sums.beginning_balance;
        batch.total_cash_collection = self.sums.cash_collection;
        batch.total_deposit_entry = self.sums.deposit_entry;
        batch.withdraw_total = self.sums.withdraw_total;
        batch.petty_cash = self.sums.petty_cash;
        batch.cash_count_total = self.sums.cash_count;
        batch.total_check_remittance = self.sums.check_remittance;
        batch.total_online_remittance = self.sums.online_remittance;
        batch.total_cash_handled = self.total_cash_handled;
        batch.total_supposed_remittance = self.total_supposed_remittance;
        batch.grand_total = self.grand_total;
        batch.total_actual_remittance = self.total_actual_remittance;
        batch.variance = self.variance;
        batch.updated_at = now;
    }
}

fn check_batch(
    expected: TransactionBatchId,
    found: TransactionBatchId,
) -> Result<(), ReconciliationError> {
    if expected == found {
        Ok(())
    } else {
        Err(ReconciliationError::ForeignLine { expected, found })
    }
}

/// Sums the rows of `batch`.
///
/// # Errors
///
/// Returns `ReconciliationError::ForeignLine` when a row belongs to
/// another batch.
pub fn summarize(
    batch: &TransactionBatch,
    lines: BatchLines<'_>,
) -> Result<BatchSums, ReconciliationError> {
    let mut sums = BatchSums {
        deposit_in_bank: batch.deposit_in_bank,
        ..BatchSums::default()
    };

    for entry in lines.ledger {
        if let Some(found) = entry.transaction_batch_id {
            check_batch(batch.id, found)?;
        }
        match entry.source {
            LedgerSource::Payment => sums.cash_collection += entry.amount(),
            LedgerSource::Deposit => {
                sums.cash_collection += entry.amount();
                sums.deposit_entry += entry.amount();
            }
            LedgerSource::Withdraw => sums.withdraw_total += entry.amount(),
            LedgerSource::Journal
            | LedgerSource::Adjustment
            | LedgerSource::JournalVoucher
            | LedgerSource::CheckVoucher
            | LedgerSource::Loan
            | LedgerSource::SavingsInterest
            | LedgerSource::MutualContribution
            | LedgerSource::Disbursement
            | LedgerSource::Blotter => {}
        }
    }
    for line in lines.fundings {
        check_batch(batch.id, line.transaction_batch_id)?;
        sums.beginning_balance += line.amount;
    }
    for line in lines.cash_counts {
        check_batch(batch.id, line.transaction_batch_id)?;
        sums.cash_count += line.amount * Decimal::from(line.quantity);
    }
    for line in lines.checks {
        check_batch(batch.id, line.transaction_batch_id)?;
        sums.check_remittance += line.amount;
    }
    for line in lines.online {
        check_batch(batch.id, line.transaction_batch_id)?;
        sums.online_remittance += line.amount;
    }
    for line in lines.disbursements {
        check_batch(batch.id, line.transaction_batch_id)?;
        sums.petty_cash += line.amount;
    }
    Ok(sums)
}

/// Recomputes every derived figure of `batch` from its rows.
///
/// # Errors
///
/// Returns a `ReconciliationError` when the batch is closed or a row
/// belongs to another batch.
pub fn reconcile(
    batch: &TransactionBatch,
    lines: BatchLines<'_>,
) -> Result<BatchTotals, ReconciliationError> {
    if batch.is_closed {
        return Err(ReconciliationError::BatchClosed(batch.id));
    }
    Ok(BatchTotals::compute(summarize(batch, lines)?))
}

/// Ends a teller session.
///
/// # Errors
///
/// Returns a `ReconciliationError` when the batch is already closed or the
/// actor is not its teller.
pub fn close_batch(
    batch: &mut TransactionBatch,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<(), ReconciliationError> {
    if batch.is_closed {
        return Err(ReconciliationError::BatchClosed(batch.id));
    }
    if batch.employee_user_id != user {
        return Err(ReconciliationError::NotBatchOwner {
            batch: batch.id,
            user,
        });
    }
    batch.is_closed = true;
    batch.ended_at = Some(now);
    batch.updated_at = now;
    Ok(())
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
