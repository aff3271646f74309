//! Teller batch types.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    BatchFundingId, CashCountId, CheckRemittanceId, DisbursementTransactionId,
    OnlineRemittanceId, Scope, TransactionBatchId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A teller's working session and its reconciled totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBatch {
    /// Identifier.
    pub id: TransactionBatchId,
    /// Organization and branch.
    pub scope: Scope,
    /// Teller owning the batch.
    pub employee_user_id: UserId,
    /// Closed batches are immutable.
    pub is_closed: bool,
    /// Cash deposited to the bank during the session, entered by the teller.
    pub deposit_in_bank: Decimal,

    /// Sum of batch funding lines.
    pub beginning_balance: Decimal,
    /// Cash collected through payments and deposits.
    pub total_cash_collection: Decimal,
    /// Deposits alone.
    pub total_deposit_entry: Decimal,
    /// Withdrawals, as a magnitude.
    pub withdraw_total: Decimal,
    /// Petty-cash disbursements, as a magnitude.
    pub petty_cash: Decimal,
    /// Beginning balance plus bank deposits plus collections.
    pub total_cash_handled: Decimal,
    /// Cash the teller should turn over.
    pub total_supposed_remittance: Decimal,
    /// Counted cash.
    pub cash_count_total: Decimal,
    /// Check remittances.
    pub total_check_remittance: Decimal,
    /// Online remittances.
    pub total_online_remittance: Decimal,
    /// Counted cash plus bank deposits plus funding.
    pub grand_total: Decimal,
    /// What was actually turned over.
    pub total_actual_remittance: Decimal,
    /// Actual minus supposed remittance.
    pub variance: Decimal,

    /// Session start.
    pub started_at: DateTime<Utc>,
    /// Session end.
    pub ended_at: Option<DateTime<Utc>>,
    /// Last reconciliation or update time.
    pub updated_at: DateTime<Utc>,
}

impl TransactionBatch {
    /// A fresh open batch for `teller`.
    #[must_use]
    pub fn open(scope: Scope, teller: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionBatchId::new(),
            scope,
            employee_user_id: teller,
            is_closed: false,
            deposit_in_bank: Decimal::ZERO,
            beginning_balance: Decimal::ZERO,
            total_cash_collection: Decimal::ZERO,
            total_deposit_entry: Decimal::ZERO,
            withdraw_total: Decimal::ZERO,
            petty_cash: Decimal::ZERO,
            total_cash_handled: Decimal::ZERO,
            total_supposed_remittance: Decimal::ZERO,
            cash_count_total: Decimal::ZERO,
            total_check_remittance: Decimal::ZERO,
            total_online_remittance: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            total_actual_remittance: Decimal::ZERO,
            variance: Decimal::ZERO,
            started_at: now,
            ended_at: None,
            updated_at: now,
        }
    }
}

/// Cash handed to the teller at the start of, or during, a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFunding {
    /// Identifier.
    pub id: BatchFundingId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning batch.
    pub transaction_batch_id: TransactionBatchId,
    /// Funded amount.
    pub amount: Decimal,
    /// Description.
    pub name: String,
}

/// One denomination line of a cash count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashCount {
    /// Identifier.
    pub id: CashCountId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning batch.
    pub transaction_batch_id: TransactionBatchId,
    /// Bill or coin value.
    pub amount: Decimal,
    /// Number of pieces.
    pub quantity: u32,
}

/// A check turned over with the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRemittance {
    /// Identifier.
    pub id: CheckRemittanceId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning batch.
    pub transaction_batch_id: TransactionBatchId,
    /// Check amount.
    pub amount: Decimal,
    /// Check number.
    pub reference_number: String,
}

/// An online transfer turned over with the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineRemittance {
    /// Identifier.
    pub id: OnlineRemittanceId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning batch.
    pub transaction_batch_id: TransactionBatchId,
    /// Transfer amount.
    pub amount: Decimal,
    /// Transfer reference.
    pub reference_number: String,
}

/// Petty cash paid out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementTransaction {
    /// Identifier.
    pub id: DisbursementTransactionId,
    /// Organization and branch.
    pub scope: Scope,
    /// Owning batch.
    pub transaction_batch_id: TransactionBatchId,
    /// Paid amount.
    pub amount: Decimal,
    /// Purpose.
    pub description: String,
}
