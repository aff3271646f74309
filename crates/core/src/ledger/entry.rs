//! Ledger entry types.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    AccountId, GeneralLedgerId, LoanTransactionId, MemberProfileId, PaymentTypeId, Scope,
    TransactionBatchId, TransactionId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::AccountType;

/// Entry type: either Debit or Credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

impl EntryDirection {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }
}

/// Where a ledger entry originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    /// Teller withdrawal.
    Withdraw,
    /// Teller deposit.
    Deposit,
    /// Journal entry.
    Journal,
    /// Teller payment.
    Payment,
    /// Adjustment entry.
    Adjustment,
    /// Journal voucher.
    JournalVoucher,
    /// Check voucher.
    CheckVoucher,
    /// Loan release and loan accruals.
    Loan,
    /// Posted savings interest.
    SavingsInterest,
    /// Posted mutual-fund contribution.
    MutualContribution,
    /// Petty-cash disbursement.
    Disbursement,
    /// Blotter entry.
    Blotter,
}

/// The balance-chain a ledger entry belongs to.
///
/// Coop-level (`Other`) accounts keep one chain per branch; every other
/// account keeps one chain per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    /// Organization and branch.
    pub scope: Scope,
    /// Account.
    pub account_id: AccountId,
    /// Member, absent for coop-level chains.
    pub member_profile_id: Option<MemberProfileId>,
}

impl LedgerKey {
    /// Builds the key, dropping the member for coop-level accounts.
    #[must_use]
    pub fn new(
        scope: Scope,
        account_id: AccountId,
        account_type: AccountType,
        member_profile_id: Option<MemberProfileId>,
    ) -> Self {
        Self {
            scope,
            account_id,
            member_profile_id: if account_type.is_member_scoped() {
                member_profile_id
            } else {
                None
            },
        }
    }

    /// Stable string form used as the lock and partition key.
    #[must_use]
    pub fn anchor(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:",
            self.scope.organization_id, self.scope.branch_id, self.account_id
        )?;
        match self.member_profile_id {
            Some(member) => write!(f, "{member}"),
            None => write!(f, "-"),
        }
    }
}

/// An immutable, posted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralLedgerEntry {
    /// Identifier.
    pub id: GeneralLedgerId,
    /// Organization and branch.
    pub scope: Scope,
    /// Account posted to.
    pub account_id: AccountId,
    /// Member, absent on coop-level chains.
    pub member_profile_id: Option<MemberProfileId>,
    /// Account type at posting time.
    pub account_type: AccountType,
    /// Origin of the entry.
    pub source: LedgerSource,
    /// Debit amount, zero for credits.
    pub debit: Decimal,
    /// Credit amount, zero for debits.
    pub credit: Decimal,
    /// Chain balance before this entry.
    pub previous_balance: Decimal,
    /// Chain balance after this entry.
    pub balance: Decimal,
    /// Position in the chain, starting at 1.
    pub seq: u64,
    /// Business date of the entry.
    pub entry_date: DateTime<Utc>,
    /// Teller batch, if posted through one.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// Teller transaction header, if any.
    pub transaction_id: Option<TransactionId>,
    /// Loan the entry belongs to, if any.
    pub loan_transaction_id: Option<LoanTransactionId>,
    /// Payment type used.
    pub payment_type_id: Option<PaymentTypeId>,
    /// Voucher or receipt number.
    pub reference_number: String,
    /// Free text.
    pub description: String,
    /// Posting user.
    pub created_by: UserId,
    /// Posting time.
    pub created_at: DateTime<Utc>,
}

impl GeneralLedgerEntry {
    /// The chain this entry belongs to.
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            scope: self.scope,
            account_id: self.account_id,
            member_profile_id: self.member_profile_id,
        }
    }

    /// Debit or credit, whichever is set.
    #[must_use]
    pub fn direction(&self) -> EntryDirection {
        if self.debit.is_zero() {
            EntryDirection::Credit
        } else {
            EntryDirection::Debit
        }
    }

    /// The entry's magnitude.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.debit + self.credit
    }
}
