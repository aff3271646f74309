//! Teller payment types.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    AccountId, MemberProfileId, OrganizationId, PaymentTypeId, Scope, TellerSettingId,
    TransactionBatchId, TransactionId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerSource;

/// What the teller is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    /// Money in.
    Deposit,
    /// Money out.
    Withdraw,
    /// Settlement of a loan or charge.
    Payment,
}

impl PaymentSource {
    /// Money coming into the cooperative.
    #[must_use]
    pub const fn is_inflow(self) -> bool {
        matches!(self, Self::Deposit | Self::Payment)
    }

    /// The source a negative amount turns into.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Deposit => Self::Withdraw,
            Self::Withdraw => Self::Deposit,
            Self::Payment => Self::Payment,
        }
    }

    /// Ledger source of the posted entry.
    #[must_use]
    pub const fn ledger_source(self) -> LedgerSource {
        match self {
            Self::Deposit => LedgerSource::Deposit,
            Self::Withdraw => LedgerSource::Withdraw,
            Self::Payment => LedgerSource::Payment,
        }
    }
}

/// A configured way of paying (cash, check, online).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentType {
    /// Identifier.
    pub id: PaymentTypeId,
    /// Owning organization; payment types are shared across branches.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
}

/// A quick deposit, withdrawal or payment at the teller window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Account to post to.
    pub account_id: AccountId,
    /// Payment type.
    pub payment_type_id: PaymentTypeId,
    /// Member, `None` for coop-level ledgers.
    pub member_profile_id: Option<MemberProfileId>,
    /// Signed amount; negative flips deposits and withdrawals.
    pub amount: Decimal,
    /// Receipt or voucher number.
    pub reference_number: String,
    /// Business date, defaults to now.
    pub entry_date: Option<DateTime<Utc>>,
    /// Transaction header to append to.
    pub transaction_id: Option<TransactionId>,
    /// Draw the reference from the teller's receipt series.
    pub or_auto_generated: bool,
    /// Requested operation.
    pub source: PaymentSource,
    /// Free text.
    pub description: String,
}

/// Header grouping the teller entries of one customer visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellerTransaction {
    /// Identifier.
    pub id: TransactionId,
    /// Organization and branch.
    pub scope: Scope,
    /// Batch the visit belongs to.
    pub transaction_batch_id: TransactionBatchId,
    /// Teller.
    pub employee_user_id: UserId,
    /// Member served, if any.
    pub member_profile_id: Option<MemberProfileId>,
    /// Deposits less withdrawals so far.
    pub amount: Decimal,
    /// Receipt number.
    pub reference_number: String,
    /// Source of the first entry; later entries inherit it.
    pub source: PaymentSource,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// A teller's official-receipt series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellerSetting {
    /// Identifier.
    pub id: TellerSettingId,
    /// Organization and branch.
    pub scope: Scope,
    /// Teller.
    pub user_id: UserId,
    /// First receipt number.
    pub start_or: u64,
    /// Last receipt number.
    pub end_or: u64,
    /// Last receipt number issued.
    pub used_or: u64,
}
