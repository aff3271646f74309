//! [`Record`] implementations for every persisted domain type.

use coopbank_core::account::{Account, AccountHistory};
use coopbank_core::batch::{
    BatchFunding, CashCount, CheckRemittance, DisbursementTransaction, OnlineRemittance,
    TransactionBatch,
};
use coopbank_core::ledger::GeneralLedgerEntry;
use coopbank_core::loan::{
    AutomaticLoanDeduction, Holiday, LoanAccount, LoanTransaction, LoanTransactionEntry,
};
use coopbank_core::member::{MemberProfile, MemberTypeHistory};
use coopbank_core::mutual_fund::{MutualFund, MutualFundEntry};
use coopbank_core::payment::{PaymentType, TellerSetting, TellerTransaction};
use coopbank_core::savings::{BrowseReference, GeneratedSavingsInterest, GeneratedSavingsInterestEntry};
use coopbank_shared::types::{
    AccountHistoryId, AccountId, AutomaticLoanDeductionId, BatchFundingId, BranchId, BrowseReferenceId,
    CashCountId, CheckRemittanceId, DisbursementTransactionId, GeneralLedgerId,
    GeneratedSavingsInterestEntryId, GeneratedSavingsInterestId, HolidayId, LoanAccountId,
    LoanTransactionEntryId, LoanTransactionId, MemberProfileId, MemberTypeHistoryId, MutualFundEntryId,
    MutualFundId, OnlineRemittanceId, OrganizationId, PaymentTypeId, TellerSettingId, TransactionBatchId,
    TransactionId,
};
use uuid::Uuid;

use crate::store::Record;

/// Implements [`Record`] for a type carrying `id` and `scope` fields.
macro_rules! branch_record {
    ($ty:ty, $kind:literal, $id:ty) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;
            type Id = $id;

            fn id(&self) -> $id {
                self.id
            }

            fn organization_id(&self) -> OrganizationId {
                self.scope.organization_id
            }

            fn branch_id(&self) -> Option<BranchId> {
                Some(self.scope.branch_id)
            }
        }
    };
    ($ty:ty, $kind:literal, $id:ty, partition = $parent:ident) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;
            type Id = $id;

            fn id(&self) -> $id {
                self.id
            }

            fn organization_id(&self) -> OrganizationId {
                self.scope.organization_id
            }

            fn branch_id(&self) -> Option<BranchId> {
                Some(self.scope.branch_id)
            }

            fn partition(&self) -> Option<Uuid> {
                Some(self.$parent.into())
            }
        }
    };
}

// ========== Accounts & Members ==========
branch_record!(Account, "account", AccountId);
branch_record!(AccountHistory, "account_history", AccountHistoryId, partition = account_id);
branch_record!(MemberProfile, "member_profile", MemberProfileId);
branch_record!(
    MemberTypeHistory,
    "member_type_history",
    MemberTypeHistoryId,
    partition = member_profile_id
);
branch_record!(Holiday, "holiday", HolidayId);

// ========== Ledger ==========
branch_record!(GeneralLedgerEntry, "general_ledger", GeneralLedgerId, partition = account_id);

// ========== Loans ==========
branch_record!(LoanTransaction, "loan_transaction", LoanTransactionId);
branch_record!(
    LoanTransactionEntry,
    "loan_transaction_entry",
    LoanTransactionEntryId,
    partition = loan_transaction_id
);
branch_record!(LoanAccount, "loan_account", LoanAccountId, partition = loan_transaction_id);
branch_record!(
    AutomaticLoanDeduction,
    "automatic_loan_deduction",
    AutomaticLoanDeductionId,
    partition = computation_sheet_id
);

// ========== Teller Batches ==========
branch_record!(TransactionBatch, "transaction_batch", TransactionBatchId);
branch_record!(BatchFunding, "batch_funding", BatchFundingId, partition = transaction_batch_id);
branch_record!(CashCount, "cash_count", CashCountId, partition = transaction_batch_id);
branch_record!(
    CheckRemittance,
    "check_remittance",
    CheckRemittanceId,
    partition = transaction_batch_id
);
branch_record!(
    OnlineRemittance,
    "online_remittance",
    OnlineRemittanceId,
    partition = transaction_batch_id
);
branch_record!(
    DisbursementTransaction,
    "disbursement_transaction",
    DisbursementTransactionId,
    partition = transaction_batch_id
);
branch_record!(TellerTransaction, "transaction", TransactionId, partition = transaction_batch_id);
branch_record!(TellerSetting, "teller_setting", TellerSettingId);

// ========== Generators ==========
branch_record!(BrowseReference, "browse_reference", BrowseReferenceId, partition = account_id);
branch_record!(GeneratedSavingsInterest, "generated_savings_interest", GeneratedSavingsInterestId);
branch_record!(
    GeneratedSavingsInterestEntry,
    "generated_savings_interest_entry",
    GeneratedSavingsInterestEntryId,
    partition = generated_savings_interest_id
);
branch_record!(MutualFund, "mutual_fund", MutualFundId);
branch_record!(MutualFundEntry, "mutual_fund_entry", MutualFundEntryId, partition = mutual_fund_id);

// Payment types are shared by every branch of an organization.
impl Record for PaymentType {
    const KIND: &'static str = "payment_type";
    type Id = PaymentTypeId;

    fn id(&self) -> PaymentTypeId {
        self.id
    }

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    fn branch_id(&self) -> Option<BranchId> {
        None
    }
}
