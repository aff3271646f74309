//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `LoanTransactionId` where an
//! `AccountId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// ========== Tenancy & Actors ==========
typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(BranchId, "Unique identifier for a branch of an organization.");
typed_id!(UserId, "Unique identifier for a user (teller, officer).");
typed_id!(TellerSettingId, "Unique identifier for a teller's receipt settings.");

// ========== Members ==========
typed_id!(MemberProfileId, "Unique identifier for a member profile.");
typed_id!(MemberTypeId, "Unique identifier for a member type.");
typed_id!(
    MemberTypeHistoryId,
    "Unique identifier for a member type assignment record."
);

// ========== Accounts & Reference Data ==========
typed_id!(AccountId, "Unique identifier for an account.");
typed_id!(AccountHistoryId, "Unique identifier for an account rule snapshot.");
typed_id!(PaymentTypeId, "Unique identifier for a payment type.");
typed_id!(HolidayId, "Unique identifier for a holiday.");
typed_id!(ComputationSheetId, "Unique identifier for a loan computation sheet.");
typed_id!(
    BrowseReferenceId,
    "Unique identifier for a savings interest rate scheme."
);

// ========== Ledger & Teller ==========
typed_id!(GeneralLedgerId, "Unique identifier for a general ledger entry.");
typed_id!(TransactionId, "Unique identifier for a teller transaction header.");
typed_id!(TransactionBatchId, "Unique identifier for a teller batch.");
typed_id!(BatchFundingId, "Unique identifier for a batch funding line.");
typed_id!(CashCountId, "Unique identifier for a cash count line.");
typed_id!(CheckRemittanceId, "Unique identifier for a check remittance line.");
typed_id!(OnlineRemittanceId, "Unique identifier for an online remittance line.");
typed_id!(
    DisbursementTransactionId,
    "Unique identifier for a petty-cash disbursement line."
);

// ========== Loans ==========
typed_id!(LoanTransactionId, "Unique identifier for a loan transaction.");
typed_id!(
    LoanTransactionEntryId,
    "Unique identifier for a loan balancing entry."
);
typed_id!(LoanAccountId, "Unique identifier for a per-loan account state.");
typed_id!(
    AutomaticLoanDeductionId,
    "Unique identifier for an automatic loan deduction rule."
);

// ========== Generators ==========
typed_id!(
    GeneratedSavingsInterestId,
    "Unique identifier for a savings interest run."
);
typed_id!(
    GeneratedSavingsInterestEntryId,
    "Unique identifier for a generated savings interest entry."
);
typed_id!(MutualFundId, "Unique identifier for a mutual fund.");
typed_id!(MutualFundEntryId, "Unique identifier for a mutual fund entry.");

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
