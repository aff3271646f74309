//! Building the next entry of a balance chain.
//!
//! [`prepare_entry`] is the pure half of posting: given the chain's latest
//! entry (already locked by the caller) it validates the request and returns
//! the immutable entry to persist. Nothing is written here.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{
    GeneralLedgerId, LoanTransactionId, MemberProfileId, PaymentTypeId, Scope,
    TransactionBatchId, TransactionId, UserId, round_money,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance::{check_limits, next_balance};
use super::entry::{EntryDirection, GeneralLedgerEntry, LedgerKey, LedgerSource};
use super::error::PostingError;
use crate::account::AccountSnapshot;

/// A request to append one entry to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    /// Organization and branch the posting runs under.
    pub scope: Scope,
    /// Account rules in effect for this posting.
    pub account: AccountSnapshot,
    /// Member, ignored for coop-level accounts.
    pub member_profile_id: Option<MemberProfileId>,
    /// Debit or credit.
    pub direction: EntryDirection,
    /// Positive amount.
    pub amount: Decimal,
    /// Business date.
    pub entry_date: DateTime<Utc>,
    /// Origin.
    pub source: LedgerSource,
    /// Teller batch, if any.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// Teller transaction header, if any.
    pub transaction_id: Option<TransactionId>,
    /// Loan, if any.
    pub loan_transaction_id: Option<LoanTransactionId>,
    /// Payment type; the account's default when unset.
    pub payment_type_id: Option<PaymentTypeId>,
    /// Voucher or receipt number.
    pub reference_number: String,
    /// Free text.
    pub description: String,
    /// Posting user.
    pub created_by: UserId,
}

impl PostingRequest {
    /// The chain this request appends to.
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(
            self.scope,
            self.account.account_id,
            self.account.rules.account_type,
            self.member_profile_id,
        )
    }
}

/// Validates `request` against the chain's `latest` entry and builds the next entry.
///
/// # Errors
///
/// Returns a `PostingError` for a non-positive amount, a back-dated entry,
/// or a resulting balance outside the account's limits.
pub fn prepare_entry(
    request: &PostingRequest,
    latest: Option<&GeneralLedgerEntry>,
    now: DateTime<Utc>,
) -> Result<GeneralLedgerEntry, PostingError> {
    let amount = round_money(request.amount);
    if amount.is_zero() {
        return Err(PostingError::ZeroAmount);
    }
    if amount.is_sign_negative() {
        return Err(PostingError::NegativeAmount);
    }
    if request.account.scope_mismatch(request.scope) {
        return Err(PostingError::ScopeMismatch);
    }

    let (previous_balance, seq) = match latest {
        Some(prev) => {
            if request.entry_date < prev.entry_date {
                return Err(PostingError::BackdatedEntry {
                    latest: prev.entry_date,
                    requested: request.entry_date,
                });
            }
            (prev.balance, prev.seq + 1)
        }
        None => (Decimal::ZERO, 1),
    };

    let rules = &request.account.rules;
    let balance = next_balance(rules.account_type, previous_balance, request.direction, amount);
    check_limits(rules.limits(), balance)?;

    let key = request.key();
    let (debit, credit) = match request.direction {
        EntryDirection::Debit => (amount, Decimal::ZERO),
        EntryDirection::Credit => (Decimal::ZERO, amount),
    };

    Ok(GeneralLedgerEntry {
        id: GeneralLedgerId::new(),
        scope: key.scope,
        account_id: key.account_id,
        member_profile_id: key.member_profile_id,
        account_type: rules.account_type,
        source: request.source,
        debit,
        credit,
        previous_balance,
        balance,
        seq,
        entry_date: request.entry_date,
        transaction_batch_id: request.transaction_batch_id,
        transaction_id: request.transaction_id,
        loan_transaction_id: request.loan_transaction_id,
        payment_type_id: request.payment_type_id.or(rules.default_payment_type_id),
        reference_number: request.reference_number.clone(),
        description: request.description.clone(),
        created_by: request.created_by,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountRules, AccountType};
    use chrono::TimeZone;
    use coopbank_shared::types::{AccountId, BranchId, Currency, OrganizationId};
    use rust_decimal_macros::dec;

    fn request(account_type: AccountType, direction: EntryDirection, amount: Decimal) -> PostingRequest {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        PostingRequest {
            scope,
            account: AccountSnapshot {
                account_id: AccountId::new(),
                scope,
                history_id: None,
                name: "Savings".to_string(),
                currency: Currency::new("PHP", chrono_tz::Asia::Manila),
                rules: AccountRules::new(account_type),
            },
            member_profile_id: Some(MemberProfileId::new()),
            direction,
            amount,
            entry_date: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            source: LedgerSource::Deposit,
            transaction_batch_id: None,
            transaction_id: None,
            loan_transaction_id: None,
            payment_type_id: None,
            reference_number: "OR-1".to_string(),
            description: String::new(),
            created_by: UserId::new(),
        }
    }

    #[test]
    fn test_first_entry_starts_chain() {
        let req = request(AccountType::Deposit, EntryDirection::Credit, dec!(250));
        let entry = prepare_entry(&req, None, req.entry_date).unwrap();
        assert_eq!(entry.seq, 1);
        assert_eq!(entry.previous_balance, Decimal::ZERO);
        assert_eq!(entry.balance, dec!(250));
        assert_eq!(entry.credit, dec!(250));
    }

    #[test]
    fn test_next_entry_links_to_latest() {
        let req = request(AccountType::Deposit, EntryDirection::Credit, dec!(250));
        let first = prepare_entry(&req, None, req.entry_date).unwrap();
        let mut debit = req.clone();
        debit.direction = EntryDirection::Debit;
        debit.amount = dec!(100);
        let second = prepare_entry(&debit, Some(&first), req.entry_date).unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.previous_balance, dec!(250));
        assert_eq!(second.balance, dec!(150));
    }

    #[test]
    fn test_payment_type_falls_back_to_account_default() {
        let mut req = request(AccountType::Loan, EntryDirection::Credit, dec!(10));
        let cash = PaymentTypeId::new();
        req.account.rules.default_payment_type_id = Some(cash);
        let entry = prepare_entry(&req, None, req.entry_date).unwrap();
        assert_eq!(entry.payment_type_id, Some(cash));

        let teller = PaymentTypeId::new();
        req.payment_type_id = Some(teller);
        let entry = prepare_entry(&req, None, req.entry_date).unwrap();
        assert_eq!(entry.payment_type_id, Some(teller));
    }

    #[test]
    fn test_other_account_drops_member() {
        let req = request(AccountType::Other, EntryDirection::Credit, dec!(10));
        let entry = prepare_entry(&req, None, req.entry_date).unwrap();
        assert!(entry.member_profile_id.is_none());
    }

    #[test]
    fn test_rejects_zero_and_backdated() {
        let req = request(AccountType::Deposit, EntryDirection::Credit, Decimal::ZERO);
        assert!(matches!(
            prepare_entry(&req, None, req.entry_date),
            Err(PostingError::ZeroAmount)
        ));

        let ok = request(AccountType::Deposit, EntryDirection::Credit, dec!(5));
        let first = prepare_entry(&ok, None, ok.entry_date).unwrap();
        let mut early = ok.clone();
        early.entry_date = ok.entry_date - chrono::Duration::days(1);
        assert!(matches!(
            prepare_entry(&early, Some(&first), ok.entry_date),
            Err(PostingError::BackdatedEntry { .. })
        ));
    }

    #[test]
    fn test_limit_breach_rejected() {
        let mut req = request(AccountType::Deposit, EntryDirection::Credit, dec!(6000));
        req.account.rules.min_amount = dec!(0);
        req.account.rules.max_amount = dec!(5000);
        assert!(matches!(
            prepare_entry(&req, None, req.entry_date),
            Err(PostingError::LimitExceeded { .. })
        ));
    }
}
