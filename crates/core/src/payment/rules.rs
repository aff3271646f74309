//! Account-type rules for teller payments.
//!
//! [`plan_payment`] validates a request against the locked latest entry of
//! the target chain and returns the ledger entry to append together with
//! the updated transaction header. Nothing is written here.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{MemberProfileId, Scope, TransactionId, UserId, round_money};
use rust_decimal::Decimal;

use super::error::PaymentError;
use super::types::{PaymentRequest, PaymentSource, PaymentType, TellerSetting, TellerTransaction};
use crate::account::{AccountSnapshot, AccountType};
use crate::batch::TransactionBatch;
use crate::ledger::{EntryDirection, GeneralLedgerEntry, PostingRequest, prepare_entry};
use crate::member::MemberProfile;

/// A request amount made positive, with the source it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedAmount {
    /// Absolute amount.
    pub amount: Decimal,
    /// Source after flipping for a negative amount.
    pub source: PaymentSource,
}

/// Rounds to cents, rejects zero and flips negative amounts.
///
/// Balance checks and header totals see the same cents the ledger entry
/// stores.
///
/// # Errors
///
/// Returns `PaymentError::ZeroAmount` for an amount that rounds to zero.
pub fn normalize(amount: Decimal, source: PaymentSource) -> Result<NormalizedAmount, PaymentError> {
    let amount = round_money(amount);
    if amount.is_zero() {
        return Err(PaymentError::ZeroAmount);
    }
    if amount.is_sign_negative() {
        return Ok(NormalizedAmount {
            amount: -amount,
            source: source.flipped(),
        });
    }
    Ok(NormalizedAmount { amount, source })
}

/// Direction of the entry for a payment of `amount` against `balance`.
///
/// # Errors
///
/// Returns `InsufficientBalance` for withdrawals beyond the balance on
/// deposit-like accounts and `Overpayment` for loan payments beyond the
/// outstanding balance.
pub fn resolve_direction(
    account_type: AccountType,
    source: PaymentSource,
    balance: Decimal,
    amount: Decimal,
) -> Result<EntryDirection, PaymentError> {
    let inflow = source.is_inflow();
    match account_type {
        AccountType::Deposit | AccountType::Other => {
            if inflow {
                Ok(EntryDirection::Credit)
            } else if balance < amount {
                Err(PaymentError::InsufficientBalance {
                    available: balance,
                    required: amount,
                })
            } else {
                Ok(EntryDirection::Debit)
            }
        }
        AccountType::Loan => {
            if !inflow {
                Ok(EntryDirection::Credit)
            } else if balance < amount {
                Err(PaymentError::Overpayment {
                    balance,
                    payment: amount,
                })
            } else {
                Ok(EntryDirection::Debit)
            }
        }
        AccountType::Receivable
        | AccountType::Payable
        | AccountType::Fines
        | AccountType::Interest
        | AccountType::SvfLedger
        | AccountType::WriteOff => Ok(if inflow {
            EntryDirection::Debit
        } else {
            EntryDirection::Credit
        }),
    }
}

/// The member whose chain a request posts to: the request's, else the
/// existing header's.
#[must_use]
pub fn effective_member(
    request: &PaymentRequest,
    header: Option<&TellerTransaction>,
) -> Option<MemberProfileId> {
    request
        .member_profile_id
        .or_else(|| header.and_then(|h| h.member_profile_id))
}

impl TellerTransaction {
    /// A fresh header in `batch` with a zero running amount.
    #[must_use]
    pub fn open(
        batch: &TransactionBatch,
        teller: UserId,
        member_profile_id: Option<MemberProfileId>,
        reference_number: String,
        source: PaymentSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            scope: batch.scope,
            transaction_batch_id: batch.id,
            employee_user_id: teller,
            member_profile_id,
            amount: Decimal::ZERO,
            reference_number,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Accumulates a posted amount: deposits add, withdrawals subtract.
    pub fn accumulate(&mut self, source: PaymentSource, amount: Decimal, now: DateTime<Utc>) {
        match source {
            PaymentSource::Deposit => self.amount += amount,
            PaymentSource::Withdraw => self.amount -= amount,
            PaymentSource::Payment => {}
        }
        self.updated_at = now;
    }
}

impl TellerSetting {
    /// Issues the next official receipt number.
    ///
    /// # Errors
    ///
    /// Returns `ReceiptsExhausted` once the series end has been issued.
    pub fn issue_receipt(&mut self) -> Result<u64, PaymentError> {
        let next = self.used_or.max(self.start_or.saturating_sub(1)) + 1;
        if next > self.end_or {
            return Err(PaymentError::ReceiptsExhausted { end: self.end_or });
        }
        self.used_or = next;
        Ok(next)
    }
}

/// Everything a payment is checked against, loaded and locked by the caller.
#[derive(Debug, Clone, Copy)]
pub struct PaymentContext<'a> {
    /// Branch the teller works in.
    pub scope: Scope,
    /// The teller.
    pub actor: UserId,
    /// The teller's open batch.
    pub batch: &'a TransactionBatch,
    /// Rules of the target account.
    pub account: &'a AccountSnapshot,
    /// Payment type of the request.
    pub payment_type: &'a PaymentType,
    /// Member of the request, when given.
    pub member: Option<&'a MemberProfile>,
    /// Header named by the request, when it exists.
    pub header: Option<&'a TellerTransaction>,
    /// Locked latest entry of the target chain.
    pub latest: Option<&'a GeneralLedgerEntry>,
    /// Current time.
    pub now: DateTime<Utc>,
}

/// The outcome of a payment: one new entry and the header to save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPlan {
    /// Entry to append.
    pub entry: GeneralLedgerEntry,
    /// Header after accumulating the amount.
    pub header: TellerTransaction,
    /// True when the header must be created rather than updated.
    pub header_is_new: bool,
    /// Source after normalization.
    pub source: PaymentSource,
}

/// Validates a payment and builds its entry and header.
///
/// # Errors
///
/// Returns `PaymentError` for a zero amount, records outside the branch,
/// a closed batch, a header from another batch, an insufficient balance,
/// a loan overpayment, or a posting the ledger refuses.
pub fn plan_payment(
    request: &PaymentRequest,
    ctx: PaymentContext<'_>,
) -> Result<PaymentPlan, PaymentError> {
    if request.amount.is_zero() {
        return Err(PaymentError::ZeroAmount);
    }
    if ctx.account.scope_mismatch(ctx.scope) {
        return Err(PaymentError::ScopeMismatch("Account"));
    }
    if ctx.payment_type.organization_id != ctx.scope.organization_id {
        return Err(PaymentError::ScopeMismatch("Payment type"));
    }
    if ctx.member.is_some_and(|m| m.scope != ctx.scope) {
        return Err(PaymentError::ScopeMismatch("Member"));
    }
    if ctx.batch.is_closed {
        return Err(PaymentError::BatchClosed(ctx.batch.id));
    }
    if let Some(header) = ctx.header
        && header.transaction_batch_id != ctx.batch.id
    {
        return Err(PaymentError::ForeignTransaction {
            transaction: header.id,
            batch: ctx.batch.id,
        });
    }

    let requested_source = ctx.header.map_or(request.source, |h| h.source);
    let normalized = normalize(request.amount, requested_source)?;
    let balance = ctx.latest.map_or(Decimal::ZERO, |e| e.balance);
    let account_type = ctx.account.rules.account_type;
    let direction = resolve_direction(account_type, normalized.source, balance, normalized.amount)?;

    let member_profile_id = effective_member(request, ctx.header);
    let (mut header, header_is_new) = match ctx.header {
        Some(existing) => (existing.clone(), false),
        None => (
            TellerTransaction::open(
                ctx.batch,
                ctx.actor,
                member_profile_id,
                request.reference_number.clone(),
                requested_source,
                ctx.now,
            ),
            true,
        ),
    };
    let reference_number = if header.reference_number.is_empty() {
        request.reference_number.clone()
    } else {
        header.reference_number.clone()
    };

    let posting = PostingRequest {
        scope: ctx.scope,
        account: ctx.account.clone(),
        member_profile_id,
        direction,
        amount: normalized.amount,
        entry_date: request.entry_date.unwrap_or(ctx.now),
        source: normalized.source.ledger_source(),
        transaction_batch_id: Some(ctx.batch.id),
        transaction_id: Some(header.id),
        loan_transaction_id: None,
        payment_type_id: Some(request.payment_type_id),
        reference_number,
        description: request.description.clone(),
        created_by: ctx.actor,
    };
    let entry = prepare_entry(&posting, ctx.latest, ctx.now)?;
    header.accumulate(normalized.source, normalized.amount, ctx.now);

    Ok(PaymentPlan {
        entry,
        header,
        header_is_new,
        source: normalized.source,
    })
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
