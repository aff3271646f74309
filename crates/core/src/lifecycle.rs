//! Generate, print and post lifecycle shared by savings-interest runs and
//! mutual funds.
//!
//! A generated set may be regenerated freely until printed. Printing
//! freezes it for review; undoing the print reopens it; posting commits it
//! to the ledger once and for all.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{AccountId, MemberProfileId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::EntryDirection;

/// Errors raised by lifecycle transitions.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Print requires an unprinted set.
    #[error("Already printed")]
    AlreadyPrinted,

    /// Undo and post require a printed set.
    #[error("Not printed yet")]
    NotPrinted,

    /// Posting is final.
    #[error("Already posted")]
    AlreadyPosted,
}

impl LifecycleError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyPrinted => "ALREADY_PRINTED",
            Self::NotPrinted => "NOT_PRINTED",
            Self::AlreadyPosted => "ALREADY_POSTED",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        422
    }
}

/// Print and post stamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    /// Print time.
    pub printed_date: Option<DateTime<Utc>>,
    /// Printing user.
    pub printed_by: Option<UserId>,
    /// Post time.
    pub posted_date: Option<DateTime<Utc>>,
    /// Posting user.
    pub posted_by: Option<UserId>,
    /// Check voucher stamped at post.
    pub check_voucher_number: Option<String>,
    /// Account mirrored at post.
    pub post_account_id: Option<AccountId>,
}

impl ReviewState {
    /// Regeneration is only allowed before printing.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPosted` or `AlreadyPrinted`.
    pub fn ensure_editable(&self) -> Result<(), LifecycleError> {
        if self.posted_date.is_some() {
            return Err(LifecycleError::AlreadyPosted);
        }
        if self.printed_date.is_some() {
            return Err(LifecycleError::AlreadyPrinted);
        }
        Ok(())
    }

    /// Marks the set printed.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPrinted` when printed.
    pub fn print(&mut self, user: UserId, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.printed_date.is_some() {
            return Err(LifecycleError::AlreadyPrinted);
        }
        self.printed_date = Some(now);
        self.printed_by = Some(user);
        Ok(())
    }

    /// Clears the print stamp.
    ///
    /// # Errors
    ///
    /// Returns `NotPrinted` or `AlreadyPosted`.
    pub fn undo_print(&mut self) -> Result<(), LifecycleError> {
        if self.printed_date.is_none() {
            return Err(LifecycleError::NotPrinted);
        }
        if self.posted_date.is_some() {
            return Err(LifecycleError::AlreadyPosted);
        }
        self.printed_date = None;
        self.printed_by = None;
        Ok(())
    }

    /// Checks that the set can be posted.
    ///
    /// # Errors
    ///
    /// Returns `NotPrinted` or `AlreadyPosted`.
    pub fn ensure_postable(&self) -> Result<(), LifecycleError> {
        if self.printed_date.is_none() {
            return Err(LifecycleError::NotPrinted);
        }
        if self.posted_date.is_some() {
            return Err(LifecycleError::AlreadyPosted);
        }
        Ok(())
    }

    /// Stamps the post.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_postable`](Self::ensure_postable).
    pub fn mark_posted(
        &mut self,
        user: UserId,
        now: DateTime<Utc>,
        request: &PostRequest,
    ) -> Result<(), LifecycleError> {
        self.ensure_postable()?;
        self.posted_date = Some(now);
        self.posted_by = Some(user);
        self.check_voucher_number.clone_from(&request.check_voucher_number);
        self.post_account_id = request.post_account_id;
        Ok(())
    }
}

/// Parameters of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    /// Voucher stamped on every posted entry.
    pub check_voucher_number: Option<String>,
    /// Coop account mirrored with the opposite leg, if any.
    pub post_account_id: Option<AccountId>,
    /// Business date of the posted entries.
    pub entry_date: DateTime<Utc>,
}

/// One ledger posting produced when a generated set is posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLeg {
    /// Member, `None` on the mirrored coop leg.
    pub member_profile_id: Option<MemberProfileId>,
    /// Account to post to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub direction: EntryDirection,
    /// Positive amount.
    pub amount: Decimal,
}

impl PostLeg {
    /// The member leg, followed by its mirror on `post_account_id` if set.
    #[must_use]
    pub fn with_mirror(self, post_account_id: Option<AccountId>) -> Vec<Self> {
        let mirror = post_account_id.map(|account_id| Self {
            member_profile_id: None,
            account_id,
            direction: self.direction.opposite(),
            amount: self.amount,
        });
        std::iter::once(self).chain(mirror).collect()
    }
}
