//! Loan processor: posts the accruals of schedule periods that have
//! elapsed since a released loan was last processed.
//!
//! A loan is claimed by setting its `processing` flag under the row lock
//! and committing, so a concurrent processor sees the claim and backs off
//! with `LoanError::AlreadyProcessing`. The work then runs in a second unit
//! of work that holds the loan row lock throughout and clears the flag on
//! commit. A failed run clears the flag in a third unit of work.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coopbank_core::account::AccountSnapshot;
use coopbank_core::ledger::{EntryDirection, LedgerSource, PostingRequest};
use coopbank_core::loan::{compute_schedule, plan_processing, LoanAccount, LoanError, LoanTransaction};
use coopbank_core::member::MemberProfile;
use coopbank_db::{Crud, Query, Store, StoreError};
use coopbank_shared::types::{AccountId, LoanTransactionId, MemberProfileId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::accounts::snapshot_at;
use super::ledger::append;
use super::loans::{holidays, lock_loan, pinned_snapshots};
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineResult, ResultExt};
use crate::events::Outbox;

/// Outcome of processing one loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    /// The loan.
    pub loan_id: LoanTransactionId,
    /// Periods processed before this run.
    pub previous_count: u32,
    /// Periods processed after this run.
    pub new_count: u32,
    /// Ledger entries posted.
    pub posted: usize,
    /// Name of the loan account.
    pub account_name: String,
    /// Name of the borrower, empty when the profile is gone.
    pub member_name: String,
}

async fn member_name<T: Crud>(tx: &mut T, member_profile_id: MemberProfileId) -> EngineResult<String> {
    match tx.find_one::<MemberProfile>(member_profile_id).await {
        Ok(member) => Ok(member.full_name),
        Err(StoreError::NotFound { .. }) => Ok(String::new()),
        Err(e) => Err::<String, _>(e).context("load member", member_profile_id),
    }
}

/// Single-loan processing.
#[derive(Debug, Clone)]
pub struct LoanProcessor<S> {
    engine: Engine<S>,
}

impl<S: Store> LoanProcessor<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    pub(crate) fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Processes one released loan up to today in its loan account's timezone.
    ///
    /// Running it again on the same day posts nothing.
    #[instrument(name = "loan.process", skip_all, fields(loan_id = %loan_id), err)]
    pub async fn process(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<ProcessSummary> {
        self.claim(ctx, loan_id).await?;
        match self.run_claimed(ctx, loan_id).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.release_claim(ctx, loan_id).await;
                Err(err)
            }
        }
    }

    /// Sets the processing flag of a released, unclaimed loan.
    pub(crate) async fn claim(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<()> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::claim_in(&mut tx, ctx, loan_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    pub(crate) async fn claim_in<T: Crud>(
        tx: &mut T,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        if loan.released_date.is_none() {
            return Err(LoanError::NotReleased(loan.id).into());
        }
        if loan.processing {
            return Err(LoanError::AlreadyProcessing(loan.id).into());
        }
        loan.processing = true;
        loan.updated_at = now;
        tx.update(&loan).await.context("claim loan", loan.id)?;
        Ok(())
    }

    /// Clears the processing flag after a failed run. Failures here are
    /// logged; the flag stays set and needs an operator.
    pub(crate) async fn release_claim(&self, ctx: &RequestContext, loan_id: LoanTransactionId) {
        let result = match self.engine.begin(ctx).await {
            Ok((mut tx, outbox)) => {
                let now = self.engine.now(ctx);
                let result = Self::release_claim_in(&mut tx, ctx, loan_id, now).await;
                self.engine.finish(ctx, tx, outbox, result).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(loan_id = %loan_id, error = %e, "Could not clear processing flag");
        }
    }

    async fn release_claim_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        loan.processing = false;
        loan.updated_at = now;
        tx.update(&loan).await.context("clear processing flag", loan.id)?;
        Ok(())
    }

    /// Processes a loan this caller has claimed and clears its flag.
    pub(crate) async fn run_claimed(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<ProcessSummary> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::run_in(&mut tx, &mut outbox, ctx, loan_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn run_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        now: DateTime<Utc>,
    ) -> EngineResult<ProcessSummary> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        let pinned = pinned_snapshots(tx, &loan).await?;
        let snapshots: Vec<AccountSnapshot> = pinned.iter().map(|(_, s)| s.clone()).collect();
        let holidays = holidays(tx, loan.scope).await?;
        let schedule =
            compute_schedule(&loan, &snapshots, &holidays).context("compute schedule", loan.id)?;

        let loan_snapshot = match snapshots.iter().find(|s| s.account_id == loan.account_id) {
            Some(snapshot) => snapshot.clone(),
            None => snapshot_at(tx, loan.account_id, now).await?,
        };
        let today = loan_snapshot.currency.local_date(now);
        let plan = plan_processing(&loan, &schedule, today).context("plan processing", loan.id)?;

        let mut loan_accounts: HashMap<AccountId, (LoanAccount, AccountSnapshot)> = pinned
            .into_iter()
            .map(|(loan_account, snapshot)| (loan_account.account_id, (loan_account, snapshot)))
            .collect();
        for accrual in &plan.accruals {
            let Some((loan_account, snapshot)) = loan_accounts.get_mut(&accrual.account_id) else {
                return Err(LoanError::MissingAccount(accrual.account_id).into());
            };
            let request = PostingRequest {
                scope: loan.scope,
                account: snapshot.clone(),
                member_profile_id: Some(loan.member_profile_id),
                direction: EntryDirection::Credit,
                amount: accrual.amount,
                entry_date: now,
                source: LedgerSource::Loan,
                transaction_batch_id: None,
                transaction_id: None,
                loan_transaction_id: Some(loan.id),
                payment_type_id: None,
                reference_number: loan.voucher.clone(),
                description: format!("{} - period {}", accrual.name, accrual.period),
                created_by: ctx.actor,
            };
            append(tx, outbox, &request, now).await?;
            loan_account.amount += accrual.amount;
            debug!(
                loan_id = %loan.id,
                period = accrual.period,
                account_id = %accrual.account_id,
                amount = %accrual.amount,
                "Accrual posted"
            );
        }
        for (loan_account, _) in loan_accounts.values() {
            if plan.accruals.iter().any(|a| a.account_id == loan_account.account_id) {
                tx.update(loan_account)
                    .await
                    .context("update loan account", loan_account.id)?;
            }
        }

        let previous_count = loan.count;
        loan.count = plan.new_count;
        loan.processing = false;
        loan.updated_at = now;
        tx.update(&loan).await.context("store processed count", loan.id)?;
        outbox.record("loan_transaction", "update", loan.id, loan.scope, &loan);

        let summary = ProcessSummary {
            loan_id: loan.id,
            previous_count,
            new_count: loan.count,
            posted: plan.accruals.len(),
            account_name: loan_snapshot.name,
            member_name: member_name(tx, loan.member_profile_id).await?,
        };
        info!(
            loan_id = %loan.id,
            previous_count,
            new_count = summary.new_count,
            posted = summary.posted,
            "Loan processed"
        );
        Ok(summary)
    }

    /// Released loans of the caller's branch not currently claimed.
    pub(crate) async fn eligible<T: Crud>(
        tx: &mut T,
        ctx: &RequestContext,
    ) -> EngineResult<Vec<LoanTransaction>> {
        tx.find(
            Query::<LoanTransaction>::in_scope(ctx.scope)
                .filter(|l| l.released_date.is_some() && !l.processing),
        )
        .await
        .context("find eligible loans", ctx.scope.branch_id)
    }
}
