//! Loan service: balancing, print, schedule and release.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coopbank_core::account::{Account, AccountHistory, AccountSnapshot, AccountType};
use coopbank_core::ledger::{LedgerSource, PostingRequest};
use coopbank_core::loan::{
    balance_loan, compute_schedule, ensure_releasable, plan_release, related_accounts,
    AutomaticLoanDeduction, BalancingInput, Holiday, LoanAccount, LoanError, LoanTransaction,
    LoanTransactionEntry, PreviousLoan, SchedulePeriod,
};
use coopbank_db::{Crud, Query, Store};
use coopbank_shared::types::{AccountId, LoanAccountId, LoanTransactionId, Scope};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use super::accounts::{ensure_in_scope, pin_history, snapshot_at};
use super::batches::require_open_batch;
use super::ledger::append;
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineResult, ResultExt};
use crate::events::Outbox;

/// Locks a loan of the caller's branch.
pub(crate) async fn lock_loan<T: Crud>(
    tx: &mut T,
    ctx: &RequestContext,
    loan_id: LoanTransactionId,
) -> EngineResult<LoanTransaction> {
    let loan: LoanTransaction = tx
        .find_one_for_update(loan_id)
        .await
        .context("lock loan", loan_id)?;
    ensure_in_scope(ctx, loan.scope, "Loan")?;
    Ok(loan)
}

/// The pinned rule snapshots of a released loan's related accounts.
pub(crate) async fn pinned_snapshots<T: Crud>(
    tx: &mut T,
    loan: &LoanTransaction,
) -> EngineResult<Vec<(LoanAccount, AccountSnapshot)>> {
    let loan_accounts = tx
        .find(Query::<LoanAccount>::in_scope(loan.scope).within(loan.id))
        .await
        .context("load loan accounts", loan.id)?;
    let mut pinned = Vec::with_capacity(loan_accounts.len());
    for loan_account in loan_accounts {
        let history: AccountHistory = tx
            .find_one(loan_account.account_history_id)
            .await
            .context("load pinned history", loan_account.account_history_id)?;
        pinned.push((loan_account, history.snapshot()));
    }
    Ok(pinned)
}

/// Holidays of a branch.
pub(crate) async fn holidays<T: Crud>(tx: &mut T, scope: Scope) -> EngineResult<Vec<Holiday>> {
    tx.find(Query::<Holiday>::in_scope(scope))
        .await
        .context("load holidays", scope.branch_id)
}

/// The schedule of a loan: pinned snapshots once released, otherwise the
/// related accounts' rules at the print date.
pub(crate) async fn schedule_of<T: Crud>(
    tx: &mut T,
    loan: &LoanTransaction,
) -> EngineResult<Vec<SchedulePeriod>> {
    let snapshots = if loan.released_date.is_some() {
        pinned_snapshots(tx, loan)
            .await?
            .into_iter()
            .map(|(_, snapshot)| snapshot)
            .collect()
    } else {
        let at = loan.printed_date.unwrap_or(loan.created_at);
        let accounts = tx
            .find(Query::<Account>::in_scope(loan.scope))
            .await
            .context("load accounts", loan.id)?;
        let mut snapshots = Vec::new();
        for account in related_accounts(loan, &accounts) {
            snapshots.push(snapshot_at(tx, account.id, at).await?);
        }
        snapshots
    };
    let holidays = holidays(tx, loan.scope).await?;
    compute_schedule(loan, &snapshots, &holidays).context("compute schedule", loan.id)
}

/// Rebuilds the voucher legs of a locked loan and stores its totals.
async fn balance_locked<T: Crud>(
    tx: &mut T,
    loan: &mut LoanTransaction,
    cash_account_id: Option<AccountId>,
    now: DateTime<Utc>,
) -> EngineResult<Vec<LoanTransactionEntry>> {
    let loan_account = snapshot_at(tx, loan.account_id, now).await?;
    let cash_account = match cash_account_id {
        Some(id) => Some(snapshot_at(tx, id, now).await?),
        None => None,
    };
    let existing = tx
        .find(Query::<LoanTransactionEntry>::in_scope(loan.scope).within(loan.id))
        .await
        .context("load loan entries", loan.id)?;
    let deduction_rules = match loan_account.rules.computation_sheet_id {
        Some(sheet) => tx
            .find(Query::<AutomaticLoanDeduction>::in_scope(loan.scope).within(sheet))
            .await
            .context("load deduction rules", sheet)?,
        None => Vec::new(),
    };
    let previous = match loan.previous_loan_id {
        Some(previous_id) if loan.loan_type.settles_previous_loan() => {
            let previous: LoanTransaction = tx
                .find_one(previous_id)
                .await
                .context("load previous loan", previous_id)?;
            let account: Account = tx
                .find_one(previous.account_id)
                .await
                .context("load previous loan account", previous.account_id)?;
            Some((previous, account.name))
        }
        _ => None,
    };

    let balanced = balance_loan(BalancingInput {
        loan: &*loan,
        loan_account: &loan_account,
        cash_account: cash_account.as_ref(),
        existing: &existing,
        deduction_rules: &deduction_rules,
        previous: previous.as_ref().map(|(loan, account_name)| PreviousLoan {
            loan,
            account_name: account_name.as_str(),
        }),
    })
    .context("balance loan", loan.id)?;

    for entry in &existing {
        tx.delete::<LoanTransactionEntry>(entry.id)
            .await
            .context("delete loan entry", entry.id)?;
    }
    for entry in &balanced.entries {
        tx.create(entry).await.context("create loan entry", entry.id)?;
    }
    balanced.totals.apply(loan);
    loan.updated_at = now;
    tx.update(&*loan).await.context("store loan totals", loan.id)?;
    debug!(
        loan_id = %loan.id,
        legs = balanced.entries.len(),
        total_credit = %loan.total_credit,
        "Loan balanced"
    );
    Ok(balanced.entries)
}

/// Loans before and at release.
#[derive(Debug, Clone)]
pub struct LoanService<S> {
    engine: Engine<S>,
}

impl<S: Store> LoanService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Stores a new loan application in the caller's branch.
    #[instrument(name = "loan.create", skip_all, fields(member_profile_id = %loan.member_profile_id), err)]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        loan: LoanTransaction,
    ) -> EngineResult<LoanTransaction> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result = Self::create_in(&mut tx, &mut outbox, ctx, loan).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn create_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        loan: LoanTransaction,
    ) -> EngineResult<LoanTransaction> {
        ensure_in_scope(ctx, loan.scope, "Loan")?;
        if loan.released_date.is_some() {
            return Err(LoanError::AlreadyReleased(loan.id).into());
        }
        tx.create(&loan).await.context("create loan", loan.id)?;
        outbox.record("loan_transaction", "create", loan.id, loan.scope, &loan);
        Ok(loan)
    }

    /// Adds a manual voucher leg to an unreleased loan.
    #[instrument(name = "loan.add_entry", skip_all, fields(loan_id = %entry.loan_transaction_id), err)]
    pub async fn add_entry(
        &self,
        ctx: &RequestContext,
        entry: LoanTransactionEntry,
    ) -> EngineResult<LoanTransactionEntry> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::add_entry_in(&mut tx, ctx, entry).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn add_entry_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        entry: LoanTransactionEntry,
    ) -> EngineResult<LoanTransactionEntry> {
        let loan = lock_loan(tx, ctx, entry.loan_transaction_id).await?;
        if loan.released_date.is_some() {
            return Err(LoanError::AlreadyReleased(loan.id).into());
        }
        let entry = LoanTransactionEntry {
            scope: loan.scope,
            ..entry
        };
        tx.create(&entry).await.context("create loan entry", entry.id)?;
        Ok(entry)
    }

    /// Rebuilds the voucher legs and totals of an unreleased loan.
    #[instrument(name = "loan.balance", skip_all, fields(loan_id = %loan_id), err)]
    pub async fn balance(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        cash_account_id: Option<AccountId>,
    ) -> EngineResult<(LoanTransaction, Vec<LoanTransactionEntry>)> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result =
            Self::balance_in(&mut tx, &mut outbox, ctx, loan_id, cash_account_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn balance_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        cash_account_id: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> EngineResult<(LoanTransaction, Vec<LoanTransactionEntry>)> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        if loan.released_date.is_some() {
            return Err(LoanError::AlreadyReleased(loan.id).into());
        }
        let entries = balance_locked(tx, &mut loan, cash_account_id, now).await?;
        outbox.record("loan_transaction", "update", loan.id, loan.scope, &loan);
        Ok((loan, entries))
    }

    /// Stamps the voucher print time; the schedule starts there.
    #[instrument(name = "loan.print", skip_all, fields(loan_id = %loan_id), err)]
    pub async fn print(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<LoanTransaction> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::print_in(&mut tx, &mut outbox, ctx, loan_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn print_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        now: DateTime<Utc>,
    ) -> EngineResult<LoanTransaction> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        if loan.released_date.is_some() {
            return Err(LoanError::AlreadyReleased(loan.id).into());
        }
        loan.printed_date = Some(now);
        loan.updated_at = now;
        tx.update(&loan).await.context("print loan", loan.id)?;
        outbox.record("loan_transaction", "update", loan.id, loan.scope, &loan);
        Ok(loan)
    }

    /// The amortization schedule of a loan.
    pub async fn schedule(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<Vec<SchedulePeriod>> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::schedule_in(&mut tx, ctx, loan_id).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn schedule_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
    ) -> EngineResult<Vec<SchedulePeriod>> {
        let loan: LoanTransaction = tx.find_one(loan_id).await.context("load loan", loan_id)?;
        ensure_in_scope(ctx, loan.scope, "Loan")?;
        // Released loans use the snapshots pinned at release; others use
        // the rules in effect at the print date.
        schedule_of(tx, &loan).await
    }

    /// Releases a printed loan through the actor's open batch.
    ///
    /// Balances the loan, posts every voucher leg to the ledger and pins one
    /// loan account per related account to the rules in effect now. Nothing
    /// is kept when any step fails.
    #[instrument(name = "loan.release", skip_all, fields(loan_id = %loan_id), err)]
    pub async fn release(
        &self,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        cash_account_id: Option<AccountId>,
    ) -> EngineResult<LoanTransaction> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result =
            Self::release_in(&mut tx, &mut outbox, ctx, loan_id, cash_account_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn release_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        loan_id: LoanTransactionId,
        cash_account_id: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> EngineResult<LoanTransaction> {
        let mut loan = lock_loan(tx, ctx, loan_id).await?;
        ensure_releasable(&loan)?;
        let batch = require_open_batch(tx, ctx).await?;
        let entries = balance_locked(tx, &mut loan, cash_account_id, now).await?;

        let mut snapshots: HashMap<AccountId, AccountSnapshot> = HashMap::new();
        for account_id in entries.iter().filter_map(|e| e.account_id) {
            if !snapshots.contains_key(&account_id) {
                let snapshot = snapshot_at(tx, account_id, now).await?;
                snapshots.insert(account_id, snapshot);
            }
        }
        let accounts: Vec<AccountSnapshot> = snapshots.values().cloned().collect();
        let legs = plan_release(&entries, &accounts).context("plan release", loan.id)?;
        for leg in legs {
            let Some(account) = snapshots.get(&leg.account_id).cloned() else {
                return Err(LoanError::MissingAccount(leg.account_id).into());
            };
            let request = PostingRequest {
                scope: loan.scope,
                account,
                member_profile_id: Some(loan.member_profile_id),
                direction: leg.direction,
                amount: leg.amount,
                entry_date: now,
                source: LedgerSource::Loan,
                transaction_batch_id: Some(batch.id),
                transaction_id: None,
                loan_transaction_id: Some(loan.id),
                payment_type_id: None,
                reference_number: loan.voucher.clone(),
                description: leg.name,
                created_by: ctx.actor,
            };
            append(tx, outbox, &request, now).await?;
        }

        Self::pin_loan_accounts(tx, &loan, now).await?;

        loan.released_date = Some(now);
        loan.released_by = Some(ctx.actor);
        loan.transaction_batch_id = Some(batch.id);
        loan.updated_at = now;
        tx.update(&loan).await.context("release loan", loan.id)?;
        outbox.record("loan_transaction", "update", loan.id, loan.scope, &loan);
        info!(loan_id = %loan.id, batch_id = %batch.id, balance = %loan.balance, "Loan released");
        Ok(loan)
    }

    async fn pin_loan_accounts<T: Crud>(
        tx: &mut T,
        loan: &LoanTransaction,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let accounts = tx
            .find(Query::<Account>::in_scope(loan.scope))
            .await
            .context("load accounts", loan.id)?;
        for account in related_accounts(loan, &accounts) {
            let history = pin_history(tx, account, now).await?;
            let amount = if account.rules.account_type == AccountType::Loan {
                loan.balance
            } else {
                Decimal::ZERO
            };
            let loan_account = LoanAccount {
                id: LoanAccountId::new(),
                scope: loan.scope,
                loan_transaction_id: loan.id,
                account_id: account.id,
                account_history_id: history.id,
                amount,
                created_at: now,
            };
            tx.create(&loan_account)
                .await
                .context("create loan account", account.id)?;
        }
        Ok(())
    }
}
