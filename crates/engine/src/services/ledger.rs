//! Ledger posting service.
//!
//! [`append`] is the only writer of ledger entries: it locks the chain's
//! anchor, validates the posting against the locked latest entry and
//! appends the next entry. Every other service posts through it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coopbank_core::account::AccountSnapshot;
use coopbank_core::ledger::{
    daily_ending_balances, prepare_entry, replay, DailyBalance, EntryDirection, GeneralLedgerEntry,
    LedgerKey, LedgerSource, PostingRequest,
};
use coopbank_core::lifecycle::PostLeg;
use coopbank_db::{Crud, LedgerAnchors, Query, Store};
use coopbank_shared::types::{
    AccountId, LoanTransactionId, MemberProfileId, TransactionBatchId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::accounts::{ensure_in_scope, snapshot_at};
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineResult, ResultExt};
use crate::events::Outbox;

/// Appends the next entry of a chain inside an open unit of work.
pub(crate) async fn append<T: Crud + LedgerAnchors>(
    tx: &mut T,
    outbox: &mut Outbox,
    request: &PostingRequest,
    now: DateTime<Utc>,
) -> EngineResult<GeneralLedgerEntry> {
    let key = request.key();
    let latest = tx
        .lock_latest_entry(&key)
        .await
        .context("lock ledger anchor", key)?;
    let entry = prepare_entry(request, latest.as_ref(), now).context("prepare entry", key)?;
    tx.append_entry(&entry).await.context("append entry", key)?;
    debug!(
        entry_id = %entry.id,
        chain = %key,
        balance = %entry.balance,
        seq = entry.seq,
        "Ledger entry appended"
    );
    outbox.record("general_ledger", "create", entry.id, entry.scope, &entry);
    Ok(entry)
}

/// All entries of one chain, in sequence order.
pub(crate) async fn chain<T: Crud>(tx: &mut T, key: LedgerKey) -> EngineResult<Vec<GeneralLedgerEntry>> {
    let member = key.member_profile_id;
    let mut entries = tx
        .find(
            Query::<GeneralLedgerEntry>::in_scope(key.scope)
                .within(key.account_id)
                .filter(move |e| e.member_profile_id == member),
        )
        .await
        .context("load ledger chain", key)?;
    entries.sort_by_key(|e| e.seq);
    Ok(entries)
}

/// Member chains of one account, keyed by member.
pub(crate) async fn member_chains<T: Crud>(
    tx: &mut T,
    snapshot: &AccountSnapshot,
) -> EngineResult<HashMap<MemberProfileId, Vec<GeneralLedgerEntry>>> {
    let entries = tx
        .find(Query::<GeneralLedgerEntry>::in_scope(snapshot.scope).within(snapshot.account_id))
        .await
        .context("load ledger entries", snapshot.account_id)?;
    let mut chains: HashMap<MemberProfileId, Vec<GeneralLedgerEntry>> = HashMap::new();
    for entry in entries {
        if let Some(member) = entry.member_profile_id {
            chains.entry(member).or_default().push(entry);
        }
    }
    for entries in chains.values_mut() {
        entries.sort_by_key(|e| e.seq);
    }
    Ok(chains)
}

/// Labels shared by the legs of one posting run.
pub(crate) struct LegTags<'a> {
    pub source: LedgerSource,
    pub reference_number: &'a str,
    pub description: &'a str,
    pub entry_date: DateTime<Utc>,
}

/// Posts generated legs, resolving each account's rules at the entry date.
pub(crate) async fn post_legs<T: Crud + LedgerAnchors>(
    tx: &mut T,
    outbox: &mut Outbox,
    ctx: &RequestContext,
    legs: &[PostLeg],
    tags: &LegTags<'_>,
    now: DateTime<Utc>,
) -> EngineResult<Vec<GeneralLedgerEntry>> {
    let mut snapshots: HashMap<AccountId, AccountSnapshot> = HashMap::new();
    let mut posted = Vec::with_capacity(legs.len());
    for leg in legs {
        let account = match snapshots.get(&leg.account_id) {
            Some(snapshot) => snapshot.clone(),
            None => {
                let snapshot = snapshot_at(tx, leg.account_id, tags.entry_date).await?;
                snapshots.insert(leg.account_id, snapshot.clone());
                snapshot
            }
        };
        let request = PostingRequest {
            scope: ctx.scope,
            account,
            member_profile_id: leg.member_profile_id,
            direction: leg.direction,
            amount: leg.amount,
            entry_date: tags.entry_date,
            source: tags.source,
            transaction_batch_id: None,
            transaction_id: None,
            loan_transaction_id: None,
            payment_type_id: None,
            reference_number: tags.reference_number.to_string(),
            description: tags.description.to_string(),
            created_by: ctx.actor,
        };
        posted.push(append(tx, outbox, &request, now).await?);
    }
    Ok(posted)
}

/// A direct posting to one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    /// Account posted to.
    pub account_id: AccountId,
    /// Member, ignored for coop-level accounts.
    pub member_profile_id: Option<MemberProfileId>,
    /// Debit or credit.
    pub direction: EntryDirection,
    /// Positive amount.
    pub amount: Decimal,
    /// Business date, defaults to now.
    pub entry_date: Option<DateTime<Utc>>,
    /// Origin of the entry.
    pub source: LedgerSource,
    /// Teller batch, if any.
    pub transaction_batch_id: Option<TransactionBatchId>,
    /// Loan, if any.
    pub loan_transaction_id: Option<LoanTransactionId>,
    /// Voucher or receipt number.
    pub reference_number: String,
    /// Free text.
    pub description: String,
}

/// Direct postings and balance queries.
#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    engine: Engine<S>,
}

impl<S: Store> LedgerService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Posts one entry using the account rules in effect at its entry date.
    #[instrument(
        name = "ledger.post",
        skip_all,
        fields(account_id = %request.account_id, amount = %request.amount),
        err
    )]
    pub async fn post(
        &self,
        ctx: &RequestContext,
        request: EntryRequest,
    ) -> EngineResult<GeneralLedgerEntry> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::post_in(&mut tx, &mut outbox, ctx, request, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn post_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        request: EntryRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<GeneralLedgerEntry> {
        let entry_date = request.entry_date.unwrap_or(now);
        let account = snapshot_at(tx, request.account_id, entry_date).await?;
        let posting = PostingRequest {
            scope: ctx.scope,
            account,
            member_profile_id: request.member_profile_id,
            direction: request.direction,
            amount: request.amount,
            entry_date,
            source: request.source,
            transaction_batch_id: request.transaction_batch_id,
            transaction_id: None,
            loan_transaction_id: request.loan_transaction_id,
            payment_type_id: None,
            reference_number: request.reference_number,
            description: request.description,
            created_by: ctx.actor,
        };
        let entry = append(tx, outbox, &posting, now).await?;
        info!(entry_id = %entry.id, balance = %entry.balance, "Entry posted");
        Ok(entry)
    }

    /// Current balance of a chain; zero when it has no entry.
    pub async fn balance(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        member_profile_id: Option<MemberProfileId>,
    ) -> EngineResult<Decimal> {
        let entries = self.entries(ctx, account_id, member_profile_id).await?;
        Ok(entries.last().map_or(Decimal::ZERO, |e| e.balance))
    }

    /// Every entry of a chain, in sequence order.
    pub async fn entries(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        member_profile_id: Option<MemberProfileId>,
    ) -> EngineResult<Vec<GeneralLedgerEntry>> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::chain_in(&mut tx, ctx, account_id, member_profile_id, now)
            .await
            .map(|(_, entries)| entries);
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Day-by-day ending balances of a chain, in the account's timezone.
    pub async fn daily_balances(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        member_profile_id: Option<MemberProfileId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> EngineResult<Vec<DailyBalance>> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::chain_in(&mut tx, ctx, account_id, member_profile_id, to)
            .await
            .map(|(account, entries)| daily_ending_balances(&entries, &account.currency, from, to));
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Replays a chain and returns its balance, failing on the first entry
    /// whose stored balance disagrees with the replay.
    pub async fn verify_chain(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        member_profile_id: Option<MemberProfileId>,
    ) -> EngineResult<Decimal> {
        let entries = self.entries(ctx, account_id, member_profile_id).await?;
        Ok(replay(&entries)?)
    }

    async fn chain_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        account_id: AccountId,
        member_profile_id: Option<MemberProfileId>,
        at: DateTime<Utc>,
    ) -> EngineResult<(AccountSnapshot, Vec<GeneralLedgerEntry>)> {
        let account = snapshot_at(tx, account_id, at).await?;
        ensure_in_scope(ctx, account.scope, "Account")?;
        let key = LedgerKey::new(
            ctx.scope,
            account_id,
            account.rules.account_type,
            member_profile_id,
        );
        let entries = chain(tx, key).await?;
        Ok((account, entries))
    }
}
