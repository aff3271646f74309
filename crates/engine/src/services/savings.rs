//! Savings interest runs: generate, override, print and post.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coopbank_core::account::{Account, AccountSnapshot, AccountType};
use coopbank_core::ledger::{GeneralLedgerEntry, LedgerSource};
use coopbank_core::lifecycle::{PostRequest, ReviewState};
use coopbank_core::member::{MemberProfile, MemberTypeHistory};
use coopbank_core::savings::{
    generate_entry, override_entry, plan_post, select_reference, BrowseReference,
    GeneratedSavingsInterest, GeneratedSavingsInterestEntry, MemberLedger, SavingsComputationType,
    SavingsParams, SavingsTotals,
};
use coopbank_db::{Crud, Query, Store};
use coopbank_shared::types::{
    AccountId, GeneratedSavingsInterestEntryId, GeneratedSavingsInterestId, MemberProfileId,
    MemberTypeId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::accounts::ensure_in_scope;
use super::ledger::{member_chains, post_legs, LegTags};
use super::review::{self, Reviewable};
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::Outbox;

/// Parameters of a new run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsRunRequest {
    /// Document number.
    pub document_no: String,
    /// Window start.
    pub last_computation_date: DateTime<Utc>,
    /// Window end, exclusive.
    pub new_computation_date: DateTime<Utc>,
    /// Restrict to one savings account.
    pub account_id: Option<AccountId>,
    /// Restrict to one member type.
    pub member_type_id: Option<MemberTypeId>,
    /// Interest base.
    pub computation_type: SavingsComputationType,
    /// Withholding tax in percent.
    pub interest_tax_rate: Decimal,
}

/// A run with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavingsRun {
    /// The run.
    pub run: GeneratedSavingsInterest,
    /// Its entries, in generation order.
    pub entries: Vec<GeneratedSavingsInterestEntry>,
}

async fn run_entries<T: Crud>(
    tx: &mut T,
    run: &GeneratedSavingsInterest,
) -> EngineResult<Vec<GeneratedSavingsInterestEntry>> {
    tx.find(Query::<GeneratedSavingsInterestEntry>::in_scope(run.scope).within(run.id))
        .await
        .context("load savings entries", run.id)
}

/// Generates and stores the entries of `run`.
async fn fill_entries<T: Crud>(
    tx: &mut T,
    run: &GeneratedSavingsInterest,
    annual_divisor: Decimal,
) -> EngineResult<Vec<GeneratedSavingsInterestEntry>> {
    let params = SavingsParams::for_run(run, annual_divisor)?;
    let scope = run.scope;

    let only_account = run.account_id;
    let accounts = tx
        .find(Query::<Account>::in_scope(scope).filter(move |a| {
            a.rules.account_type == AccountType::Deposit && only_account.is_none_or(|id| id == a.id)
        }))
        .await
        .context("load savings accounts", scope.branch_id)?;
    let references = tx
        .find(Query::<BrowseReference>::in_scope(scope))
        .await
        .context("load rate schemes", scope.branch_id)?;
    let only_type = run.member_type_id;
    let members = tx
        .find(
            Query::<MemberProfile>::in_scope(scope)
                .filter(move |m| only_type.is_none_or(|t| m.member_type_id == Some(t))),
        )
        .await
        .context("load members", scope.branch_id)?;
    let mut histories: HashMap<MemberProfileId, Vec<MemberTypeHistory>> = HashMap::new();
    for history in tx
        .find(Query::<MemberTypeHistory>::in_scope(scope))
        .await
        .context("load member type history", scope.branch_id)?
    {
        histories.entry(history.member_profile_id).or_default().push(history);
    }

    let no_entries: Vec<GeneralLedgerEntry> = Vec::new();
    let no_histories: Vec<MemberTypeHistory> = Vec::new();
    let mut generated = Vec::new();
    for account in &accounts {
        let chains = member_chains(tx, &AccountSnapshot::from(account)).await?;
        for member in &members {
            let Some(reference) = select_reference(&references, account.id, member.member_type_id)
            else {
                continue;
            };
            let entries = chains.get(&member.id).unwrap_or(&no_entries);
            if entries.is_empty() {
                continue;
            }
            let ledger = MemberLedger {
                member,
                account,
                entries,
                histories: histories.get(&member.id).unwrap_or(&no_histories),
            };
            if let Some(entry) = generate_entry(run, reference, ledger, &params)? {
                tx.create(&entry).await.context("create savings entry", entry.id)?;
                debug!(
                    member_profile_id = %member.id,
                    account_id = %account.id,
                    interest = %entry.interest_amount,
                    tax = %entry.interest_tax,
                    "Savings interest generated"
                );
                generated.push(entry);
            }
        }
    }
    Ok(generated)
}

/// Savings interest runs.
#[derive(Debug, Clone)]
pub struct SavingsService<S> {
    engine: Engine<S>,
}

impl<S: Store> SavingsService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Creates a run and generates its entries. No ledger entry is written.
    #[instrument(name = "savings.generate", skip_all, fields(document_no = %request.document_no), err)]
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        request: SavingsRunRequest,
    ) -> EngineResult<SavingsRun> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let divisor = self.engine.settings().annual_divisor;
        let result = Self::generate_in(&mut tx, &mut outbox, ctx, request, divisor, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn generate_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        request: SavingsRunRequest,
        divisor: Decimal,
        now: DateTime<Utc>,
    ) -> EngineResult<SavingsRun> {
        let mut run = GeneratedSavingsInterest {
            id: GeneratedSavingsInterestId::new(),
            scope: ctx.scope,
            document_no: request.document_no,
            last_computation_date: request.last_computation_date,
            new_computation_date: request.new_computation_date,
            account_id: request.account_id,
            member_type_id: request.member_type_id,
            computation_type: request.computation_type,
            interest_tax_rate: request.interest_tax_rate,
            total_interest: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            review: ReviewState::default(),
            created_by: ctx.actor,
            created_at: now,
        };
        tx.create(&run).await.context("create savings run", run.id)?;
        let entries = fill_entries(tx, &run, divisor).await?;
        SavingsTotals::of(&entries).apply(&mut run);
        tx.update(&run).await.context("store savings totals", run.id)?;
        outbox.record(GeneratedSavingsInterest::ENTITY, "create", run.id, run.scope, &run);
        info!(
            run_id = %run.id,
            entries = entries.len(),
            total_interest = %run.total_interest,
            "Savings interest run generated"
        );
        Ok(SavingsRun { run, entries })
    }

    /// Replaces the entries of an unprinted run.
    #[instrument(name = "savings.regenerate", skip_all, fields(run_id = %run_id), err)]
    pub async fn regenerate(
        &self,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
    ) -> EngineResult<SavingsRun> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let divisor = self.engine.settings().annual_divisor;
        let result = Self::regenerate_in(&mut tx, &mut outbox, ctx, run_id, divisor).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn regenerate_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
        divisor: Decimal,
    ) -> EngineResult<SavingsRun> {
        let mut run: GeneratedSavingsInterest = review::lock(tx, ctx, run_id).await?;
        run.review().ensure_editable()?;
        for entry in run_entries(tx, &run).await? {
            tx.delete::<GeneratedSavingsInterestEntry>(entry.id)
                .await
                .context("delete savings entry", entry.id)?;
        }
        let entries = fill_entries(tx, &run, divisor).await?;
        SavingsTotals::of(&entries).apply(&mut run);
        tx.update(&run).await.context("store savings totals", run.id)?;
        outbox.record(GeneratedSavingsInterest::ENTITY, "update", run.id, run.scope, &run);
        Ok(SavingsRun { run, entries })
    }

    /// Overrides the interest and tax of one entry of an unprinted run.
    #[instrument(name = "savings.override", skip_all, fields(entry_id = %entry_id), err)]
    pub async fn override_entry(
        &self,
        ctx: &RequestContext,
        entry_id: GeneratedSavingsInterestEntryId,
        interest: Decimal,
        tax: Decimal,
    ) -> EngineResult<SavingsRun> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result =
            Self::override_in(&mut tx, &mut outbox, ctx, entry_id, interest, tax).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn override_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        entry_id: GeneratedSavingsInterestEntryId,
        interest: Decimal,
        tax: Decimal,
    ) -> EngineResult<SavingsRun> {
        if tax < Decimal::ZERO {
            return Err(EngineError::Validation("Interest tax cannot be negative".to_string()));
        }
        let mut entry: GeneratedSavingsInterestEntry = tx
            .find_one_for_update(entry_id)
            .await
            .context("lock savings entry", entry_id)?;
        let mut run: GeneratedSavingsInterest =
            review::lock(tx, ctx, entry.generated_savings_interest_id).await?;
        run.review().ensure_editable()?;

        let last_balance = entry.ending_balance - entry.interest_amount + entry.interest_tax;
        override_entry(&mut entry, interest, tax, last_balance);
        tx.update(&entry).await.context("override savings entry", entry.id)?;

        let entries = run_entries(tx, &run).await?;
        SavingsTotals::of(&entries).apply(&mut run);
        tx.update(&run).await.context("store savings totals", run.id)?;
        outbox.record(GeneratedSavingsInterest::ENTITY, "update", run.id, run.scope, &run);
        Ok(SavingsRun { run, entries })
    }

    /// A run with its entries.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
    ) -> EngineResult<SavingsRun> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::get_in(&mut tx, ctx, run_id).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn get_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
    ) -> EngineResult<SavingsRun> {
        let run: GeneratedSavingsInterest =
            tx.find_one(run_id).await.context("load savings run", run_id)?;
        ensure_in_scope(ctx, run.scope, GeneratedSavingsInterest::LABEL)?;
        let entries = run_entries(tx, &run).await?;
        Ok(SavingsRun { run, entries })
    }

    /// Marks a run printed, freezing its entries.
    pub async fn print(
        &self,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
    ) -> EngineResult<GeneratedSavingsInterest> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result =
            review::print::<_, GeneratedSavingsInterest>(&mut tx, &mut outbox, ctx, run_id, now)
                .await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Clears the print stamp of an unposted run.
    pub async fn undo_print(
        &self,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
    ) -> EngineResult<GeneratedSavingsInterest> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result =
            review::undo_print::<_, GeneratedSavingsInterest>(&mut tx, &mut outbox, ctx, run_id)
                .await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Posts the net interest of every entry of a printed run to the
    /// member ledgers.
    #[instrument(name = "savings.post", skip_all, fields(run_id = %run_id), err)]
    pub async fn post(
        &self,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
        request: PostRequest,
    ) -> EngineResult<GeneratedSavingsInterest> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::post_in(&mut tx, &mut outbox, ctx, run_id, &request, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn post_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        run_id: GeneratedSavingsInterestId,
        request: &PostRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<GeneratedSavingsInterest> {
        let mut run: GeneratedSavingsInterest = review::lock(tx, ctx, run_id).await?;
        run.review().ensure_postable()?;
        let entries = run_entries(tx, &run).await?;
        let legs = plan_post(&entries, request.post_account_id);
        let reference = request
            .check_voucher_number
            .clone()
            .unwrap_or_else(|| run.document_no.clone());
        let description = format!("Savings interest {}", run.document_no);
        let posted = post_legs(
            tx,
            outbox,
            ctx,
            &legs,
            &LegTags {
                source: LedgerSource::SavingsInterest,
                reference_number: &reference,
                description: &description,
                entry_date: request.entry_date,
            },
            now,
        )
        .await?;

        SavingsTotals::of(&entries).apply(&mut run);
        run.review_mut().mark_posted(ctx.actor, now, request)?;
        tx.update(&run).await.context("post savings run", run.id)?;
        outbox.record(GeneratedSavingsInterest::ENTITY, "update", run.id, run.scope, &run);
        info!(run_id = %run.id, posted = posted.len(), "Savings interest run posted");
        Ok(run)
    }
}
