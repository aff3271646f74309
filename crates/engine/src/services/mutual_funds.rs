//! Mutual fund contributions: generate, print and post.

use chrono::{DateTime, Utc};
use coopbank_core::ledger::LedgerSource;
use coopbank_core::lifecycle::PostRequest;
use coopbank_core::member::MemberProfile;
use coopbank_core::mutual_fund::{
    generate_entries, plan_post, total_amount, Contributor, MutualFund, MutualFundEntry,
    MutualFundError,
};
use coopbank_db::{Crud, Query, Store};
use coopbank_shared::types::MutualFundId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use super::accounts::{ensure_in_scope, snapshot_at};
use super::ledger::{member_chains, post_legs, LegTags};
use super::review::{self, Reviewable};
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineResult, ResultExt};
use crate::events::Outbox;

/// A fund with its contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundContributions {
    /// The fund.
    pub fund: MutualFund,
    /// Contributions, oldest member first.
    pub entries: Vec<MutualFundEntry>,
}

async fn fund_entries<T: Crud>(tx: &mut T, fund: &MutualFund) -> EngineResult<Vec<MutualFundEntry>> {
    tx.find(Query::<MutualFundEntry>::in_scope(fund.scope).within(fund.id))
        .await
        .context("load fund entries", fund.id)
}

/// Mutual fund contributions.
#[derive(Debug, Clone)]
pub struct MutualFundService<S> {
    engine: Engine<S>,
}

impl<S: Store> MutualFundService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Stores a new fund in the caller's branch.
    #[instrument(name = "mutual_fund.create", skip_all, fields(name = %fund.name), err)]
    pub async fn create(&self, ctx: &RequestContext, fund: MutualFund) -> EngineResult<MutualFund> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result = Self::create_in(&mut tx, &mut outbox, ctx, fund).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn create_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        fund: MutualFund,
    ) -> EngineResult<MutualFund> {
        ensure_in_scope(ctx, fund.scope, MutualFund::LABEL)?;
        if fund.amount.is_sign_negative() {
            return Err(MutualFundError::NegativeAmount(fund.amount).into());
        }
        tx.create(&fund).await.context("create fund", fund.id)?;
        outbox.record(MutualFund::ENTITY, "create", fund.id, fund.scope, &fund);
        Ok(fund)
    }

    /// Computes every eligible member's contribution, replacing earlier ones.
    #[instrument(name = "mutual_fund.generate", skip_all, fields(fund_id = %fund_id), err)]
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        fund_id: MutualFundId,
    ) -> EngineResult<FundContributions> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::generate_in(&mut tx, &mut outbox, ctx, fund_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn generate_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        fund_id: MutualFundId,
        now: DateTime<Utc>,
    ) -> EngineResult<FundContributions> {
        let mut fund: MutualFund = review::lock(tx, ctx, fund_id).await?;
        fund.review().ensure_editable()?;
        let account_id = fund.account_id.ok_or(MutualFundError::MissingAccount(fund.id))?;

        let account = snapshot_at(tx, account_id, now).await?;
        let chains = member_chains(tx, &account).await?;
        let members = tx
            .find(Query::<MemberProfile>::in_scope(fund.scope))
            .await
            .context("load members", fund.scope.branch_id)?;
        let contributors: Vec<Contributor<'_>> = members
            .iter()
            .map(|member| Contributor {
                member,
                balance: chains
                    .get(&member.id)
                    .and_then(|chain| chain.last())
                    .map_or(Decimal::ZERO, |e| e.balance),
            })
            .collect();
        let entries = generate_entries(&fund, &contributors)?;

        for old in fund_entries(tx, &fund).await? {
            tx.delete::<MutualFundEntry>(old.id)
                .await
                .context("delete fund entry", old.id)?;
        }
        for entry in &entries {
            tx.create(entry).await.context("create fund entry", entry.id)?;
        }
        fund.total_amount = total_amount(&entries);
        tx.update(&fund).await.context("store fund total", fund.id)?;
        outbox.record(MutualFund::ENTITY, "update", fund.id, fund.scope, &fund);
        info!(
            fund_id = %fund.id,
            contributors = entries.len(),
            total = %fund.total_amount,
            "Mutual fund contributions generated"
        );
        Ok(FundContributions { fund, entries })
    }

    /// A fund with its contributions.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        fund_id: MutualFundId,
    ) -> EngineResult<FundContributions> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::get_in(&mut tx, ctx, fund_id).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn get_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        fund_id: MutualFundId,
    ) -> EngineResult<FundContributions> {
        let fund: MutualFund = tx.find_one(fund_id).await.context("load fund", fund_id)?;
        ensure_in_scope(ctx, fund.scope, MutualFund::LABEL)?;
        let entries = fund_entries(tx, &fund).await?;
        Ok(FundContributions { fund, entries })
    }

    /// Marks a fund printed, freezing its contributions.
    pub async fn print(&self, ctx: &RequestContext, fund_id: MutualFundId) -> EngineResult<MutualFund> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result =
            review::print::<_, MutualFund>(&mut tx, &mut outbox, ctx, fund_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Clears the print stamp of an unposted fund.
    pub async fn undo_print(
        &self,
        ctx: &RequestContext,
        fund_id: MutualFundId,
    ) -> EngineResult<MutualFund> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result = review::undo_print::<_, MutualFund>(&mut tx, &mut outbox, ctx, fund_id).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Debits every contribution of a printed fund from its member.
    #[instrument(name = "mutual_fund.post", skip_all, fields(fund_id = %fund_id), err)]
    pub async fn post(
        &self,
        ctx: &RequestContext,
        fund_id: MutualFundId,
        request: PostRequest,
    ) -> EngineResult<MutualFund> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::post_in(&mut tx, &mut outbox, ctx, fund_id, &request, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn post_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        fund_id: MutualFundId,
        request: &PostRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<MutualFund> {
        let mut fund: MutualFund = review::lock(tx, ctx, fund_id).await?;
        fund.review().ensure_postable()?;
        let entries = fund_entries(tx, &fund).await?;
        let legs = plan_post(&entries, request.post_account_id);
        let reference = request
            .check_voucher_number
            .clone()
            .unwrap_or_else(|| fund.name.clone());
        let description = format!("Mutual fund contribution {}", fund.name);
        let posted = post_legs(
            tx,
            outbox,
            ctx,
            &legs,
            &LegTags {
                source: LedgerSource::MutualContribution,
                reference_number: &reference,
                description: &description,
                entry_date: request.entry_date,
            },
            now,
        )
        .await?;

        fund.review_mut().mark_posted(ctx.actor, now, request)?;
        tx.update(&fund).await.context("post fund", fund.id)?;
        outbox.record(MutualFund::ENTITY, "update", fund.id, fund.scope, &fund);
        info!(fund_id = %fund.id, posted = posted.len(), "Mutual fund posted");
        Ok(fund)
    }
}
