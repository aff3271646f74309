//! Print and undo-print of generated sets awaiting review.

use chrono::{DateTime, Utc};
use coopbank_core::lifecycle::ReviewState;
use coopbank_core::mutual_fund::MutualFund;
use coopbank_core::savings::GeneratedSavingsInterest;
use coopbank_db::{Crud, Record};
use coopbank_shared::types::Scope;
use tracing::info;

use super::accounts::ensure_in_scope;
use crate::context::RequestContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::Outbox;

/// A generated set moving through generated, printed and posted.
pub(crate) trait Reviewable: Record {
    /// Event entity name.
    const ENTITY: &'static str;
    /// Name used in authorization errors.
    const LABEL: &'static str;

    fn scope(&self) -> Scope;
    fn review(&self) -> &ReviewState;
    fn review_mut(&mut self) -> &mut ReviewState;
}

impl Reviewable for GeneratedSavingsInterest {
    const ENTITY: &'static str = "generated_savings_interest";
    const LABEL: &'static str = "Savings interest run";

    fn scope(&self) -> Scope {
        self.scope
    }

    fn review(&self) -> &ReviewState {
        &self.review
    }

    fn review_mut(&mut self) -> &mut ReviewState {
        &mut self.review
    }
}

impl Reviewable for MutualFund {
    const ENTITY: &'static str = "mutual_fund";
    const LABEL: &'static str = "Mutual fund";

    fn scope(&self) -> Scope {
        self.scope
    }

    fn review(&self) -> &ReviewState {
        &self.review
    }

    fn review_mut(&mut self) -> &mut ReviewState {
        &mut self.review
    }
}

/// Locks a reviewable record of the caller's branch.
pub(crate) async fn lock<T: Crud, R: Reviewable>(
    tx: &mut T,
    ctx: &RequestContext,
    id: R::Id,
) -> EngineResult<R> {
    let record: R = tx.find_one_for_update(id).await.context("lock", id)?;
    ensure_in_scope(ctx, record.scope(), R::LABEL)?;
    Ok(record)
}

/// Stamps the print of a generated set.
pub(crate) async fn print<T: Crud, R: Reviewable>(
    tx: &mut T,
    outbox: &mut Outbox,
    ctx: &RequestContext,
    id: R::Id,
    now: DateTime<Utc>,
) -> EngineResult<R> {
    let mut record: R = lock(tx, ctx, id).await?;
    record.review_mut().print(ctx.actor, now)?;
    tx.update(&record).await.context("print", id)?;
    outbox.record(R::ENTITY, "update", id, record.scope(), &record);
    info!(entity = R::ENTITY, id = %id, "Printed");
    Ok(record)
}

/// Clears the print stamp of an unposted set.
pub(crate) async fn undo_print<T: Crud, R: Reviewable>(
    tx: &mut T,
    outbox: &mut Outbox,
    ctx: &RequestContext,
    id: R::Id,
) -> EngineResult<R> {
    let mut record: R = lock(tx, ctx, id).await?;
    record.review_mut().undo_print()?;
    tx.update(&record).await.context("undo print", id)?;
    outbox.record(R::ENTITY, "update", id, record.scope(), &record);
    Ok(record)
}
