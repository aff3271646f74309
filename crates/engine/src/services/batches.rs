//! Teller batch service: opening, funding, remittance lines, reconciliation
//! and close.

use chrono::{DateTime, Utc};
use coopbank_core::batch::{
    close_batch, reconcile, BatchFunding, BatchLines, BatchTotals, CashCount, CheckRemittance,
    DisbursementTransaction, OnlineRemittance, ReconciliationError, TransactionBatch,
};
use coopbank_core::ledger::GeneralLedgerEntry;
use coopbank_db::{Crud, Query, Record, Store};
use coopbank_shared::types::{
    BatchFundingId, CashCountId, CheckRemittanceId, DisbursementTransactionId, OnlineRemittanceId,
    TransactionBatchId,
};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use super::accounts::ensure_in_scope;
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::Outbox;

/// The actor's open batch in the caller's branch.
pub(crate) async fn open_batch<T: Crud>(
    tx: &mut T,
    ctx: &RequestContext,
) -> EngineResult<Option<TransactionBatch>> {
    let actor = ctx.actor;
    tx.find_first(
        Query::<TransactionBatch>::in_scope(ctx.scope)
            .filter(move |b| b.employee_user_id == actor && !b.is_closed),
    )
    .await
    .context("find open batch", actor)
}

/// The actor's open batch, locked until the unit of work ends, failing when
/// the actor has none.
///
/// Closing reconciles under the same row lock, so an entry tagged with the
/// batch is either counted by the close or rejected here.
pub(crate) async fn require_open_batch<T: Crud>(
    tx: &mut T,
    ctx: &RequestContext,
) -> EngineResult<TransactionBatch> {
    let candidate = open_batch(tx, ctx).await?.ok_or(EngineError::NoOpenBatch)?;
    let batch: TransactionBatch = tx
        .find_one_for_update(candidate.id)
        .await
        .context("lock batch", candidate.id)?;
    if batch.is_closed {
        return Err(EngineError::NoOpenBatch);
    }
    Ok(batch)
}

/// Recomputes and stores the totals of a locked batch.
async fn reconcile_locked<T: Crud>(
    tx: &mut T,
    batch: &mut TransactionBatch,
    now: DateTime<Utc>,
) -> EngineResult<BatchTotals> {
    let batch_id = batch.id;
    let ledger = tx
        .find(
            Query::<GeneralLedgerEntry>::in_scope(batch.scope)
                .filter(move |e| e.transaction_batch_id == Some(batch_id)),
        )
        .await
        .context("load batch entries", batch_id)?;
    let fundings: Vec<BatchFunding> = lines(tx, batch).await?;
    let cash_counts: Vec<CashCount> = lines(tx, batch).await?;
    let checks: Vec<CheckRemittance> = lines(tx, batch).await?;
    let online: Vec<OnlineRemittance> = lines(tx, batch).await?;
    let disbursements: Vec<DisbursementTransaction> = lines(tx, batch).await?;

    let totals = reconcile(
        batch,
        BatchLines {
            ledger: &ledger,
            fundings: &fundings,
            cash_counts: &cash_counts,
            checks: &checks,
            online: &online,
            disbursements: &disbursements,
        },
    )?;
    totals.apply(batch, now);
    tx.update(&*batch).await.context("store batch totals", batch_id)?;
    Ok(totals)
}

async fn lines<T: Crud, R: Record>(tx: &mut T, batch: &TransactionBatch) -> EngineResult<Vec<R>> {
    tx.find(Query::<R>::in_scope(batch.scope).within(batch.id))
        .await
        .context("load batch lines", batch.id)
}

async fn lock_batch<T: Crud>(
    tx: &mut T,
    ctx: &RequestContext,
    batch_id: TransactionBatchId,
) -> EngineResult<TransactionBatch> {
    let batch: TransactionBatch = tx
        .find_one_for_update(batch_id)
        .await
        .context("lock batch", batch_id)?;
    ensure_in_scope(ctx, batch.scope, "Transaction batch")?;
    Ok(batch)
}

/// A batch line bound to its batch once the batch is known.
pub trait BatchLine: Record {
    /// Binds the line to `batch`, giving it a fresh id.
    fn bind(self, batch: &TransactionBatch) -> Self;
}

macro_rules! batch_line {
    ($ty:ty, $id:ty) => {
        impl BatchLine for $ty {
            fn bind(mut self, batch: &TransactionBatch) -> Self {
                self.id = <$id>::new();
                self.scope = batch.scope;
                self.transaction_batch_id = batch.id;
                self
            }
        }
    };
}

batch_line!(BatchFunding, BatchFundingId);
batch_line!(CashCount, CashCountId);
batch_line!(CheckRemittance, CheckRemittanceId);
batch_line!(OnlineRemittance, OnlineRemittanceId);
batch_line!(DisbursementTransaction, DisbursementTransactionId);

/// Teller sessions.
#[derive(Debug, Clone)]
pub struct BatchService<S> {
    engine: Engine<S>,
}

impl<S: Store> BatchService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Opens a batch for the actor. A teller has at most one open batch.
    #[instrument(name = "batch.open", skip_all, fields(actor = %ctx.actor), err)]
    pub async fn open(&self, ctx: &RequestContext) -> EngineResult<TransactionBatch> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::open_in(&mut tx, &mut outbox, ctx, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn open_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> EngineResult<TransactionBatch> {
        if let Some(existing) = open_batch(tx, ctx).await? {
            return Err(EngineError::Validation(format!(
                "Teller already has open batch {}",
                existing.id
            )));
        }
        let batch = TransactionBatch::open(ctx.scope, ctx.actor, now);
        tx.create(&batch).await.context("create batch", batch.id)?;
        outbox.record("transaction_batch", "create", batch.id, batch.scope, &batch);
        info!(batch_id = %batch.id, "Transaction batch opened");
        Ok(batch)
    }

    /// The actor's open batch, if any.
    pub async fn current(&self, ctx: &RequestContext) -> EngineResult<Option<TransactionBatch>> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = open_batch(&mut tx, ctx).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    /// Adds a line to an open batch and re-reconciles it.
    #[instrument(name = "batch.add_line", skip_all, fields(batch_id = %batch_id, kind = L::KIND), err)]
    pub async fn add_line<L: BatchLine>(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        line: L,
    ) -> EngineResult<TransactionBatch> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::add_line_in(&mut tx, &mut outbox, ctx, batch_id, line, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn add_line_in<L: BatchLine>(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        line: L,
        now: DateTime<Utc>,
    ) -> EngineResult<TransactionBatch> {
        let mut batch = lock_batch(tx, ctx, batch_id).await?;
        if batch.is_closed {
            return Err(ReconciliationError::BatchClosed(batch.id).into());
        }
        let line = line.bind(&batch);
        tx.create(&line).await.context("create batch line", batch_id)?;
        reconcile_locked(tx, &mut batch, now).await?;
        outbox.record("transaction_batch", "update", batch.id, batch.scope, &batch);
        Ok(batch)
    }

    /// Adds cash handed to the teller at the start of the session.
    pub async fn add_funding(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        name: impl Into<String>,
    ) -> EngineResult<TransactionBatch> {
        let line = BatchFunding {
            id: BatchFundingId::new(),
            scope: ctx.scope,
            transaction_batch_id: batch_id,
            amount,
            name: name.into(),
        };
        self.add_line(ctx, batch_id, line).await
    }

    /// Adds a denomination count.
    pub async fn add_cash_count(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        quantity: u32,
    ) -> EngineResult<TransactionBatch> {
        let line = CashCount {
            id: CashCountId::new(),
            scope: ctx.scope,
            transaction_batch_id: batch_id,
            amount,
            quantity,
        };
        self.add_line(ctx, batch_id, line).await
    }

    /// Adds a check remitted with the batch.
    pub async fn add_check_remittance(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        reference_number: impl Into<String>,
    ) -> EngineResult<TransactionBatch> {
        let line = CheckRemittance {
            id: CheckRemittanceId::new(),
            scope: ctx.scope,
            transaction_batch_id: batch_id,
            amount,
            reference_number: reference_number.into(),
        };
        self.add_line(ctx, batch_id, line).await
    }

    /// Adds an online remittance.
    pub async fn add_online_remittance(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        reference_number: impl Into<String>,
    ) -> EngineResult<TransactionBatch> {
        let line = OnlineRemittance {
            id: OnlineRemittanceId::new(),
            scope: ctx.scope,
            transaction_batch_id: batch_id,
            amount,
            reference_number: reference_number.into(),
        };
        self.add_line(ctx, batch_id, line).await
    }

    /// Adds a petty-cash disbursement.
    pub async fn add_disbursement(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> EngineResult<TransactionBatch> {
        let line = DisbursementTransaction {
            id: DisbursementTransactionId::new(),
            scope: ctx.scope,
            transaction_batch_id: batch_id,
            amount,
            description: description.into(),
        };
        self.add_line(ctx, batch_id, line).await
    }

    /// Records cash deposited in the bank during the session.
    #[instrument(name = "batch.deposit_in_bank", skip_all, fields(batch_id = %batch_id), err)]
    pub async fn set_deposit_in_bank(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
    ) -> EngineResult<TransactionBatch> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result =
            Self::set_deposit_in_bank_in(&mut tx, &mut outbox, ctx, batch_id, amount, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn set_deposit_in_bank_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> EngineResult<TransactionBatch> {
        if amount < Decimal::ZERO {
            return Err(EngineError::Validation(
                "Deposit in bank cannot be negative".to_string(),
            ));
        }
        let mut batch = lock_batch(tx, ctx, batch_id).await?;
        batch.deposit_in_bank = amount;
        reconcile_locked(tx, &mut batch, now).await?;
        outbox.record("transaction_batch", "update", batch.id, batch.scope, &batch);
        Ok(batch)
    }

    /// Recomputes every derived figure of a batch from its rows.
    #[instrument(name = "batch.reconcile", skip_all, fields(batch_id = %batch_id), err)]
    pub async fn reconcile(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
    ) -> EngineResult<(TransactionBatch, BatchTotals)> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::reconcile_in(&mut tx, &mut outbox, ctx, batch_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn reconcile_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        now: DateTime<Utc>,
    ) -> EngineResult<(TransactionBatch, BatchTotals)> {
        let mut batch = lock_batch(tx, ctx, batch_id).await?;
        let totals = reconcile_locked(tx, &mut batch, now).await?;
        outbox.record("transaction_batch", "update", batch.id, batch.scope, &batch);
        Ok((batch, totals))
    }

    /// Reconciles one last time and closes the batch. Only its teller may.
    #[instrument(name = "batch.close", skip_all, fields(batch_id = %batch_id), err)]
    pub async fn close(
        &self,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
    ) -> EngineResult<TransactionBatch> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::close_in(&mut tx, &mut outbox, ctx, batch_id, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn close_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        batch_id: TransactionBatchId,
        now: DateTime<Utc>,
    ) -> EngineResult<TransactionBatch> {
        let mut batch = lock_batch(tx, ctx, batch_id).await?;
        reconcile_locked(tx, &mut batch, now).await?;
        close_batch(&mut batch, ctx.actor, now)?;
        tx.update(&batch).await.context("close batch", batch_id)?;
        outbox.record("transaction_batch", "update", batch.id, batch.scope, &batch);
        info!(batch_id = %batch.id, variance = %batch.variance, "Transaction batch closed");
        Ok(batch)
    }
}
