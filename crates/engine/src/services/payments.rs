//! Teller deposits, withdrawals and payments.

use chrono::{DateTime, Utc};
use coopbank_core::ledger::{GeneralLedgerEntry, LedgerKey};
use coopbank_core::member::MemberProfile;
use coopbank_core::payment::{
    effective_member, plan_payment, PaymentContext, PaymentRequest, PaymentType, TellerSetting,
    TellerTransaction,
};
use coopbank_db::{Crud, LedgerAnchors, Query, Store};
use coopbank_shared::types::TransactionId;
use serde::Serialize;
use tracing::{info, instrument};

use super::accounts::{ensure_in_scope, snapshot_at};
use super::batches::require_open_batch;
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::Outbox;

/// What a posted payment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    /// The appended ledger entry.
    pub entry: GeneralLedgerEntry,
    /// The transaction header after this payment.
    pub transaction: TellerTransaction,
    /// Reference printed on the receipt.
    pub reference_number: String,
}

/// A transaction header with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    /// The header.
    pub transaction: TellerTransaction,
    /// Entries posted under it, in posting order.
    pub entries: Vec<GeneralLedgerEntry>,
}

/// Draws the next receipt number from the actor's series.
async fn next_receipt<T: Crud>(tx: &mut T, ctx: &RequestContext) -> EngineResult<String> {
    let actor = ctx.actor;
    let setting = tx
        .find_first(Query::<TellerSetting>::in_scope(ctx.scope).filter(move |s| s.user_id == actor))
        .await
        .context("find teller setting", actor)?
        .ok_or_else(|| {
            EngineError::Validation("No official receipt series for the current teller".to_string())
        })?;
    let mut setting: TellerSetting = tx
        .find_one_for_update(setting.id)
        .await
        .context("lock teller setting", setting.id)?;
    let number = setting.issue_receipt()?;
    tx.update(&setting).await.context("store receipt number", setting.id)?;
    Ok(number.to_string())
}

/// Teller window postings.
#[derive(Debug, Clone)]
pub struct PaymentService<S> {
    engine: Engine<S>,
}

impl<S: Store> PaymentService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Posts one deposit, withdrawal or payment into the actor's open batch.
    ///
    /// A negative amount swaps deposit and withdrawal. The entry joins the
    /// named transaction header, or opens a new one.
    #[instrument(
        name = "payment.post",
        skip_all,
        fields(account_id = %request.account_id, amount = %request.amount),
        err
    )]
    pub async fn post(
        &self,
        ctx: &RequestContext,
        request: PaymentRequest,
    ) -> EngineResult<PaymentReceipt> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::post_in(&mut tx, &mut outbox, ctx, request, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn post_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        mut request: PaymentRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<PaymentReceipt> {
        let batch = require_open_batch(tx, ctx).await?;
        let entry_date = request.entry_date.unwrap_or(now);
        let account = snapshot_at(tx, request.account_id, entry_date).await?;
        ensure_in_scope(ctx, account.scope, "Account")?;

        let payment_type: PaymentType = tx
            .find_one(request.payment_type_id)
            .await
            .context("load payment type", request.payment_type_id)?;
        let member = match request.member_profile_id {
            Some(id) => Some(
                tx.find_one::<MemberProfile>(id)
                    .await
                    .context("load member", id)?,
            ),
            None => None,
        };
        let header = match request.transaction_id {
            Some(id) => Some(
                tx.find_one_for_update::<TellerTransaction>(id)
                    .await
                    .context("lock transaction", id)?,
            ),
            None => None,
        };

        let key = LedgerKey::new(
            ctx.scope,
            account.account_id,
            account.rules.account_type,
            effective_member(&request, header.as_ref()),
        );
        let latest = tx
            .lock_latest_entry(&key)
            .await
            .context("lock ledger anchor", key)?;

        if request.or_auto_generated && header.is_none() {
            request.reference_number = next_receipt(tx, ctx).await?;
        }

        let plan = plan_payment(
            &request,
            PaymentContext {
                scope: ctx.scope,
                actor: ctx.actor,
                batch: &batch,
                account: &account,
                payment_type: &payment_type,
                member: member.as_ref(),
                header: header.as_ref(),
                latest: latest.as_ref(),
                now,
            },
        )?;

        tx.append_entry(&plan.entry)
            .await
            .context("append entry", key)?;
        outbox.record("general_ledger", "create", plan.entry.id, plan.entry.scope, &plan.entry);
        if plan.header_is_new {
            tx.create(&plan.header)
                .await
                .context("create transaction", plan.header.id)?;
            outbox.record("transaction", "create", plan.header.id, plan.header.scope, &plan.header);
        } else {
            tx.update(&plan.header)
                .await
                .context("update transaction", plan.header.id)?;
            outbox.record("transaction", "update", plan.header.id, plan.header.scope, &plan.header);
        }

        info!(
            entry_id = %plan.entry.id,
            transaction_id = %plan.header.id,
            source = ?plan.source,
            balance = %plan.entry.balance,
            "Payment posted"
        );
        Ok(PaymentReceipt {
            reference_number: plan.entry.reference_number.clone(),
            entry: plan.entry,
            transaction: plan.header,
        })
    }

    /// A transaction header with the entries posted under it.
    pub async fn transaction(
        &self,
        ctx: &RequestContext,
        transaction_id: TransactionId,
    ) -> EngineResult<TransactionDetail> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::transaction_in(&mut tx, ctx, transaction_id).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn transaction_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        transaction_id: TransactionId,
    ) -> EngineResult<TransactionDetail> {
        let transaction: TellerTransaction = tx
            .find_one(transaction_id)
            .await
            .context("load transaction", transaction_id)?;
        ensure_in_scope(ctx, transaction.scope, "Transaction")?;
        let mut entries = tx
            .find(
                Query::<GeneralLedgerEntry>::in_scope(transaction.scope)
                    .filter(move |e| e.transaction_id == Some(transaction_id)),
            )
            .await
            .context("load transaction entries", transaction_id)?;
        entries.sort_by_key(|e| (e.created_at, e.seq));
        Ok(TransactionDetail {
            transaction,
            entries,
        })
    }
}
