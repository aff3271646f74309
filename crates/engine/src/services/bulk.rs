//! Bulk loan processing.
//!
//! [`LoanProcessor::process_all`] claims every eligible loan of the branch
//! in one unit of work before returning, then hands the claimed loans to a
//! supervised background task. The task works them one at a time with a
//! pause between loans and stops starting new loans once the run's
//! cancellation token fires, either on timeout or on request. Claims of
//! loans it never reached are cleared.

use chrono::{DateTime, Utc};
use coopbank_core::loan::LoanTransaction;
use coopbank_db::{Crud, Store};
use coopbank_shared::types::{BranchId, LoanTransactionId, OrganizationId, Scope};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Instrument};

use super::loans::lock_loan;
use super::processor::LoanProcessor;
use crate::context::RequestContext;
use crate::error::{EngineResult, ResultExt};
use crate::events::Event;

/// Progress after one loan of a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkProgress {
    /// Loans claimed by the run.
    pub total: usize,
    /// Loans attempted so far.
    pub processed: usize,
    /// Run start.
    pub start_time: DateTime<Utc>,
    /// Time of this report.
    pub current_time: DateTime<Utc>,
    /// Loan account of the loan just attempted.
    pub account_name: String,
    /// Borrower of the loan just attempted.
    pub member_name: String,
}

/// Final report of a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    /// Loans attempted.
    pub total_processed: usize,
    /// Attempted loans that failed.
    pub failed: usize,
    /// Run start.
    pub start_time: DateTime<Utc>,
    /// Run end.
    pub end_time: DateTime<Utc>,
    /// Organization processed.
    pub organization_id: OrganizationId,
    /// Branch processed.
    pub branch_id: BranchId,
    /// The run stopped before reaching every loan.
    pub timed_out: bool,
}

/// Messages on a run's progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BulkEvent {
    /// One loan attempted.
    Progress(BulkProgress),
    /// The run ended.
    Completed(BulkSummary),
}

/// Handle on a running bulk run.
#[derive(Debug)]
pub struct BulkRun {
    /// Loans claimed before the run started.
    pub total: usize,
    /// Progress and completion messages.
    pub progress: broadcast::Receiver<BulkEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<BulkSummary>,
}

impl BulkRun {
    /// Stops the run before its next loan.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to end.
    ///
    /// # Errors
    ///
    /// Returns the join error when the worker task panicked or was aborted.
    pub async fn wait(self) -> Result<BulkSummary, tokio::task::JoinError> {
        self.handle.await
    }
}

fn progress_topics(scope: Scope) -> Vec<String> {
    vec![
        format!("loan.process.branch.{}", scope.branch_id),
        format!("loan.process.organization.{}", scope.organization_id),
    ]
}

fn completion_topics(scope: Scope) -> Vec<String> {
    vec![
        format!("loan.process.completed.branch.{}", scope.branch_id),
        format!("loan.process.completed.organization.{}", scope.organization_id),
    ]
}

impl<S: Store> LoanProcessor<S> {
    /// Claims every released, unclaimed loan of the caller's branch and
    /// processes them in the background.
    ///
    /// The claims are committed before this returns, so a concurrent call
    /// finds nothing left to claim.
    #[instrument(name = "loan.process_all", skip_all, fields(branch_id = %ctx.scope.branch_id), err)]
    pub async fn process_all(&self, ctx: &RequestContext) -> EngineResult<BulkRun> {
        let (mut tx, outbox) = self.engine().begin(ctx).await?;
        let now = self.engine().now(ctx);
        let result = Self::claim_all_in(&mut tx, ctx, now).await;
        let claimed = self.engine().finish(ctx, tx, outbox, result).await?;

        let total = claimed.len();
        let settings = self.engine().settings().clone();
        let (sender, progress) = broadcast::channel(settings.channel_capacity.max(1));
        let cancel = CancellationToken::new();

        let timer = cancel.clone();
        let timeout = settings.batch_timeout;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => timer.cancel(),
                () = timer.cancelled() => {}
            }
        });

        let worker = self.clone();
        let ctx = ctx.clone();
        let token = cancel.clone();
        let span = tracing::info_span!("loan.process_all.worker", branch_id = %ctx.scope.branch_id, total);
        let handle = tokio::spawn(
            async move {
                let summary = worker.run_all(&ctx, claimed, &sender, &token, now).await;
                token.cancel();
                summary
            }
            .instrument(span),
        );

        info!(total, "Bulk loan processing started");
        Ok(BulkRun {
            total,
            progress,
            cancel,
            handle,
        })
    }

    async fn claim_all_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<LoanTransactionId>> {
        let eligible = Self::eligible(tx, ctx).await?;
        let mut claimed = Vec::with_capacity(eligible.len());
        for loan in eligible {
            let mut locked: LoanTransaction = lock_loan(tx, ctx, loan.id).await?;
            if locked.processing || locked.released_date.is_none() {
                continue;
            }
            locked.processing = true;
            locked.updated_at = now;
            tx.update(&locked).await.context("claim loan", locked.id)?;
            claimed.push(locked.id);
        }
        Ok(claimed)
    }

    async fn run_all(
        &self,
        ctx: &RequestContext,
        claimed: Vec<LoanTransactionId>,
        sender: &broadcast::Sender<BulkEvent>,
        cancel: &CancellationToken,
        start_time: DateTime<Utc>,
    ) -> BulkSummary {
        let total = claimed.len();
        let delay = self.engine().settings().per_loan_delay;
        let mut processed = 0;
        let mut failed = 0;
        let mut timed_out = false;
        let mut remaining = claimed.into_iter();

        for loan_id in remaining.by_ref() {
            if cancel.is_cancelled() {
                timed_out = true;
                self.release_claim(ctx, loan_id).await;
                break;
            }
            let (account_name, member_name) = match self.run_claimed(ctx, loan_id).await {
                Ok(summary) => (summary.account_name, summary.member_name),
                Err(e) => {
                    warn!(loan_id = %loan_id, error = %e, "Loan processing failed");
                    failed += 1;
                    self.release_claim(ctx, loan_id).await;
                    (String::new(), String::new())
                }
            };
            processed += 1;
            self.report(
                ctx.scope,
                sender,
                BulkEvent::Progress(BulkProgress {
                    total,
                    processed,
                    start_time,
                    current_time: self.engine().now(ctx),
                    account_name,
                    member_name,
                }),
            );
            if processed < total {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => {}
                }
            }
        }
        for loan_id in remaining {
            self.release_claim(ctx, loan_id).await;
        }

        let summary = BulkSummary {
            total_processed: processed,
            failed,
            start_time,
            end_time: self.engine().now(ctx),
            organization_id: ctx.scope.organization_id,
            branch_id: ctx.scope.branch_id,
            timed_out,
        };
        self.report(ctx.scope, sender, BulkEvent::Completed(summary.clone()));
        info!(
            processed = summary.total_processed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "Bulk loan processing finished"
        );
        summary
    }

    fn report(&self, scope: Scope, sender: &broadcast::Sender<BulkEvent>, event: BulkEvent) {
        let topics = match &event {
            BulkEvent::Progress(_) => progress_topics(scope),
            BulkEvent::Completed(_) => completion_topics(scope),
        };
        let payload = match &event {
            BulkEvent::Progress(p) => serde_json::to_value(p),
            BulkEvent::Completed(c) => serde_json::to_value(c),
        };
        match payload {
            Ok(payload) => {
                for topic in topics {
                    self.engine().events().publish(Event {
                        topic,
                        payload: payload.clone(),
                    });
                }
            }
            Err(e) => warn!(error = %e, "Dropping unserializable progress event"),
        }
        let _ = sender.send(event);
    }
}
