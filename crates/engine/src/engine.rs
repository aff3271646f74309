//! The engine root: store, clock, event bus, abuse guard and settings,
//! shared by every service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coopbank_db::{Store, UnitOfWork};
use coopbank_shared::clock::effective_now;
use coopbank_shared::config::{AbuseGuardConfig, AppConfig};
use coopbank_shared::Clock;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult, ErrorKind, ResultExt};
use crate::events::{Event, EventBus, Outbox};
use crate::guard::AbuseGuard;
use crate::services::{
    AccountService, BatchService, LedgerService, LoanProcessor, LoanService, MutualFundService,
    PaymentService, SavingsService,
};

/// Tunables of an engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Pause between two loans of a bulk run.
    pub per_loan_delay: Duration,
    /// Wall-clock budget of one bulk run.
    pub batch_timeout: Duration,
    /// Buffer of the event bus and of each bulk progress channel.
    pub channel_capacity: usize,
    /// Days per year for savings interest.
    pub annual_divisor: Decimal,
    /// Abuse guard thresholds.
    pub abuse_guard: AbuseGuardConfig,
}

impl EngineSettings {
    /// Settings from the loaded application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            per_loan_delay: Duration::from_millis(config.processing.per_loan_delay_ms),
            batch_timeout: Duration::from_secs(config.processing.batch_timeout_secs),
            channel_capacity: config.processing.progress_channel_capacity,
            annual_divisor: Decimal::from(config.savings.annual_divisor),
            abuse_guard: config.abuse_guard.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            per_loan_delay: Duration::from_millis(500),
            batch_timeout: Duration::from_secs(7200),
            channel_capacity: 256,
            annual_divisor: Decimal::from(360),
            abuse_guard: AbuseGuardConfig::default(),
        }
    }
}

struct Inner<S> {
    store: S,
    clock: Arc<dyn Clock>,
    events: EventBus,
    guard: AbuseGuard,
    settings: EngineSettings,
}

/// Entry point to the services. Cheap to clone.
pub struct Engine<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Engine<S> {
    /// Builds an engine over `store`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        let events = EventBus::new(settings.channel_capacity);
        let guard = AbuseGuard::new(&settings.abuse_guard);
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                events,
                guard,
                settings,
            }),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribes to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// The abuse guard.
    #[must_use]
    pub fn guard(&self) -> &AbuseGuard {
        &self.inner.guard
    }

    /// "Now" for a request, honouring its time machine.
    #[must_use]
    pub fn now(&self, ctx: &RequestContext) -> DateTime<Utc> {
        effective_now(self.inner.clock.as_ref(), ctx.time_machine)
    }

    /// Account rules and their history.
    #[must_use]
    pub fn accounts(&self) -> AccountService<S> {
        AccountService::new(self.clone())
    }

    /// Direct ledger postings and balance queries.
    #[must_use]
    pub fn ledger(&self) -> LedgerService<S> {
        LedgerService::new(self.clone())
    }

    /// Loan balancing, schedule and release.
    #[must_use]
    pub fn loans(&self) -> LoanService<S> {
        LoanService::new(self.clone())
    }

    /// Loan processing, single and bulk.
    #[must_use]
    pub fn processor(&self) -> LoanProcessor<S> {
        LoanProcessor::new(self.clone())
    }

    /// Teller batches and their reconciliation.
    #[must_use]
    pub fn batches(&self) -> BatchService<S> {
        BatchService::new(self.clone())
    }

    /// Savings interest runs.
    #[must_use]
    pub fn savings(&self) -> SavingsService<S> {
        SavingsService::new(self.clone())
    }

    /// Mutual fund contributions.
    #[must_use]
    pub fn mutual_funds(&self) -> MutualFundService<S> {
        MutualFundService::new(self.clone())
    }

    /// Teller deposits, withdrawals and payments.
    #[must_use]
    pub fn payments(&self) -> PaymentService<S> {
        PaymentService::new(self.clone())
    }

    /// Opens a unit of work for `ctx`, refusing blocked origins.
    pub(crate) async fn begin(&self, ctx: &RequestContext) -> EngineResult<(S::Tx, Outbox)> {
        self.inner.guard.check(ctx.origin.as_deref()).await?;
        let tx = self.inner.store.begin().await.context("begin", ctx.scope.branch_id)?;
        Ok((tx, Outbox::default()))
    }

    /// Commits on success and publishes the outbox; rolls back on failure.
    pub(crate) async fn finish<T>(
        &self,
        ctx: &RequestContext,
        tx: S::Tx,
        outbox: Outbox,
        result: EngineResult<T>,
    ) -> EngineResult<T> {
        match result {
            Ok(value) => match tx.commit().await.context("commit", ctx.scope.branch_id) {
                Ok(()) => {
                    self.inner.events.publish_all(outbox);
                    Ok(value)
                }
                Err(err) => Err(self.failed(ctx, err).await),
            },
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    error!(error = %e, "Rollback failed");
                }
                Err(self.failed(ctx, err).await)
            }
        }
    }

    async fn failed(&self, ctx: &RequestContext, err: EngineError) -> EngineError {
        match err.kind() {
            ErrorKind::Persistence => {
                error!(error = %err, code = err.error_code(), actor = %ctx.actor, "Operation failed");
            }
            ErrorKind::Conflict => {
                warn!(error = %err, "Operation lost a lock race");
            }
            ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::Authorization
            | ErrorKind::BusinessRule => {
                warn!(error = %err, code = err.error_code(), "Operation rejected");
            }
        }
        self.inner.guard.record_failure(ctx.origin.as_deref()).await;
        err
    }
}
