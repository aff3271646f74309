//! Account service: accounts and the snapshot history of their rules.

use chrono::{DateTime, Utc};
use coopbank_core::account::{latest_at, Account, AccountHistory, AccountRules, AccountSnapshot};
use coopbank_db::{Crud, Query, Store};
use coopbank_shared::types::{AccountId, Currency, Scope};
use tracing::{info, instrument};

use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::Outbox;

/// Fields of a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Currency and day-boundary timezone.
    pub currency: Currency,
    /// Rule set.
    pub rules: AccountRules,
}

/// Refuses records outside the caller's branch.
pub(crate) fn ensure_in_scope(
    ctx: &RequestContext,
    scope: Scope,
    what: &'static str,
) -> EngineResult<()> {
    if scope == ctx.scope {
        Ok(())
    } else {
        Err(EngineError::Forbidden(what))
    }
}

/// The rules of `account_id` in effect at `at`: the latest history
/// snapshot at or before `at`, else the live account.
pub(crate) async fn snapshot_at<T: Crud>(
    tx: &mut T,
    account_id: AccountId,
    at: DateTime<Utc>,
) -> EngineResult<AccountSnapshot> {
    let account: Account = tx.find_one(account_id).await.context("load account", account_id)?;
    let histories = tx
        .find(Query::<AccountHistory>::in_scope(account.scope).within(account_id))
        .await
        .context("load account history", account_id)?;
    Ok(latest_at(&histories, at).map_or_else(|| AccountSnapshot::from(&account), AccountHistory::snapshot))
}

/// The history snapshot in effect at `at`, captured now when the account
/// has none yet.
pub(crate) async fn pin_history<T: Crud>(
    tx: &mut T,
    account: &Account,
    at: DateTime<Utc>,
) -> EngineResult<AccountHistory> {
    let histories = tx
        .find(Query::<AccountHistory>::in_scope(account.scope).within(account.id))
        .await
        .context("load account history", account.id)?;
    if let Some(history) = latest_at(&histories, at) {
        return Ok(history.clone());
    }
    let history = AccountHistory::capture(account, at);
    tx.create(&history).await.context("capture account history", account.id)?;
    Ok(history)
}

/// Creates accounts and changes their rules by appending history.
#[derive(Debug, Clone)]
pub struct AccountService<S> {
    engine: Engine<S>,
}

impl<S: Store> AccountService<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Creates an account in the caller's branch with its first snapshot.
    #[instrument(name = "account.create", skip_all, fields(name = %input.name), err)]
    pub async fn create(&self, ctx: &RequestContext, input: NewAccount) -> EngineResult<Account> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let result = Self::create_in(&mut tx, &mut outbox, ctx, input, self.engine.now(ctx)).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn create_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        input: NewAccount,
        now: DateTime<Utc>,
    ) -> EngineResult<Account> {
        if input.name.trim().is_empty() {
            return Err(EngineError::Validation("Account name is required".to_string()));
        }
        let account = Account {
            id: AccountId::new(),
            scope: ctx.scope,
            name: input.name,
            currency: input.currency,
            rules: input.rules,
            created_at: now,
            updated_at: now,
        };
        tx.create(&account).await.context("create account", account.id)?;
        let history = AccountHistory::capture(&account, now);
        tx.create(&history).await.context("capture account history", account.id)?;
        outbox.record("account", "create", account.id, account.scope, &account);
        info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Replaces the rules of an account. Earlier snapshots stay untouched;
    /// the new rules apply from now on.
    #[instrument(name = "account.update_rules", skip_all, fields(account_id = %account_id), err)]
    pub async fn update_rules(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        rules: AccountRules,
    ) -> EngineResult<Account> {
        let (mut tx, mut outbox) = self.engine.begin(ctx).await?;
        let now = self.engine.now(ctx);
        let result = Self::update_rules_in(&mut tx, &mut outbox, ctx, account_id, rules, now).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn update_rules_in(
        tx: &mut S::Tx,
        outbox: &mut Outbox,
        ctx: &RequestContext,
        account_id: AccountId,
        rules: AccountRules,
        now: DateTime<Utc>,
    ) -> EngineResult<Account> {
        let mut account: Account = tx
            .find_one_for_update(account_id)
            .await
            .context("lock account", account_id)?;
        ensure_in_scope(ctx, account.scope, "Account")?;
        account.rules = rules;
        account.updated_at = now;
        tx.update(&account).await.context("update account", account_id)?;
        let history = AccountHistory::capture(&account, now);
        tx.create(&history).await.context("capture account history", account_id)?;
        outbox.record("account", "update", account.id, account.scope, &account);
        info!(account_id = %account.id, "Account rules changed");
        Ok(account)
    }

    /// The rules of an account in effect at `at`.
    pub async fn snapshot_at(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> EngineResult<AccountSnapshot> {
        let (mut tx, outbox) = self.engine.begin(ctx).await?;
        let result = Self::snapshot_in(&mut tx, ctx, account_id, at).await;
        self.engine.finish(ctx, tx, outbox, result).await
    }

    async fn snapshot_in(
        tx: &mut S::Tx,
        ctx: &RequestContext,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> EngineResult<AccountSnapshot> {
        let snapshot = snapshot_at(tx, account_id, at).await?;
        ensure_in_scope(ctx, snapshot.scope, "Account")?;
        Ok(snapshot)
    }
}
