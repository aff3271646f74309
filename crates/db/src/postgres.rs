//! Postgres store on `SeaORM`.
//!
//! Each unit of work is one database transaction with a local
//! `lock_timeout`, so a blocked `FOR UPDATE` surfaces as
//! [`StoreError::LockTimeout`] instead of waiting forever.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use coopbank_core::ledger::{GeneralLedgerEntry, LedgerKey};
use coopbank_shared::types::GeneralLedgerId;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{ledger_anchors, records};
use crate::error::{StoreError, StoreResult};
use crate::store::{Crud, LedgerAnchors, Query, Record, Store, UnitOfWork};

/// A store backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
    lock_timeout: Duration,
}

impl PgStore {
    /// Wraps a connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }

    /// The underlying pool.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> StoreResult<PgUnitOfWork> {
        let txn = self.db.begin().await?;
        let sql = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        txn.execute_unprepared(&sql).await?;
        Ok(PgUnitOfWork { txn })
    }
}

/// A unit of work on a [`PgStore`].
pub struct PgUnitOfWork {
    txn: DatabaseTransaction,
}

impl std::fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgUnitOfWork").finish_non_exhaustive()
    }
}

/// Postgres reports lock timeouts as SQLSTATE 55P03.
fn is_lock_timeout(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("55P03") || message.contains("lock timeout")
}

fn classify(err: DbErr, kind: &'static str, id: Uuid) -> StoreError {
    if is_lock_timeout(&err) {
        return StoreError::LockTimeout(format!("{kind} {id}"));
    }
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict { kind, id },
        _ => StoreError::Backend(err),
    }
}

fn decode<R: Record>(model: records::Model) -> StoreResult<R> {
    Ok(serde_json::from_value(model.payload)?)
}

fn anchor_id(key: &LedgerKey) -> (Uuid, Uuid, Uuid, Uuid) {
    (
        key.scope.organization_id.into_inner(),
        key.scope.branch_id.into_inner(),
        key.account_id.into_inner(),
        key.member_profile_id.map_or(Uuid::nil(), |m| m.into_inner()),
    )
}

#[async_trait]
impl Crud for PgUnitOfWork {
    async fn find<R: Record>(&mut self, query: Query<R>) -> StoreResult<Vec<R>> {
        let mut select = records::Entity::find().filter(records::Column::Kind.eq(R::KIND));
        if let Some(organization_id) = query.organization_id() {
            select = select.filter(records::Column::OrganizationId.eq(organization_id.into_inner()));
        }
        if let Some(branch_id) = query.branch_id() {
            select = select.filter(records::Column::BranchId.eq(branch_id.into_inner()));
        }
        if let Some(partition) = query.partition() {
            select = select.filter(records::Column::PartitionId.eq(partition));
        }

        let models = select
            .order_by_asc(records::Column::Id)
            .all(&self.txn)
            .await?;
        let mut found = Vec::with_capacity(models.len());
        for model in models {
            let record: R = decode(model)?;
            if query.accepts(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }

    async fn find_one<R: Record>(&mut self, id: R::Id) -> StoreResult<R> {
        let id: Uuid = id.into();
        let model = records::Entity::find_by_id((R::KIND.to_string(), id))
            .one(&self.txn)
            .await?
            .ok_or_else(|| StoreError::not_found(R::KIND, id))?;
        decode(model)
    }

    async fn find_one_for_update<R: Record>(&mut self, id: R::Id) -> StoreResult<R> {
        let id: Uuid = id.into();
        let model = records::Entity::find_by_id((R::KIND.to_string(), id))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(|e| classify(e, R::KIND, id))?
            .ok_or_else(|| StoreError::not_found(R::KIND, id))?;
        decode(model)
    }

    async fn create<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let id: Uuid = record.id().into();
        let now = Utc::now();
        let model = records::ActiveModel {
            kind: Set(R::KIND.to_string()),
            id: Set(id),
            organization_id: Set(record.organization_id().into_inner()),
            branch_id: Set(record.branch_id().map(|b| b.into_inner())),
            partition_id: Set(record.partition()),
            payload: Set(serde_json::to_value(record)?),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        model
            .insert(&self.txn)
            .await
            .map_err(|e| classify(e, R::KIND, id))?;
        Ok(())
    }

    async fn update<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let id: Uuid = record.id().into();
        let result = records::Entity::update_many()
            .col_expr(records::Column::Payload, Expr::value(serde_json::to_value(record)?))
            .col_expr(records::Column::PartitionId, Expr::value(record.partition()))
            .col_expr(records::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(records::Column::Kind.eq(R::KIND))
            .filter(records::Column::Id.eq(id))
            .exec(&self.txn)
            .await
            .map_err(|e| classify(e, R::KIND, id))?;
        if result.rows_affected == 0 {
            return Err(StoreError::not_found(R::KIND, id));
        }
        Ok(())
    }

    async fn delete<R: Record>(&mut self, id: R::Id) -> StoreResult<()> {
        let id: Uuid = id.into();
        let result = records::Entity::delete_many()
            .filter(records::Column::Kind.eq(R::KIND))
            .filter(records::Column::Id.eq(id))
            .exec(&self.txn)
            .await
            .map_err(|e| classify(e, R::KIND, id))?;
        if result.rows_affected == 0 {
            return Err(StoreError::not_found(R::KIND, id));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerAnchors for PgUnitOfWork {
    async fn lock_latest_entry(&mut self, key: &LedgerKey) -> StoreResult<Option<GeneralLedgerEntry>> {
        let (organization_id, branch_id, account_id, member_key) = anchor_id(key);
        let fresh = ledger_anchors::ActiveModel {
            organization_id: Set(organization_id),
            branch_id: Set(branch_id),
            account_id: Set(account_id),
            member_key: Set(member_key),
            latest_entry_id: Set(None),
            updated_at: Set(Utc::now().into()),
        };
        ledger_anchors::Entity::insert(fresh)
            .on_conflict(
                OnConflict::columns([
                    ledger_anchors::Column::OrganizationId,
                    ledger_anchors::Column::BranchId,
                    ledger_anchors::Column::AccountId,
                    ledger_anchors::Column::MemberKey,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await?;

        let anchor = ledger_anchors::Entity::find_by_id((organization_id, branch_id, account_id, member_key))
            .lock_exclusive()
            .one(&self.txn)
            .await
            .map_err(|e| {
                if is_lock_timeout(&e) {
                    StoreError::LockTimeout(format!("ledger anchor {key}"))
                } else {
                    StoreError::Backend(e)
                }
            })?
            .ok_or_else(|| StoreError::not_found("ledger_anchor", account_id))?;

        match anchor.latest_entry_id {
            Some(id) => Ok(Some(
                self.find_one::<GeneralLedgerEntry>(GeneralLedgerId::from_uuid(id))
                    .await?,
            )),
            None => Ok(None),
        }
    }

    async fn append_entry(&mut self, entry: &GeneralLedgerEntry) -> StoreResult<()> {
        let (organization_id, branch_id, account_id, member_key) = anchor_id(&entry.key());
        self.create(entry).await?;
        let result = ledger_anchors::Entity::update_many()
            .col_expr(
                ledger_anchors::Column::LatestEntryId,
                Expr::value(entry.id.into_inner()),
            )
            .col_expr(ledger_anchors::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(ledger_anchors::Column::OrganizationId.eq(organization_id))
            .filter(ledger_anchors::Column::BranchId.eq(branch_id))
            .filter(ledger_anchors::Column::AccountId.eq(account_id))
            .filter(ledger_anchors::Column::MemberKey.eq(member_key))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            // The chain was never locked in this unit of work.
            return Err(StoreError::not_found("ledger_anchor", account_id));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> StoreResult<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
