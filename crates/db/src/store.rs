//! The transactional storage contract.
//!
//! Services open a [`UnitOfWork`] from a [`Store`], read and write records
//! through [`Crud`], serialize balance chains through [`LedgerAnchors`],
//! and finish with `commit` or `rollback`. Dropping a unit of work without
//! committing discards its writes and releases its locks.

use std::fmt;

use async_trait::async_trait;
use coopbank_core::ledger::{GeneralLedgerEntry, LedgerKey};
use coopbank_shared::types::{BranchId, OrganizationId, Scope};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::StoreResult;

/// A persisted domain type.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable name of the record type, used as the table discriminator.
    const KIND: &'static str;

    /// Typed identifier.
    type Id: Copy + Into<Uuid> + fmt::Display + Send + Sync + 'static;

    /// The record's id.
    fn id(&self) -> Self::Id;

    /// Owning organization.
    fn organization_id(&self) -> OrganizationId;

    /// Owning branch, `None` for organization-wide records.
    fn branch_id(&self) -> Option<BranchId>;

    /// Parent the record is usually listed under (its loan, batch, run...).
    fn partition(&self) -> Option<Uuid> {
        None
    }
}

type Filter<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

/// Selection of records of one kind.
///
/// Organization, branch and partition are pushed down to the backend; the
/// filter closure runs on decoded records. Results come back in id order,
/// which for time-ordered ids is creation order.
pub struct Query<R> {
    organization_id: Option<OrganizationId>,
    branch_id: Option<BranchId>,
    partition: Option<Uuid>,
    filter: Option<Filter<R>>,
}

impl<R: Record> Query<R> {
    /// Every record of the kind.
    #[must_use]
    pub fn all() -> Self {
        Self {
            organization_id: None,
            branch_id: None,
            partition: None,
            filter: None,
        }
    }

    /// Records of one organization branch.
    #[must_use]
    pub fn in_scope(scope: Scope) -> Self {
        Self {
            organization_id: Some(scope.organization_id),
            branch_id: Some(scope.branch_id),
            ..Self::all()
        }
    }

    /// Records of one organization, any branch.
    #[must_use]
    pub fn in_organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id: Some(organization_id),
            ..Self::all()
        }
    }

    /// Narrows to children of one parent.
    #[must_use]
    pub fn within(mut self, partition: impl Into<Uuid>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Adds a predicate on decoded records. Later calls replace earlier ones.
    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Organization pushed down to the backend.
    #[must_use]
    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }

    /// Branch pushed down to the backend.
    #[must_use]
    pub fn branch_id(&self) -> Option<BranchId> {
        self.branch_id
    }

    /// Partition pushed down to the backend.
    #[must_use]
    pub fn partition(&self) -> Option<Uuid> {
        self.partition
    }

    /// True when stored row metadata passes the pushed-down conditions.
    #[must_use]
    pub fn admits(
        &self,
        organization_id: OrganizationId,
        branch_id: Option<BranchId>,
        partition: Option<Uuid>,
    ) -> bool {
        self.organization_id.is_none_or(|o| o == organization_id)
            && self.branch_id.is_none_or(|b| Some(b) == branch_id)
            && self.partition.is_none_or(|p| Some(p) == partition)
    }

    /// True when a decoded record passes the filter.
    #[must_use]
    pub fn accepts(&self, record: &R) -> bool {
        self.filter.as_ref().is_none_or(|f| f(record))
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("organization_id", &self.organization_id)
            .field("branch_id", &self.branch_id)
            .field("partition", &self.partition)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Generic record access inside a unit of work.
#[async_trait]
pub trait Crud: Send {
    /// Records matching `query`, in id order.
    async fn find<R: Record>(&mut self, query: Query<R>) -> StoreResult<Vec<R>>;

    /// One record by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when absent.
    async fn find_one<R: Record>(&mut self, id: R::Id) -> StoreResult<R>;

    /// One record by id, locked until the unit of work ends.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when absent and
    /// `StoreError::LockTimeout` when another unit of work holds the row.
    async fn find_one_for_update<R: Record>(&mut self, id: R::Id) -> StoreResult<R>;

    /// Inserts a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` when the id is taken.
    async fn create<R: Record>(&mut self, record: &R) -> StoreResult<()>;

    /// Replaces a stored record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when absent.
    async fn update<R: Record>(&mut self, record: &R) -> StoreResult<()>;

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when absent.
    async fn delete<R: Record>(&mut self, id: R::Id) -> StoreResult<()>;

    /// First record matching `query`, if any.
    async fn find_first<R: Record>(&mut self, query: Query<R>) -> StoreResult<Option<R>> {
        Ok(self.find(query).await?.into_iter().next())
    }
}

/// The serialization point of the ledger: one anchor per balance chain.
#[async_trait]
pub trait LedgerAnchors: Send {
    /// Locks the chain's anchor and returns its latest entry.
    ///
    /// The anchor is created on first use, so the very first posting to a
    /// chain is serialized like every later one.
    async fn lock_latest_entry(&mut self, key: &LedgerKey) -> StoreResult<Option<GeneralLedgerEntry>>;

    /// Stores `entry` and makes it the chain's latest.
    async fn append_entry(&mut self, entry: &GeneralLedgerEntry) -> StoreResult<()>;
}

/// One atomic unit of work.
#[async_trait]
pub trait UnitOfWork: Crud + LedgerAnchors {
    /// Makes every write visible and releases every lock.
    async fn commit(self) -> StoreResult<()>;

    /// Discards every write and releases every lock.
    async fn rollback(self) -> StoreResult<()>;
}

/// A storage backend.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    /// Unit of work type.
    type Tx: UnitOfWork + 'static;

    /// Opens a unit of work.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}
