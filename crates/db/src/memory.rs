//! In-memory store.
//!
//! Committed rows live behind one `RwLock`. A unit of work buffers its
//! writes and sees them on top of the committed rows; `commit` applies the
//! buffer in one step. Row and anchor locks are per-key `tokio` mutexes
//! held until the unit of work ends; a mutex nobody holds or waits on is
//! dropped from the lock table on release.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopbank_core::ledger::{GeneralLedgerEntry, LedgerKey};
use coopbank_shared::types::{BranchId, GeneralLedgerId, OrganizationId};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{Crud, LedgerAnchors, Query, Record, Store, UnitOfWork};

type RowKey = (&'static str, Uuid);

#[derive(Debug, Clone)]
struct Row {
    organization_id: OrganizationId,
    branch_id: Option<BranchId>,
    partition: Option<Uuid>,
    payload: serde_json::Value,
}

impl Row {
    fn encode<R: Record>(record: &R) -> StoreResult<Self> {
        Ok(Self {
            organization_id: record.organization_id(),
            branch_id: record.branch_id(),
            partition: record.partition(),
            payload: serde_json::to_value(record)?,
        })
    }

    fn decode<R: Record>(&self) -> StoreResult<R> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

#[derive(Debug, Default)]
struct Tables {
    rows: BTreeMap<RowKey, Row>,
    anchors: HashMap<LedgerKey, GeneralLedgerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Row(&'static str, Uuid),
    Anchor(LedgerKey),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(kind, id) => write!(f, "{kind} {id}"),
            Self::Anchor(key) => write!(f, "ledger anchor {key}"),
        }
    }
}

#[derive(Debug)]
struct Shared {
    committed: RwLock<Tables>,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    lock_timeout: Duration,
}

/// A store keeping every record in process memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates an empty store whose locks give up after `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                committed: RwLock::new(Tables::default()),
                locks: DashMap::new(),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> StoreResult<MemoryUnitOfWork> {
        Ok(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            writes: BTreeMap::new(),
            anchors: HashMap::new(),
            held: HashSet::new(),
            guards: Vec::new(),
        })
    }
}

/// A unit of work on a [`MemoryStore`].
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    /// Buffered writes; `None` marks a delete.
    writes: BTreeMap<RowKey, Option<Row>>,
    anchors: HashMap<LedgerKey, GeneralLedgerId>,
    held: HashSet<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl fmt::Debug for MemoryUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUnitOfWork")
            .field("writes", &self.writes.len())
            .field("locks", &self.held.len())
            .finish_non_exhaustive()
    }
}

impl MemoryUnitOfWork {
    async fn acquire(&mut self, key: LockKey) -> StoreResult<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        let mutex = Arc::clone(
            self.shared
                .locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let acquired = tokio::time::timeout(self.shared.lock_timeout, mutex.lock_owned()).await;
        let Ok(guard) = acquired else {
            self.shared
                .locks
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
            return Err(StoreError::LockTimeout(key.to_string()));
        };
        self.held.insert(key);
        self.guards.push(guard);
        Ok(())
    }

    fn release_locks(&mut self) {
        self.guards.clear();
        for key in self.held.drain() {
            self.shared
                .locks
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }

    async fn load(&self, key: RowKey) -> Option<Row> {
        if let Some(buffered) = self.writes.get(&key) {
            return buffered.clone();
        }
        self.shared.committed.read().await.rows.get(&key).cloned()
    }

    async fn load_record<R: Record>(&self, id: R::Id) -> StoreResult<R> {
        let id: Uuid = id.into();
        self.load((R::KIND, id))
            .await
            .ok_or_else(|| StoreError::not_found(R::KIND, id))?
            .decode()
    }
}

#[async_trait]
impl Crud for MemoryUnitOfWork {
    async fn find<R: Record>(&mut self, query: Query<R>) -> StoreResult<Vec<R>> {
        let committed = self.shared.committed.read().await;
        let mut merged: BTreeMap<Uuid, &Row> = committed
            .rows
            .range((R::KIND, Uuid::nil())..)
            .take_while(|((kind, _), _)| *kind == R::KIND)
            .map(|((_, id), row)| (*id, row))
            .collect();
        for ((kind, id), write) in &self.writes {
            if *kind != R::KIND {
                continue;
            }
            match write {
                Some(row) => {
                    merged.insert(*id, row);
                }
                None => {
                    merged.remove(id);
                }
            }
        }

        let mut found = Vec::new();
        for row in merged.values() {
            if !query.admits(row.organization_id, row.branch_id, row.partition) {
                continue;
            }
            let record: R = row.decode()?;
            if query.accepts(&record) {
                found.push(record);
            }
        }
        Ok(found)
    }

    async fn find_one<R: Record>(&mut self, id: R::Id) -> StoreResult<R> {
        self.load_record(id).await
    }

    async fn find_one_for_update<R: Record>(&mut self, id: R::Id) -> StoreResult<R> {
        self.acquire(LockKey::Row(R::KIND, id.into())).await?;
        self.load_record(id).await
    }

    async fn create<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let key = (R::KIND, record.id().into());
        if self.load(key).await.is_some() {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                id: key.1,
            });
        }
        self.writes.insert(key, Some(Row::encode(record)?));
        Ok(())
    }

    async fn update<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let key = (R::KIND, record.id().into());
        if self.load(key).await.is_none() {
            return Err(StoreError::not_found(R::KIND, key.1));
        }
        self.writes.insert(key, Some(Row::encode(record)?));
        Ok(())
    }

    async fn delete<R: Record>(&mut self, id: R::Id) -> StoreResult<()> {
        let key = (R::KIND, id.into());
        if self.load(key).await.is_none() {
            return Err(StoreError::not_found(R::KIND, key.1));
        }
        self.writes.insert(key, None);
        Ok(())
    }
}

#[async_trait]
impl LedgerAnchors for MemoryUnitOfWork {
    async fn lock_latest_entry(&mut self, key: &LedgerKey) -> StoreResult<Option<GeneralLedgerEntry>> {
        self.acquire(LockKey::Anchor(*key)).await?;
        let latest = match self.anchors.get(key) {
            Some(id) => Some(*id),
            None => self.shared.committed.read().await.anchors.get(key).copied(),
        };
        match latest {
            Some(id) => Ok(Some(self.load_record::<GeneralLedgerEntry>(id).await?)),
            None => Ok(None),
        }
    }

    async fn append_entry(&mut self, entry: &GeneralLedgerEntry) -> StoreResult<()> {
        let key = entry.key();
        self.acquire(LockKey::Anchor(key)).await?;
        self.create(entry).await?;
        self.anchors.insert(key, entry.id);
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> StoreResult<()> {
        let mut committed = self.shared.committed.write().await;
        for (key, write) in std::mem::take(&mut self.writes) {
            match write {
                Some(row) => {
                    committed.rows.insert(key, row);
                }
                None => {
                    committed.rows.remove(&key);
                }
            }
        }
        committed.anchors.extend(self.anchors.drain());
        drop(committed);
        self.release_locks();
        Ok(())
    }

    async fn rollback(mut self) -> StoreResult<()> {
        self.release_locks();
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.release_locks();
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
