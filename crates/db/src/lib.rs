//! Storage layer for the cooperative ledger engine.
//!
//! This crate provides:
//! - The transactional storage contract (`Store`, `UnitOfWork`, `Crud`, `LedgerAnchors`)
//! - An in-memory store for tests and single-process runs
//! - A Postgres store on `SeaORM`, with its migrations

pub mod entities;
pub mod error;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryUnitOfWork};
pub use postgres::{PgStore, PgUnitOfWork};
pub use store::{Crud, LedgerAnchors, Query, Record, Store, UnitOfWork};

use coopbank_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool sized by `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
