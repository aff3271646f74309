//! Transactional engine of the cooperative ledger.
//!
//! Wires the pure rules of `coopbank-core` to a `coopbank-db` store: every
//! operation locks what it reads, validates, writes and commits as one unit
//! of work, then publishes change events.
//!
//! # Modules
//!
//! - `engine` - The shared root and its settings
//! - `context` - Actor, branch and time machine of a request
//! - `services` - Ledger, loan, batch, savings, mutual fund and payment services
//! - `events` - Outbox and broadcast event bus
//! - `guard` - Origin-scoped abuse guard
//! - `error` - Engine errors and their classification

pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod services;

pub use context::RequestContext;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{Event, EventBus};
