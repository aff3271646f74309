//! Shared types, errors, and configuration for the cooperative ledger engine.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Currency with its day-boundary timezone, and money rounding
//! - Application-wide error taxonomy
//! - Configuration management
//! - Clock abstraction with a "time machine" override
//! - Tracing subscriber initialisation for binaries

pub mod clock;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
