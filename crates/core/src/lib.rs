//! Core business logic for the cooperative ledger.
//!
//! This crate contains pure business logic with ZERO storage or web dependencies.
//! Every computation takes already-loaded records and returns what to persist.
//!
//! # Modules
//!
//! - `account` - Account rules and their time-keyed history
//! - `ledger` - Balance chains and posting validation
//! - `member` - Members and membership-type history
//! - `loan` - Amortization, balancing, release and accrual plans
//! - `batch` - Teller batch reconciliation
//! - `savings` - Savings interest generation
//! - `mutual_fund` - Mutual fund contributions
//! - `payment` - Teller payment rules
//! - `lifecycle` - Print and post stamps of generated sets

pub mod account;
pub mod batch;
pub mod ledger;
pub mod lifecycle;
pub mod loan;
pub mod member;
pub mod mutual_fund;
pub mod payment;
pub mod savings;
