//! Common types used across the application.

pub mod currency;
pub mod id;
pub mod money;
pub mod scope;

pub use currency::Currency;
pub use id::*;
pub use money::{round_money, MONEY_SCALE};
pub use scope::Scope;
