//! `SeaORM` entities.

pub mod ledger_anchors;
pub mod records;
