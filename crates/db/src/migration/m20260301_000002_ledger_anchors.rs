//! Ledger anchors.
//!
//! One row per balance chain, locked with `SELECT ... FOR UPDATE` before
//! every posting. Rows are inserted on first use.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_ANCHORS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS ledger_anchors CASCADE;")
            .await?;
        Ok(())
    }
}

const LEDGER_ANCHORS_SQL: &str = r"
-- member_key is the nil UUID for coop-level chains
CREATE TABLE ledger_anchors (
    organization_id UUID NOT NULL,
    branch_id UUID NOT NULL,
    account_id UUID NOT NULL,
    member_key UUID NOT NULL,
    latest_entry_id UUID,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (organization_id, branch_id, account_id, member_key)
);
";
