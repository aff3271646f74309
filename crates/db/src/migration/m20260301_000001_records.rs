//! Records table.
//!
//! Every domain record is one JSONB payload keyed by `(kind, id)`. Tenancy
//! and parent ids are lifted into columns so listings filter in SQL.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TABLE
        // ============================================================
        db.execute_unprepared(RECORDS_SQL).await?;

        // ============================================================
        // PART 2: LISTING INDEXES
        // ============================================================
        db.execute_unprepared(RECORDS_INDEXES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS records CASCADE;")
            .await?;
        Ok(())
    }
}

const RECORDS_SQL: &str = r"
CREATE TABLE records (
    kind VARCHAR(64) NOT NULL,
    id UUID NOT NULL,
    organization_id UUID NOT NULL,
    branch_id UUID,
    partition_id UUID,
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (kind, id),
    CONSTRAINT chk_payload_object CHECK (jsonb_typeof(payload) = 'object')
);
";

const RECORDS_INDEXES_SQL: &str = r"
CREATE INDEX idx_records_scope ON records (kind, organization_id, branch_id, id);
CREATE INDEX idx_records_partition ON records (kind, partition_id, id)
    WHERE partition_id IS NOT NULL;
";
