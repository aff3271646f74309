//! Coopbank loan processing worker.
//!
//! Usage:
//!   coopbank-worker <organization-id> <branch-id> <actor-id>
//!
//! Claims every released loan of the branch, posts the accruals of elapsed
//! periods and logs progress until the run completes or times out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{info, warn};
use uuid::Uuid;

use coopbank_db::{PgStore, connect};
use coopbank_engine::services::BulkEvent;
use coopbank_engine::{Engine, EngineSettings, RequestContext};
use coopbank_shared::types::{BranchId, OrganizationId, Scope, UserId};
use coopbank_shared::{AppConfig, SystemClock, telemetry};

fn parse_id(name: &str, value: Option<String>) -> anyhow::Result<Uuid> {
    let Some(value) = value else {
        bail!("missing {name}; usage: coopbank-worker <organization-id> <branch-id> <actor-id>");
    };
    Uuid::parse_str(&value).with_context(|| format!("invalid {name} '{value}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    let mut args = std::env::args().skip(1);
    let organization_id = OrganizationId::from_uuid(parse_id("organization id", args.next())?);
    let branch_id = BranchId::from_uuid(parse_id("branch id", args.next())?);
    let actor = UserId::from_uuid(parse_id("actor id", args.next())?);
    let ctx = RequestContext::new(actor, Scope::new(organization_id, branch_id));

    let db = connect(&config.database).await?;
    info!("Connected to database");
    let store = PgStore::new(db, Duration::from_millis(config.store.lock_timeout_ms));
    let engine = Engine::new(store, Arc::new(SystemClock), EngineSettings::from_config(&config));

    let mut run = engine.processor().process_all(&ctx).await?;
    info!(total = run.total, "Processing claimed loans");

    loop {
        match run.progress.recv().await {
            Ok(BulkEvent::Progress(progress)) => info!(
                processed = progress.processed,
                total = progress.total,
                member = %progress.member_name,
                account = %progress.account_name,
                "Loan processed"
            ),
            Ok(BulkEvent::Completed(_)) => break,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress reporting fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    let summary = run.wait().await?;
    info!(
        processed = summary.total_processed,
        failed = summary.failed,
        timed_out = summary.timed_out,
        "Run finished"
    );
    Ok(())
}
