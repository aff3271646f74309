//! Origin-scoped abuse guard using Moka.
//!
//! Failures are counted per network origin in a cache whose entries expire
//! `window` after their last update. Reaching `max_failures` moves the
//! origin into a second cache that blocks it for `block`.

use std::time::Duration;

use coopbank_shared::config::AbuseGuardConfig;
use moka::future::Cache;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Counts failures per origin and blocks noisy origins.
#[derive(Clone)]
pub struct AbuseGuard {
    failures: Cache<String, u32>,
    blocked: Cache<String, ()>,
    max_failures: u32,
}

impl AbuseGuard {
    /// Creates a guard from configuration.
    #[must_use]
    pub fn new(config: &AbuseGuardConfig) -> Self {
        let failures = Cache::builder()
            .max_capacity(config.max_origins)
            .time_to_live(Duration::from_secs(config.window_secs))
            .build();
        let blocked = Cache::builder()
            .max_capacity(config.max_origins)
            .time_to_live(Duration::from_secs(config.block_secs))
            .build();
        Self {
            failures,
            blocked,
            max_failures: config.max_failures.max(1),
        }
    }

    /// Refuses blocked origins. Requests without an origin always pass.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::OriginBlocked`.
    pub async fn check(&self, origin: Option<&str>) -> EngineResult<()> {
        let Some(origin) = origin else {
            return Ok(());
        };
        if self.blocked.contains_key(origin) {
            return Err(EngineError::OriginBlocked(origin.to_string()));
        }
        Ok(())
    }

    /// Counts one failure from `origin`, blocking it at the threshold.
    pub async fn record_failure(&self, origin: Option<&str>) {
        let Some(origin) = origin else {
            return;
        };
        let count = self
            .failures
            .entry(origin.to_string())
            .and_upsert_with(|existing| {
                let next = existing.map_or(1, |e| e.into_value().saturating_add(1));
                std::future::ready(next)
            })
            .await
            .into_value();
        if count >= self.max_failures {
            warn!(origin, failures = count, "Blocking origin after repeated failures");
            self.blocked.insert(origin.to_string(), ()).await;
            self.failures.invalidate(origin).await;
        }
    }

    /// Failures counted for `origin` in the current window.
    pub async fn failures(&self, origin: &str) -> u32 {
        self.failures.get(origin).await.unwrap_or(0)
    }
}

impl std::fmt::Debug for AbuseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbuseGuard")
            .field("max_failures", &self.max_failures)
            .finish_non_exhaustive()
    }
}
