//! The caller context every operation runs under.

use chrono::{DateTime, Utc};
use coopbank_shared::types::{Scope, UserId};

/// An authenticated actor working in one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// The acting user.
    pub actor: UserId,
    /// Organization and branch the actor works in.
    pub scope: Scope,
    /// Simulated "now", overriding the engine clock.
    pub time_machine: Option<DateTime<Utc>>,
    /// Network origin, used by the abuse guard.
    pub origin: Option<String>,
}

impl RequestContext {
    /// A context without time machine or origin.
    #[must_use]
    pub fn new(actor: UserId, scope: Scope) -> Self {
        Self {
            actor,
            scope,
            time_machine: None,
            origin: None,
        }
    }

    /// Sets the simulated "now".
    #[must_use]
    pub fn at(mut self, time_machine: DateTime<Utc>) -> Self {
        self.time_machine = Some(time_machine);
        self
    }

    /// Sets the network origin.
    #[must_use]
    pub fn from_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}
