//! Clock abstraction.
//!
//! Operations never read the system time directly. They ask a [`Clock`],
//! which is either the wall clock or a fixed instant (the "time machine"
//! override an operator can set to simulate processing at another date).

use chrono::{DateTime, Utc};

/// Source of "now".
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolves "now" for a request: the override when present, else the clock.
#[must_use]
pub fn effective_now(clock: &dyn Clock, time_machine: Option<DateTime<Utc>>) -> DateTime<Utc> {
    time_machine.unwrap_or_else(|| clock.now())
}
