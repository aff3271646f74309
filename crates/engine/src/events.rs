//! Change events.
//!
//! Services record events in an [`Outbox`] while their unit of work is open;
//! the engine publishes the outbox on the [`EventBus`] only after commit, so
//! a rolled-back operation publishes nothing.

use std::fmt::Display;

use coopbank_shared::types::Scope;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// One published event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Topic string, e.g. `general_ledger.create.branch.<id>`.
    pub topic: String,
    /// The resource or progress payload.
    pub payload: serde_json::Value,
}

/// The entity-level, per-id, per-branch and per-organization topics of a change.
#[must_use]
pub fn entity_topics(entity: &str, action: &str, id: impl Display, scope: Scope) -> Vec<String> {
    vec![
        format!("{entity}.{action}"),
        format!("{entity}.{action}.{id}"),
        format!("{entity}.{action}.branch.{}", scope.branch_id),
        format!("{entity}.{action}.organization.{}", scope.organization_id),
    ]
}

/// Events waiting for their unit of work to commit.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<Event>,
}

impl Outbox {
    /// Records a change of `resource` on all of its topics.
    pub fn record<T: Serialize>(
        &mut self,
        entity: &str,
        action: &str,
        id: impl Display,
        scope: Scope,
        resource: &T,
    ) {
        self.push(entity_topics(entity, action, id, scope), resource);
    }

    /// Records `payload` on each of `topics`.
    pub fn push<T: Serialize>(&mut self, topics: Vec<String>, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping event with unserializable payload");
                return;
            }
        };
        self.events.extend(topics.into_iter().map(|topic| Event {
            topic,
            payload: payload.clone(),
        }));
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// In-process pub/sub for change and progress events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// A bus buffering up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// A new subscriber, seeing events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publishes one event. Having no subscriber is not an error.
    pub fn publish(&self, event: Event) {
        debug!(topic = %event.topic, "Publishing event");
        let _ = self.sender.send(event);
    }

    /// Publishes every event of a committed unit of work, in record order.
    pub fn publish_all(&self, outbox: Outbox) {
        for event in outbox.events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopbank_shared::types::{BranchId, OrganizationId};

    #[test]
    fn test_entity_topics() {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        let topics = entity_topics("general_ledger", "create", "abc", scope);
        assert_eq!(
            topics,
            vec![
                "general_ledger.create".to_string(),
                "general_ledger.create.abc".to_string(),
                format!("general_ledger.create.branch.{}", scope.branch_id),
                format!("general_ledger.create.organization.{}", scope.organization_id),
            ]
        );
    }

    #[tokio::test]
    async fn test_outbox_publishes_in_order() {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let mut outbox = Outbox::default();
        outbox.record("transaction_batch", "update", 1, scope, &serde_json::json!({"n": 1}));
        assert_eq!(outbox.len(), 4);
        bus.publish_all(outbox);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.topic, "transaction_batch.update");
        assert_eq!(first.payload["n"], 1);
        assert_eq!(rx.recv().await.unwrap().topic, "transaction_batch.update.1");
    }
}
