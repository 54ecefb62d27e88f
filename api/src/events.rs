//! In-process event bus
//!
//! Every integration and content operation emits one named event. Events are
//! recorded through `tracing` and fanned out over a `tokio::sync::broadcast`
//! channel; with no subscribers they are simply dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::domain::Provider;

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        event.record();
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    IntegrationConnected {
        provider: Provider,
        account_id: i64,
        integration_id: i64,
    },
    IntegrationFailed {
        provider: Provider,
        stage: &'static str,
        kind: &'static str,
        account_id: Option<i64>,
    },
    IntegrationDeleted {
        account_id: i64,
        integration_id: i64,
    },
    ContentPublished {
        account_id: i64,
        content_id: i64,
        provider: Provider,
        posted_url: Option<String>,
    },
    ContentPublishFailed {
        account_id: i64,
        content_id: i64,
        provider: Provider,
        kind: &'static str,
        posted_units: usize,
    },
    ContentScheduled {
        account_id: i64,
        content_id: i64,
    },
    ContentUnscheduled {
        account_id: i64,
        content_id: i64,
    },
    /// The tenant's content listing must be refetched
    ContentListStale { account_id: i64 },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::IntegrationConnected { .. } => "integration_connected",
            Event::IntegrationFailed { .. } => "integration_failed",
            Event::IntegrationDeleted { .. } => "integration_deleted",
            Event::ContentPublished { .. } => "content_published",
            Event::ContentPublishFailed { .. } => "content_publish_failed",
            Event::ContentScheduled { .. } => "content_scheduled",
            Event::ContentUnscheduled { .. } => "content_unscheduled",
            Event::ContentListStale { .. } => "content_list_stale",
        }
    }

    fn record(&self) {
        match self {
            Event::IntegrationFailed { provider, stage, kind, account_id } => error!(
                event = self.name(),
                provider = %provider,
                stage,
                kind,
                account_id = ?account_id,
                "integration connect failed"
            ),
            Event::ContentPublishFailed { account_id, content_id, provider, kind, posted_units } => {
                error!(
                    event = self.name(),
                    account_id,
                    content_id,
                    provider = %provider,
                    kind,
                    posted_units,
                    "content publish failed"
                )
            }
            other => info!(event = other.name(), payload = ?other, "event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(Event::ContentListStale { account_id: 4 });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "content_list_stale");
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new(8);
        bus.emit(Event::IntegrationDeleted { account_id: 1, integration_id: 2 });
    }

    #[test]
    fn serializes_with_event_tag() {
        let event = Event::IntegrationFailed {
            provider: Provider::Threads,
            stage: "exchanging_token",
            kind: "provider_http_error",
            account_id: Some(9),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "integration_failed");
        assert_eq!(json["stage"], "exchanging_token");
        assert_eq!(json["account_id"], 9);
    }
}
