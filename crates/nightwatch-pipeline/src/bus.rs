//! Message-bus fan-out: topic layout and payloads published after each
//! event is persisted. All publishes are best-effort — a disconnected bus
//! is skipped, a failed publish is counted and dropped, never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nightwatch_core::model::StoredEvent;

use crate::error::Result;

/// Per-camera topic paths under a configurable root (e.g. `nightwatch`).
pub mod topics {
    use uuid::Uuid;

    #[must_use]
    pub fn event(root: &str, camera_id: Uuid) -> String {
        format!("{root}/camera/{camera_id}/event")
    }

    #[must_use]
    pub fn activity(root: &str, camera_id: Uuid) -> String {
        format!("{root}/camera/{camera_id}/activity")
    }

    #[must_use]
    pub fn last_event(root: &str, camera_id: Uuid) -> String {
        format!("{root}/camera/{camera_id}/last_event")
    }

    #[must_use]
    pub fn counts(root: &str, camera_id: Uuid) -> String {
        format!("{root}/camera/{camera_id}/counts")
    }
}

/// Full event payload published to the `event` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub id: Uuid,
    pub camera_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub confidence: u8,
    pub smart_detection_type: String,
    pub provider_used: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl EventPayload {
    #[must_use]
    pub fn from_event(event: &StoredEvent, thumbnail_url: Option<String>) -> Self {
        Self {
            id: event.id,
            camera_id: event.camera_id,
            timestamp: event.timestamp,
            description: event.description.clone(),
            confidence: event.confidence,
            smart_detection_type: event.smart_detection_type.as_tag().to_string(),
            provider_used: event.provider_used.clone(),
            thumbnail_url,
        }
    }
}

/// Compact summary published to the `last_event` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastEventPayload {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub smart_detection_type: String,
}

/// Rolling counts published to the `counts` topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountsPayload {
    pub events_today: u32,
    pub events_this_week: u32,
}

/// Best-effort publisher. Implementations own their connection state; the
/// pipeline checks [`is_connected`](MessageBus::is_connected) and skips
/// publishing entirely when the bus is down.
#[async_trait]
pub trait MessageBus: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

/// In-process bus that records every publish, for tests and for wiring
/// where no broker is configured.
#[derive(Default)]
pub struct InMemoryBus {
    connected: std::sync::atomic::AtomicBool,
    messages: parking_lot::Mutex<Vec<(String, String)>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn connected() -> Self {
        let bus = Self::default();
        bus.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        bus
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn published(&self) -> Vec<(String, String)> {
        self.messages.lock().clone()
    }

    /// Every payload published to `topic`, in publish order.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.messages.lock().push((topic.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_layout_follows_the_root_camera_shape() {
        let camera_id = Uuid::nil();
        assert_eq!(
            topics::event("nightwatch", camera_id),
            format!("nightwatch/camera/{camera_id}/event")
        );
        assert_eq!(
            topics::counts("nightwatch", camera_id),
            format!("nightwatch/camera/{camera_id}/counts")
        );
    }

    #[tokio::test]
    async fn in_memory_bus_records_publishes_per_topic() {
        let bus = InMemoryBus::connected();
        bus.publish("a/b", "one".to_string()).await.unwrap();
        bus.publish("a/c", "two".to_string()).await.unwrap();
        bus.publish("a/b", "three".to_string()).await.unwrap();
        assert_eq!(bus.published_to("a/b"), vec!["one", "three"]);
        assert!(bus.is_connected());
    }

    #[test]
    fn disconnected_bus_reports_disconnected() {
        assert!(!InMemoryBus::disconnected().is_connected());
    }
}
