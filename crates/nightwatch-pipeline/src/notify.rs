//! Push-notification dispatch: regular per-event pushes (collapsed per
//! camera) and the low-latency doorbell ring published before the AI chain
//! even starts.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPriority {
    Normal,
    /// VIP entity matches are promoted so they cut through mute rules.
    High,
}

/// One push notification. `collapse_key` lets delivery channels replace a
/// camera's previous undelivered notification instead of stacking them.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub thumbnail_url: Option<String>,
    pub collapse_key: String,
    pub priority: NotificationPriority,
}

impl Notification {
    #[must_use]
    pub fn for_camera(camera_id: Uuid, camera_name: &str, body: String) -> Self {
        Self {
            title: camera_name.to_string(),
            body,
            thumbnail_url: None,
            collapse_key: camera_id.to_string(),
            priority: NotificationPriority::Normal,
        }
    }

    #[must_use]
    pub fn with_thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    #[must_use]
    pub fn high_priority(mut self) -> Self {
        self.priority = NotificationPriority::High;
        self
    }
}

/// A doorbell ring signal, published immediately on ring detection with
/// whatever thumbnail is already on disk — latency beats completeness here.
#[derive(Debug, Clone)]
pub struct DoorbellRing {
    pub camera_id: Uuid,
    pub camera_name: String,
    pub thumbnail_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, notification: Notification) -> Result<()>;

    async fn doorbell_ring(&self, ring: DoorbellRing) -> Result<()>;
}

/// Records every dispatch, for tests and unconfigured wiring.
#[derive(Default)]
pub struct InMemoryNotifier {
    pushes: parking_lot::Mutex<Vec<Notification>>,
    rings: parking_lot::Mutex<Vec<DoorbellRing>>,
}

impl InMemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pushes(&self) -> Vec<Notification> {
        self.pushes.lock().clone()
    }

    #[must_use]
    pub fn rings(&self) -> Vec<DoorbellRing> {
        self.rings.lock().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn push(&self, notification: Notification) -> Result<()> {
        self.pushes.lock().push(notification);
        Ok(())
    }

    async fn doorbell_ring(&self, ring: DoorbellRing) -> Result<()> {
        self.rings.lock().push(ring);
        Ok(())
    }
}
