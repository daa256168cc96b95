//! Repository traits the pipeline persists through. Each is a narrow,
//! async, storage-agnostic seam — an in-memory double for tests and the
//! default wiring, a SQLite-backed implementation (`crate::sqlite`) for
//! `nightwatchd`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nightwatch_core::model::{AnalysisMode, Camera, StoredEvent};

use crate::error::Result;

/// One row of the AI usage log: appended for every provider call,
/// successful or failed, independent of whether the event itself was
/// ultimately persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiUsageRecord {
    pub timestamp: DateTime<Utc>,
    pub camera_id: Uuid,
    pub provider: Option<String>,
    pub success: bool,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub response_time_ms: u64,
    pub cost_usd: Option<f64>,
    pub error: Option<String>,
    pub analysis_mode: Option<AnalysisMode>,
    pub is_estimated: bool,
    pub image_count: u32,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: StoredEvent) -> Result<Uuid>;
    async fn get(&self, id: Uuid) -> Result<Option<StoredEvent>>;
    async fn update_description(&self, id: Uuid, description: String) -> Result<()>;
    /// Count of events for `camera_id` with `timestamp >= since` — backs the
    /// `events_today`/`events_this_week` status signals on the bus.
    async fn count_since(&self, camera_id: Uuid, since: DateTime<Utc>) -> Result<u32>;
}

#[async_trait]
pub trait CameraRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Camera>>;
    async fn list_enabled(&self) -> Result<Vec<Camera>>;
}

#[async_trait]
pub trait AiUsageRepository: Send + Sync {
    async fn record(&self, record: AiUsageRecord) -> Result<()>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// An admin-configured override of `Config::ai_provider_order`, if set.
    async fn provider_order_override(&self) -> Result<Option<Vec<String>>>;
}

#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Persists the embedding computed for an event's snapshot, for
    /// offline retraining and re-matching.
    async fn store(&self, event_id: Uuid, embedding: Vec<f32>) -> Result<()>;
}

pub mod memory {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use uuid::Uuid;

    use nightwatch_core::model::{Camera, StoredEvent};

    use super::{
        AiUsageRecord, AiUsageRepository, CameraRepository, EmbeddingRepository, EventRepository,
        SettingsRepository,
    };
    use crate::error::{Error, Result};

    #[derive(Default)]
    pub struct InMemoryEventRepository {
        events: Mutex<HashMap<Uuid, StoredEvent>>,
    }

    impl InMemoryEventRepository {
        /// Every stored event for `camera_id`, oldest first.
        #[must_use]
        pub fn for_camera(&self, camera_id: Uuid) -> Vec<StoredEvent> {
            let mut events: Vec<StoredEvent> = self
                .events
                .lock()
                .values()
                .filter(|e| e.camera_id == camera_id)
                .cloned()
                .collect();
            events.sort_by_key(|e| e.timestamp);
            events
        }
    }

    #[async_trait]
    impl EventRepository for InMemoryEventRepository {
        async fn insert(&self, event: StoredEvent) -> Result<Uuid> {
            let id = event.id;
            self.events.lock().insert(id, event);
            Ok(id)
        }

        async fn get(&self, id: Uuid) -> Result<Option<StoredEvent>> {
            Ok(self.events.lock().get(&id).cloned())
        }

        async fn update_description(&self, id: Uuid, description: String) -> Result<()> {
            let mut events = self.events.lock();
            let event = events.get_mut(&id).ok_or(Error::EventNotFound(id))?;
            event.description = description;
            Ok(())
        }

        async fn count_since(&self, camera_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
            let count = self
                .events
                .lock()
                .values()
                .filter(|e| e.camera_id == camera_id && e.timestamp >= since)
                .count();
            Ok(count as u32)
        }
    }

    #[derive(Default)]
    pub struct InMemoryCameraRepository {
        cameras: Mutex<HashMap<Uuid, Camera>>,
    }

    impl InMemoryCameraRepository {
        #[must_use]
        pub fn with_cameras(cameras: Vec<Camera>) -> Self {
            let map = cameras.into_iter().map(|c| (c.id, c)).collect();
            Self { cameras: Mutex::new(map) }
        }
    }

    #[async_trait]
    impl CameraRepository for InMemoryCameraRepository {
        async fn get(&self, id: Uuid) -> Result<Option<Camera>> {
            Ok(self.cameras.lock().get(&id).cloned())
        }

        async fn list_enabled(&self) -> Result<Vec<Camera>> {
            Ok(self.cameras.lock().values().filter(|c| c.enabled).cloned().collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryAiUsageRepository {
        records: Mutex<Vec<AiUsageRecord>>,
    }

    impl InMemoryAiUsageRepository {
        #[must_use]
        pub fn records(&self) -> Vec<AiUsageRecord> {
            self.records.lock().clone()
        }
    }

    #[async_trait]
    impl AiUsageRepository for InMemoryAiUsageRepository {
        async fn record(&self, record: AiUsageRecord) -> Result<()> {
            self.records.lock().push(record);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryEmbeddingRepository {
        embeddings: Mutex<HashMap<Uuid, Vec<f32>>>,
    }

    impl InMemoryEmbeddingRepository {
        #[must_use]
        pub fn get(&self, event_id: Uuid) -> Option<Vec<f32>> {
            self.embeddings.lock().get(&event_id).cloned()
        }

        #[must_use]
        pub fn len(&self) -> usize {
            self.embeddings.lock().len()
        }

        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.embeddings.lock().is_empty()
        }
    }

    #[async_trait]
    impl EmbeddingRepository for InMemoryEmbeddingRepository {
        async fn store(&self, event_id: Uuid, embedding: Vec<f32>) -> Result<()> {
            self.embeddings.lock().insert(event_id, embedding);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemorySettingsRepository {
        provider_order_override: Mutex<Option<Vec<String>>>,
    }

    impl InMemorySettingsRepository {
        pub fn set_provider_order_override(&self, order: Option<Vec<String>>) {
            *self.provider_order_override.lock() = order;
        }
    }

    #[async_trait]
    impl SettingsRepository for InMemorySettingsRepository {
        async fn provider_order_override(&self) -> Result<Option<Vec<String>>> {
            Ok(self.provider_order_override.lock().clone())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use nightwatch_core::model::{AnalysisMode, DetectionType, SourceKind};

        fn sample_event(camera_id: Uuid, timestamp: DateTime<Utc>) -> StoredEvent {
            StoredEvent {
                id: Uuid::new_v4(),
                camera_id,
                timestamp,
                description: "A person walks by.".to_string(),
                confidence: 80,
                ai_confidence: Some(80),
                low_confidence: false,
                vague_reason: None,
                objects_detected: vec![DetectionType::Person],
                thumbnail_path: None,
                source_kind: SourceKind::Rtsp,
                smart_detection_type: DetectionType::Person,
                is_doorbell_ring: false,
                analysis_mode: Some(AnalysisMode::SingleFrame),
                frame_count_used: Some(1),
                fallback_reason: None,
                provider_used: Some("openai".to_string()),
                ai_cost: Some(0.0001),
                delivery_carrier: None,
                key_frames: None,
                audio_transcription: None,
                reanalysis_count: 0,
                correlation_group_id: None,
                description_retry_needed: false,
                analysis_skipped_reason: None,
            }
        }

        #[tokio::test]
        async fn insert_then_get_round_trips() {
            let repo = InMemoryEventRepository::default();
            let event = sample_event(Uuid::new_v4(), Utc::now());
            let id = repo.insert(event.clone()).await.unwrap();
            let fetched = repo.get(id).await.unwrap().unwrap();
            assert_eq!(fetched.description, event.description);
        }

        #[tokio::test]
        async fn update_description_rewrites_stored_event() {
            let repo = InMemoryEventRepository::default();
            let event = sample_event(Uuid::new_v4(), Utc::now());
            let id = repo.insert(event).await.unwrap();
            repo.update_description(id, "Known entity: Alex.".to_string()).await.unwrap();
            let fetched = repo.get(id).await.unwrap().unwrap();
            assert_eq!(fetched.description, "Known entity: Alex.");
        }

        #[tokio::test]
        async fn update_description_on_missing_event_errors() {
            let repo = InMemoryEventRepository::default();
            let result = repo.update_description(Uuid::new_v4(), "x".to_string()).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn count_since_only_counts_matching_camera_and_window() {
            let repo = InMemoryEventRepository::default();
            let camera_id = Uuid::new_v4();
            let other_camera = Uuid::new_v4();
            let now = Utc::now();
            repo.insert(sample_event(camera_id, now)).await.unwrap();
            repo.insert(sample_event(camera_id, now - chrono::Duration::days(2))).await.unwrap();
            repo.insert(sample_event(other_camera, now)).await.unwrap();

            let count = repo.count_since(camera_id, now - chrono::Duration::hours(1)).await.unwrap();
            assert_eq!(count, 1);
        }

        #[tokio::test]
        async fn settings_repository_returns_the_configured_override() {
            let repo = InMemorySettingsRepository::default();
            assert_eq!(repo.provider_order_override().await.unwrap(), None);
            repo.set_provider_order_override(Some(vec!["gemini".to_string()]));
            assert_eq!(
                repo.provider_order_override().await.unwrap(),
                Some(vec!["gemini".to_string()])
            );
        }

        #[tokio::test]
        async fn ai_usage_repository_accumulates_records() {
            let repo = InMemoryAiUsageRepository::default();
            repo.record(AiUsageRecord {
                timestamp: Utc::now(),
                camera_id: Uuid::new_v4(),
                provider: Some("openai".to_string()),
                success: true,
                input_tokens: 200,
                output_tokens: 60,
                response_time_ms: 850,
                cost_usd: Some(0.0001),
                error: None,
                analysis_mode: Some(AnalysisMode::SingleFrame),
                is_estimated: false,
                image_count: 1,
            })
            .await
            .unwrap();
            assert_eq!(repo.records().len(), 1);
        }
    }
}
