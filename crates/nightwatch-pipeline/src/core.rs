//! The process-wide root value: every component the workers and fan-out
//! tasks touch hangs off one [`PipelineCore`] constructed at startup and
//! shared by `Arc` — no ambient globals.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use nightwatch_core::config::Config;
use nightwatch_core::model::Camera;
use nightwatch_entities::store::EntityStore;
use nightwatch_entities::EntityMatcher;
use nightwatch_homebridge::{CameraRegistry, SensorBridge};
use nightwatch_vision::provider::VisionProvider;

use crate::anomaly::ActivityBaseline;
use crate::bus::{InMemoryBus, MessageBus};
use crate::costcap::CostTracker;
use crate::fanout::FanoutCounters;
use crate::metrics::ProcessingMetrics;
use crate::notify::{InMemoryNotifier, Notifier};
use crate::ports::stub::{HashEmbedder, NoAudioTranscriber, StaticClipDownloader, StaticSnapshotFetcher};
use crate::ports::{AudioTranscriber, ClipDownloader, Embedder, SnapshotFetcher};
use crate::repo::memory::{InMemoryAiUsageRepository, InMemoryEmbeddingRepository, InMemoryEventRepository};
use crate::repo::{AiUsageRepository, EmbeddingRepository, EventRepository};
use crate::thumbs::ThumbnailStore;

/// Tunables threaded from configuration into the worker and fan-out paths.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Topic root for bus publishes.
    pub bus_root: String,
    /// Frames requested per multi-frame analysis.
    pub frame_count: u32,
    pub person_match_threshold: f32,
    pub vehicle_match_threshold: f32,
    pub auto_create_persons: bool,
    pub auto_create_vehicles: bool,
    pub face_recognition_enabled: bool,
    pub vehicle_recognition_enabled: bool,
    /// Persist the frames sent for analysis as key frames on the event.
    pub store_analysis_frames: bool,
    /// Global prompt override applied when a camera has none of its own.
    pub description_prompt_override: Option<String>,
    pub ab_test_enabled: bool,
    pub ab_test_prompt: Option<String>,
    /// One sensor per delivery carrier alongside the generic package sensor.
    pub per_carrier_sensors: bool,
    pub motion_reset: Duration,
    pub motion_max: Duration,
    pub occupancy_reset: Duration,
    pub occupancy_max: Duration,
    pub vehicle_reset: Duration,
    pub animal_reset: Duration,
    pub package_reset: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            bus_root: "nightwatch".to_string(),
            frame_count: crate::evidence::DEFAULT_FRAME_COUNT,
            person_match_threshold: Config::DEFAULT_PERSON_THRESHOLD,
            vehicle_match_threshold: Config::DEFAULT_VEHICLE_THRESHOLD,
            auto_create_persons: true,
            auto_create_vehicles: true,
            face_recognition_enabled: true,
            vehicle_recognition_enabled: true,
            store_analysis_frames: false,
            description_prompt_override: None,
            ab_test_enabled: false,
            ab_test_prompt: None,
            per_carrier_sensors: false,
            motion_reset: Duration::from_secs(30),
            motion_max: Duration::from_secs(600),
            occupancy_reset: Duration::from_secs(300),
            occupancy_max: Duration::from_secs(1800),
            vehicle_reset: Duration::from_secs(60),
            animal_reset: Duration::from_secs(60),
            package_reset: Duration::from_secs(60),
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            person_match_threshold: config.person_match_threshold,
            vehicle_match_threshold: config.vehicle_match_threshold,
            auto_create_persons: config.auto_create_person_entities,
            auto_create_vehicles: config.auto_create_vehicle_entities,
            face_recognition_enabled: config.face_recognition_enabled,
            vehicle_recognition_enabled: config.vehicle_recognition_enabled,
            description_prompt_override: config.description_prompt_override.clone(),
            ab_test_enabled: config.ab_test_enabled,
            ab_test_prompt: config.ab_test_prompt.clone(),
            motion_reset: config.motion_sensor_timeout,
            motion_max: config.motion_sensor_max_timeout,
            occupancy_reset: config.occupancy_sensor_timeout,
            occupancy_max: config.occupancy_sensor_max_timeout,
            vehicle_reset: config.event_sensor_timeout,
            animal_reset: config.event_sensor_timeout,
            package_reset: config.event_sensor_timeout.max(Duration::from_secs(60)),
            ..Self::default()
        }
    }
}

/// Everything the pipeline touches, owned in one place.
pub struct PipelineCore {
    pub cameras: HashMap<Uuid, Camera>,
    pub providers: Vec<Box<dyn VisionProvider>>,
    pub events: Arc<dyn EventRepository>,
    pub usage: Arc<dyn AiUsageRepository>,
    pub embeddings: Arc<dyn EmbeddingRepository>,
    pub snapshots: Arc<dyn SnapshotFetcher>,
    pub clips: Arc<dyn ClipDownloader>,
    pub audio: Arc<dyn AudioTranscriber>,
    pub embedder: Arc<dyn Embedder>,
    pub entities: EntityMatcher<Arc<dyn EntityStore>>,
    pub bridge: Arc<SensorBridge>,
    pub registry: CameraRegistry,
    pub bus: Arc<dyn MessageBus>,
    pub notifier: Arc<dyn Notifier>,
    pub costs: CostTracker,
    pub baseline: ActivityBaseline,
    pub thumbs: ThumbnailStore,
    pub metrics: ProcessingMetrics,
    pub fanout_counters: FanoutCounters,
    pub settings: PipelineSettings,
}

impl PipelineCore {
    /// Fully in-process wiring: in-memory repositories, stub collaborators
    /// and a connected in-memory bus. The default for tests and for
    /// running without external integrations configured; callers override
    /// individual fields for anything real.
    #[must_use]
    pub fn in_memory(
        cameras: Vec<Camera>,
        providers: Vec<Box<dyn VisionProvider>>,
        entity_store: Arc<dyn EntityStore>,
        thumbnail_root: PathBuf,
        settings: PipelineSettings,
    ) -> Self {
        let registry = CameraRegistry::new();
        for camera in &cameras {
            if let Some(mac) = &camera.mac {
                registry.register(camera.id, mac);
            }
        }

        Self {
            cameras: cameras.into_iter().map(|c| (c.id, c)).collect(),
            providers,
            events: Arc::new(InMemoryEventRepository::default()),
            usage: Arc::new(InMemoryAiUsageRepository::default()),
            embeddings: Arc::new(InMemoryEmbeddingRepository::default()),
            snapshots: Arc::new(StaticSnapshotFetcher::returning(b"stub-jpeg".to_vec())),
            clips: Arc::new(StaticClipDownloader::unavailable()),
            audio: Arc::new(NoAudioTranscriber),
            embedder: Arc::new(HashEmbedder::default()),
            entities: EntityMatcher::new(entity_store),
            bridge: Arc::new(SensorBridge::new()),
            registry,
            bus: Arc::new(InMemoryBus::connected()),
            notifier: Arc::new(InMemoryNotifier::new()),
            costs: CostTracker::new(None),
            baseline: ActivityBaseline::new(),
            thumbs: ThumbnailStore::new(thumbnail_root),
            metrics: ProcessingMetrics::new(),
            fanout_counters: FanoutCounters::default(),
            settings,
        }
    }

    #[must_use]
    pub fn camera(&self, id: Uuid) -> Option<&Camera> {
        self.cameras.get(&id)
    }

    /// Resolves a protect-side id to its camera, if one is configured.
    #[must_use]
    pub fn camera_by_protect_id(&self, protect_id: &str) -> Option<&Camera> {
        self.cameras
            .values()
            .find(|c| c.protect_id.as_deref() == Some(protect_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightwatch_core::model::{AnalysisMode, SourceKind};
    use nightwatch_entities::store::memory::InMemoryEntityStore;
    use std::collections::HashSet;

    fn camera(protect_id: Option<&str>) -> Camera {
        Camera {
            id: Uuid::new_v4(),
            name: "Front".to_string(),
            source_kind: SourceKind::Protect,
            enabled: true,
            detection_filter: HashSet::new(),
            analysis_mode: AnalysisMode::SingleFrame,
            prompt_override: None,
            is_doorbell: false,
            motion_cooldown: Camera::DEFAULT_COOLDOWN,
            protect_id: protect_id.map(str::to_string),
            mac: Some("aa:bb:cc:dd:ee:ff".to_string()),
        }
    }

    #[test]
    fn in_memory_core_indexes_cameras_and_macs() {
        let cam = camera(Some("proto-1"));
        let cam_id = cam.id;
        let core = PipelineCore::in_memory(
            vec![cam],
            Vec::new(),
            Arc::new(InMemoryEntityStore::new()),
            PathBuf::from("/tmp/nightwatch-test"),
            PipelineSettings::default(),
        );
        assert!(core.camera(cam_id).is_some());
        assert_eq!(core.camera_by_protect_id("proto-1").map(|c| c.id), Some(cam_id));
        assert_eq!(core.registry.resolve("aa:bb:cc:dd:ee:ff").ok(), Some(cam_id));
    }

    #[test]
    fn settings_from_config_keeps_package_reset_at_least_a_minute() {
        let settings = PipelineSettings::default();
        assert!(settings.package_reset >= Duration::from_secs(60));
    }
}
