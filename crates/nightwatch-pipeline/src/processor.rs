//! The event processor: a bounded queue feeding a fixed worker pool, with
//! per-camera cooldown at enqueue time and graceful two-phase shutdown.
//!
//! Each worker runs one event through the whole synchronous pipeline —
//! snapshot, cost gate, evidence chain, persistence — then hands off to
//! detached fan-out tasks and moves on. A worker outlives any single
//! event's failure.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nightwatch_core::config::Config;
use nightwatch_core::model::{
    ai_paused_description, AnalysisMode, Camera, DetectionType, Evidence, KeyFrame,
    ProcessingEvent, SourceKind, StoredEvent,
};
use nightwatch_core::retry::{with_retry, RetryPolicy};
use nightwatch_homebridge::extract_carrier;
use nightwatch_vision::parse::infer_objects;
use nightwatch_vision::prompt::PromptContext;
use nightwatch_vision::quality::detect_vague_description;

use crate::cooldown::CooldownTracker;
use crate::core::PipelineCore;
use crate::error::Result;
use crate::evidence::{acquire_evidence, EvidenceOutcome, AUDIO_TRANSCRIPTION_TIMEOUT};
use crate::fanout::{self, primary_detection_type};
use crate::notify::{DoorbellRing, Notifier};
use crate::ports::{AudioTranscriber, ClipDownloader, Embedder, SnapshotFetcher};
use crate::queue::{EventQueue, PushOutcome};
use crate::repo::{AiUsageRecord, AiUsageRepository, EventRepository};

/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Pause after a worker-level failure before pulling the next event.
const WORKER_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Half-width of the clip window downloaded around an event timestamp.
const CLIP_WINDOW_SECS: i64 = 15;

/// What happened to an event offered to [`EventProcessor::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Accepted, but the queue was full and its oldest entry was dropped.
    AcceptedAfterDroppingOldest,
    /// Suppressed by the camera's cooldown window.
    InCooldown,
    /// The camera id isn't configured.
    CameraUnknown,
    /// The processor is shutting down and no longer accepts events.
    NotAccepting,
}

pub struct EventProcessor {
    core: Arc<PipelineCore>,
    queue: Arc<EventQueue>,
    cooldown: CooldownTracker,
    accepting: AtomicBool,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EventProcessor {
    #[must_use]
    pub fn new(core: Arc<PipelineCore>, queue_capacity: usize) -> Self {
        Self {
            core,
            queue: Arc::new(EventQueue::new(queue_capacity)),
            cooldown: CooldownTracker::new(),
            accepting: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn core(&self) -> &Arc<PipelineCore> {
        &self.core
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Offers an event for processing, applying the per-camera cooldown at
    /// enqueue time so it composes with the filter stage.
    pub fn enqueue(&self, event: ProcessingEvent) -> EnqueueOutcome {
        if !self.accepting.load(Ordering::SeqCst) {
            return EnqueueOutcome::NotAccepting;
        }
        let Some(camera) = self.core.cameras.get(&event.camera_id) else {
            debug!(camera_id = %event.camera_id, "enqueue for unknown camera, discarded");
            return EnqueueOutcome::CameraUnknown;
        };
        if self.cooldown.is_in_cooldown(camera.id, camera.motion_cooldown) {
            debug!(camera_id = %camera.id, "event suppressed by cooldown");
            return EnqueueOutcome::InCooldown;
        }
        self.cooldown.mark_accepted(camera.id);

        let outcome = self.queue.push(event);
        self.core.metrics.set_queue_depth(self.queue.len() as u32);
        match outcome {
            PushOutcome::Accepted => EnqueueOutcome::Accepted,
            PushOutcome::AcceptedAfterDroppingOldest => {
                self.core.metrics.record_overflow_drop();
                EnqueueOutcome::AcceptedAfterDroppingOldest
            }
        }
    }

    /// Spawns the worker pool. `worker_count` is clamped into the
    /// supported range with a warning rather than rejected.
    pub fn start(self: &Arc<Self>, worker_count: u32) {
        let clamped = worker_count.clamp(Config::MIN_WORKERS, Config::MAX_WORKERS);
        if clamped != worker_count {
            warn!(requested = worker_count, clamped, "worker count out of range, clamped");
        }
        let mut workers = self.workers.lock();
        for worker_id in 0..clamped {
            let processor = self.clone();
            workers.push(tokio::spawn(async move {
                processor.worker_loop(worker_id).await;
            }));
        }
        info!(workers = clamped, "event processor started");
    }

    /// Two-phase shutdown: stop accepting, drain queued and in-flight
    /// events within `timeout`, then cancel whatever is left.
    pub async fn stop(&self, timeout: Duration) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.store(true, Ordering::SeqCst);

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let deadline = tokio::time::Instant::now() + timeout;
        for handle in &mut workers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut *handle).await.is_err() {
                warn!("worker did not drain before the shutdown timeout, cancelling");
                handle.abort();
            }
        }

        self.core.bridge.clear_all();
        self.core.metrics.set_queue_depth(self.queue.len() as u32);
        info!("event processor stopped");
    }

    async fn worker_loop(&self, worker_id: u32) {
        debug!(worker_id, "worker started");
        loop {
            match self.queue.pop().await {
                Some(event) => {
                    self.core.metrics.set_queue_depth(self.queue.len() as u32);
                    let started = std::time::Instant::now();
                    let result = self.process_event(event).await;
                    self.core
                        .metrics
                        .record_processing_time_ms(started.elapsed().as_secs_f64() * 1000.0);
                    match result {
                        Ok(()) => self.core.metrics.record_success(),
                        Err(err) => {
                            error!(worker_id, error = %err, "event processing failed");
                            self.core.metrics.record_worker_exception();
                            self.core.metrics.record_failure();
                            tokio::time::sleep(WORKER_ERROR_BACKOFF).await;
                        }
                    }
                }
                None => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
        }
        debug!(worker_id, "worker stopped");
    }

    /// Runs the full synchronous pipeline for one event. The only error
    /// that propagates is persistence exhaustion; everything else degrades
    /// into the stored event's metadata.
    async fn process_event(&self, event: ProcessingEvent) -> Result<()> {
        let Some(camera) = self.core.cameras.get(&event.camera_id).cloned() else {
            debug!(camera_id = %event.camera_id, "event for unknown camera discarded");
            self.core.metrics.increment_error("unknown_camera");
            return Ok(());
        };

        let event_id = Uuid::new_v4();
        let primary = primary_detection_type(&event.detected_types);
        let is_ring = primary == DetectionType::Ring;

        let snapshot: Option<Vec<u8>> = match &event.evidence {
            Some(Evidence::Frame(jpeg)) => Some(jpeg.clone()),
            _ => match self.core.snapshots.fetch(&camera).await {
                Ok(jpeg) => Some(jpeg),
                Err(err) => {
                    warn!(camera_id = %camera.id, error = %err, "snapshot fetch failed");
                    self.core.metrics.increment_error("snapshot_failed");
                    None
                }
            },
        };

        let mut thumbnail_path = None;
        if let Some(jpeg) = &snapshot {
            match self.core.thumbs.save_event(event_id, event.timestamp, jpeg).await {
                Ok(path) => thumbnail_path = Some(path),
                Err(err) => warn!(error = %err, "thumbnail write failed"),
            }
        }

        // The doorbell ring signal goes out before any AI work so the
        // notification latency is bounded by the snapshot, not the chain.
        if is_ring {
            let ring = DoorbellRing {
                camera_id: camera.id,
                camera_name: camera.name.clone(),
                thumbnail_path: thumbnail_path.clone(),
                timestamp: event.timestamp,
            };
            if let Err(err) = self.core.notifier.doorbell_ring(ring).await {
                warn!(error = %err, "doorbell ring notification failed");
            }
        }

        if let Some(reason) = self.core.costs.check_cap(Utc::now()) {
            let stored = paused_event(event_id, &camera, &event, primary, is_ring, thumbnail_path, reason);
            return self.persist_and_fan_out(stored, camera, None).await;
        }

        let clip_path = match (&event.evidence, camera.source_kind, camera.analysis_mode) {
            (Some(Evidence::ClipPath(path)), _, _) => Some(path.clone()),
            (_, SourceKind::Protect, AnalysisMode::MultiFrame | AnalysisMode::VideoNative) => {
                let start = event.timestamp - ChronoDuration::seconds(CLIP_WINDOW_SECS);
                let end = event.timestamp + ChronoDuration::seconds(CLIP_WINDOW_SECS);
                match self.core.clips.download(&camera, start, end).await {
                    Ok(path) => Some(path),
                    Err(err) => {
                        debug!(camera_id = %camera.id, error = %err, "no clip for event");
                        None
                    }
                }
            }
            _ => None,
        };

        let mut transcription: Option<String> = None;
        if camera.is_doorbell {
            if let Some(path) = &clip_path {
                match tokio::time::timeout(AUDIO_TRANSCRIPTION_TIMEOUT, self.core.audio.transcribe(path)).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => transcription = Some(text),
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => debug!(error = %err, "audio transcription failed"),
                    Err(_) => debug!("audio transcription timed out"),
                }
            }
        }

        // Embedding is computed before inference so the read-only context
        // lookup and the fan-out's match+link share one vector.
        let embedding = match &snapshot {
            Some(jpeg) => match self.core.embedder.embed(jpeg).await {
                Ok(embedding) => Some(embedding),
                Err(err) => {
                    debug!(error = %err, "embedding computation failed");
                    None
                }
            },
            None => None,
        };

        // Read-only context lookup: never writes, never links. The full
        // match+link happens in fan-out with this same vector.
        if let Some(embedding) = &embedding {
            match self
                .core
                .entities
                .match_entity_only(embedding, self.core.settings.person_match_threshold)
                .await
            {
                Ok(Some(context)) => debug!(
                    entity_id = %context.entity_id,
                    occurrences = context.occurrence_count,
                    "event matches a known entity"
                ),
                Ok(None) => {}
                Err(err) => debug!(error = %err, "entity context lookup failed"),
            }
        }

        let mut tags: Vec<String> =
            event.detected_types.iter().map(|t| t.as_tag().to_string()).collect();
        tags.sort_unstable();
        let ts = event.timestamp.to_rfc3339();
        let ctx = PromptContext {
            camera_name: &camera.name,
            timestamp_rfc3339: &ts,
            detected_objects: &tags,
            custom_prompt: self.select_prompt(&camera, event_id),
            audio_transcription: transcription.as_deref(),
            is_doorbell: camera.is_doorbell,
        };

        let outcome = acquire_evidence(
            &camera,
            &self.core.providers,
            clip_path.as_deref(),
            snapshot.as_deref(),
            &ctx,
            self.core.settings.frame_count,
        )
        .await;

        self.record_usage(&camera, &outcome).await;
        if let Some(cost) = outcome.cost_usd {
            self.core.costs.record(cost, Utc::now());
        }

        let (confidence, low_confidence, vague_reason) = derive_confidence(&outcome);
        if let Some(reason) = vague_reason.as_deref() {
            info!(camera_id = %camera.id, reason, "vague description detected");
        }
        let objects_detected = infer_detected(&outcome.description, &event.detected_types);
        let delivery_carrier = extract_carrier(&outcome.description).map(str::to_string);
        let key_frames = if self.core.settings.store_analysis_frames && !outcome.frames_used.is_empty() {
            Some(
                outcome
                    .frames_used
                    .iter()
                    .map(|f| KeyFrame { jpeg: f.jpeg.clone(), timestamp_ms: f.timestamp_ms })
                    .collect(),
            )
        } else {
            None
        };

        let stored = StoredEvent {
            id: event_id,
            camera_id: camera.id,
            timestamp: event.timestamp,
            description: outcome.description.clone(),
            confidence,
            ai_confidence: outcome.ai_confidence,
            low_confidence,
            vague_reason,
            objects_detected,
            thumbnail_path,
            source_kind: camera.source_kind,
            smart_detection_type: primary,
            is_doorbell_ring: is_ring,
            analysis_mode: outcome.analysis_mode,
            frame_count_used: outcome.frame_count_used,
            fallback_reason: outcome.fallback_reason.clone(),
            provider_used: outcome.provider_used.clone(),
            ai_cost: outcome.cost_usd,
            delivery_carrier,
            key_frames,
            audio_transcription: transcription,
            reanalysis_count: 0,
            correlation_group_id: None,
            description_retry_needed: outcome.terminal_unavailable,
            analysis_skipped_reason: None,
        };

        self.persist_and_fan_out(stored, camera, embedding).await
    }

    /// Picks the prompt for one event: the camera's own override wins,
    /// then the global override. With A/B testing enabled, half the
    /// events (split on the event id, so the choice is stable per event)
    /// get the candidate prompt instead.
    fn select_prompt<'a>(&'a self, camera: &'a Camera, event_id: Uuid) -> Option<&'a str> {
        let settings = &self.core.settings;
        if settings.ab_test_enabled {
            if let Some(candidate) = settings.ab_test_prompt.as_deref() {
                if event_id.as_bytes()[0] % 2 == 1 {
                    return Some(candidate);
                }
            }
        }
        camera
            .prompt_override
            .as_deref()
            .or(settings.description_prompt_override.as_deref())
    }

    /// Appends one usage-log row per provider attempt. Log failures never
    /// fail the pipeline.
    async fn record_usage(&self, camera: &Camera, outcome: &EvidenceOutcome) {
        for attempt in &outcome.attempts {
            let record = AiUsageRecord {
                timestamp: Utc::now(),
                camera_id: camera.id,
                provider: Some(attempt.provider.clone()),
                success: attempt.success,
                input_tokens: attempt.input_tokens,
                output_tokens: attempt.output_tokens,
                response_time_ms: attempt.response_time_ms,
                cost_usd: attempt.cost_usd,
                error: attempt.error.clone(),
                analysis_mode: outcome.analysis_mode,
                is_estimated: attempt.is_estimated,
                image_count: attempt.image_count,
            };
            if let Err(err) = self.core.usage.record(record).await {
                warn!(error = %err, "usage log write failed, continuing");
            }
        }
    }

    /// Persists with the write retry schedule, then spawns fan-out. On
    /// exhaustion the event is lost and counted; fan-out does not run.
    async fn persist_and_fan_out(
        &self,
        event: StoredEvent,
        camera: Camera,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let policy = RetryPolicy::persistence();
        let result = with_retry(&policy, "event_store", || {
            let to_store = event.clone();
            async move { self.core.events.insert(to_store).await }
        })
        .await;

        match result {
            Err(err) => {
                error!(event_id = %event.id, error = %err, "event_storage_failed");
                self.core.metrics.increment_error("event_storage_failed");
                Err(err)
            }
            Ok(_) => {
                fanout::spawn_all(self.core.clone(), event, camera, embedding);
                Ok(())
            }
        }
    }
}

/// Derives `(confidence, low_confidence, vague_reason)` for a stored
/// event. The numeric self-report and the vagueness check are independent
/// signals; either alone marks the event low-confidence.
fn derive_confidence(outcome: &EvidenceOutcome) -> (u8, bool, Option<String>) {
    if outcome.terminal_unavailable {
        return (0, true, None);
    }
    let vague_reason = detect_vague_description(&outcome.description);
    let low_from_ai = outcome.ai_confidence.is_some_and(|c| c < 50);
    let low_confidence = low_from_ai || vague_reason.is_some();
    (
        outcome.ai_confidence.unwrap_or(50),
        low_confidence,
        vague_reason.map(str::to_string),
    )
}

/// Maps description keywords onto detection types, falling back to the
/// types the camera itself reported when nothing matches.
fn infer_detected(description: &str, detected: &HashSet<DetectionType>) -> Vec<DetectionType> {
    let mut tags: Vec<DetectionType> = infer_objects(description)
        .into_iter()
        .filter_map(|tag| match tag {
            "person" => Some(DetectionType::Person),
            "vehicle" => Some(DetectionType::Vehicle),
            "animal" => Some(DetectionType::Animal),
            "package" => Some(DetectionType::Package),
            _ => None,
        })
        .collect();
    if tags.is_empty() {
        tags = detected.iter().copied().collect();
        tags.sort_unstable_by_key(|t| t.as_tag());
    }
    tags
}

fn paused_event(
    event_id: Uuid,
    camera: &Camera,
    event: &ProcessingEvent,
    primary: DetectionType,
    is_ring: bool,
    thumbnail_path: Option<std::path::PathBuf>,
    reason: &str,
) -> StoredEvent {
    StoredEvent {
        id: event_id,
        camera_id: camera.id,
        timestamp: event.timestamp,
        description: ai_paused_description(reason),
        confidence: 0,
        ai_confidence: None,
        low_confidence: true,
        vague_reason: None,
        objects_detected: Vec::new(),
        thumbnail_path,
        source_kind: camera.source_kind,
        smart_detection_type: primary,
        is_doorbell_ring: is_ring,
        analysis_mode: None,
        frame_count_used: None,
        fallback_reason: None,
        provider_used: None,
        ai_cost: None,
        delivery_carrier: None,
        key_frames: None,
        audio_transcription: None,
        reanalysis_count: 0,
        correlation_group_id: None,
        description_retry_needed: true,
        analysis_skipped_reason: Some(reason.to_string()),
    }
}
