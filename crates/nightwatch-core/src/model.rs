//! Domain model: cameras, events, entities and provider descriptors.
//!
//! Types here are intentionally inert — construction helpers validate the
//! cross-field invariants, but nothing in this module performs
//! I/O or holds a database connection.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The sentinel description stored when the entire AI fallback chain fails.
pub const AI_UNAVAILABLE: &str = "AI analysis unavailable";

/// Prefix for the cost-cap "paused" sentinel description.
pub const AI_PAUSED_PREFIX: &str = "AI analysis paused - ";

/// Builds the cost-cap paused sentinel description for a given reason.
#[must_use]
pub fn ai_paused_description(reason: &str) -> String {
    format!("{AI_PAUSED_PREFIX}{reason}")
}

/// Returns true if `description` is the cost-cap "paused" sentinel.
#[must_use]
pub fn is_paused_sentinel(description: &str) -> bool {
    description.starts_with(AI_PAUSED_PREFIX)
}

/// Where a camera's frames originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rtsp,
    Usb,
    Protect,
}

/// Canonical internal label for a detected event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    Motion,
    Person,
    Vehicle,
    Package,
    Animal,
    Ring,
}

impl DetectionType {
    /// All canonical detection types.
    pub const ALL: [DetectionType; 6] = [
        DetectionType::Motion,
        DetectionType::Person,
        DetectionType::Vehicle,
        DetectionType::Package,
        DetectionType::Animal,
        DetectionType::Ring,
    ];

    /// Machine-readable tag, e.g. for prompt context and bus payloads.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            DetectionType::Motion => "motion",
            DetectionType::Person => "person",
            DetectionType::Vehicle => "vehicle",
            DetectionType::Package => "package",
            DetectionType::Animal => "animal",
            DetectionType::Ring => "ring",
        }
    }
}

/// Evidence type actually fed to the AI for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    SingleFrame,
    MultiFrame,
    VideoNative,
}

/// How a video-capable provider is expected to receive the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoMethod {
    None,
    FrameExtraction,
    NativeUpload,
}

/// Immutable camera configuration. Mutated only by configuration changes,
/// never by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: Uuid,
    pub name: String,
    pub source_kind: SourceKind,
    pub enabled: bool,
    /// Subset of detection types this camera reacts to. Empty, or containing
    /// only `Motion`, means "pass all".
    pub detection_filter: HashSet<DetectionType>,
    pub analysis_mode: AnalysisMode,
    pub prompt_override: Option<String>,
    pub is_doorbell: bool,
    pub motion_cooldown: Duration,
    /// Controller-side id for protect-style sources.
    pub protect_id: Option<String>,
    pub mac: Option<String>,
}

impl Camera {
    /// Default cooldown applied when none is configured.
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

    /// Whether this camera's filter set is in "pass-all" mode: empty, or
    /// exactly `{motion}`.
    #[must_use]
    pub fn is_pass_all(&self) -> bool {
        self.detection_filter.is_empty()
            || (self.detection_filter.len() == 1
                && self.detection_filter.contains(&DetectionType::Motion))
    }

    /// Whether `kind` passes this camera's detection filter.
    #[must_use]
    pub fn passes_filter(&self, kind: DetectionType) -> bool {
        self.is_pass_all() || self.detection_filter.contains(&kind)
    }
}

/// In-memory or on-disk evidence captured for one event, prior to AI dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// A single decoded frame buffer (RTSP/USB sources never have a clip).
    Frame(Vec<u8>),
    /// Path to a downloaded clip (protect-style sources only).
    ClipPath(PathBuf),
}

/// A queued unit of work: one camera state transition awaiting processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingEvent {
    pub camera_id: Uuid,
    pub camera_name: String,
    pub timestamp: DateTime<Utc>,
    pub detected_types: HashSet<DetectionType>,
    pub evidence: Option<Evidence>,
    pub fallback_reason: Option<String>,
}

/// One small JPEG frame retained alongside a stored event, with its offset
/// into the source clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFrame {
    pub jpeg: Vec<u8>,
    pub timestamp_ms: u64,
}

/// Persisted result of one pipeline pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub camera_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    /// 0-100, derived confidence (mirrors `ai_confidence` unless degraded).
    pub confidence: u8,
    /// 0-100, the AI's self-reported confidence, if it provided one.
    pub ai_confidence: Option<u8>,
    pub low_confidence: bool,
    pub vague_reason: Option<String>,
    pub objects_detected: Vec<DetectionType>,
    pub thumbnail_path: Option<PathBuf>,
    pub source_kind: SourceKind,
    pub smart_detection_type: DetectionType,
    pub is_doorbell_ring: bool,
    pub analysis_mode: Option<AnalysisMode>,
    pub frame_count_used: Option<u32>,
    /// Comma-joined `stage:reason` chain, e.g.
    /// `"video_native:no_video_providers_available,multi_frame:frame_extraction_failed"`.
    pub fallback_reason: Option<String>,
    pub provider_used: Option<String>,
    pub ai_cost: Option<f64>,
    pub delivery_carrier: Option<String>,
    pub key_frames: Option<Vec<KeyFrame>>,
    pub audio_transcription: Option<String>,
    pub reanalysis_count: u32,
    pub correlation_group_id: Option<Uuid>,
    pub description_retry_needed: bool,
    pub analysis_skipped_reason: Option<String>,
}

impl StoredEvent {
    /// Checks the cross-field invariants that don't require a
    /// database round-trip to verify.
    ///
    /// Returns `Err` with the first violated invariant, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        let is_terminal =
            self.description == AI_UNAVAILABLE || is_paused_sentinel(&self.description);

        if !is_terminal && self.provider_used.is_none() {
            return Err("non-terminal description must have provider_used set".to_string());
        }
        if !is_terminal && self.analysis_mode.is_none() {
            return Err("non-terminal description must have analysis_mode set".to_string());
        }

        match self.analysis_mode {
            Some(AnalysisMode::MultiFrame) => match self.frame_count_used {
                Some(n) if (3..=20).contains(&n) => {}
                _ => {
                    return Err(
                        "multi_frame analysis_mode requires frame_count_used in [3,20]"
                            .to_string(),
                    )
                }
            },
            Some(AnalysisMode::VideoNative) => {
                if self.frame_count_used.is_some() {
                    return Err("video_native analysis_mode must have frame_count_used = null"
                        .to_string());
                }
            }
            Some(AnalysisMode::SingleFrame) => {
                if self.frame_count_used != Some(1) {
                    return Err("single_frame analysis_mode must have frame_count_used = 1"
                        .to_string());
                }
            }
            None => {}
        }

        if self.description == AI_UNAVAILABLE && self.provider_used.is_some() {
            return Err("terminal-unavailable description must have provider_used = null"
                .to_string());
        }

        Ok(())
    }
}

/// The type of recurring subject an [`Entity`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Vehicle,
    Unknown,
}

/// Vehicle-specific attributes extracted from AI descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub color: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub signature: Option<String>,
}

impl VehicleAttributes {
    /// Whether this combination of fields is sufficient to derive a
    /// signature: `(color ∧ make) ∨ (make ∧ model)`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let has_color = self.color.is_some();
        let has_make = self.make.is_some();
        let has_model = self.model.is_some();
        (has_color && has_make) || (has_make && has_model)
    }

    /// Builds the canonical `color-make-model` signature from present parts.
    #[must_use]
    pub fn build_signature(&self) -> Option<String> {
        if !self.is_valid() {
            return None;
        }
        let parts: Vec<&str> = [self.color.as_deref(), self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        Some(parts.join("-").to_lowercase())
    }
}

/// A recognized recurring subject (person or vehicle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub display_name: Option<String>,
    pub embedding: Vec<f32>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u32,
    pub vip: bool,
    pub blocked: bool,
    pub vehicle: Option<VehicleAttributes>,
}

impl Entity {
    /// Checks the vehicle-signature invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(v) = &self.vehicle {
            if let Some(sig) = &v.signature {
                let expected = v.build_signature();
                if expected.as_deref() != Some(sig.as_str()) {
                    return Err("vehicle_signature does not match its parts".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Many-to-many link between an [`Entity`] and a [`StoredEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity_id: Uuid,
    pub event_id: Uuid,
    pub similarity_score: f32,
    pub created_at: DateTime<Utc>,
}

/// An offline-training-facing adjustment to the entity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    Assign,
    Unlink,
    MoveFrom,
    MoveTo,
    Merge,
}

/// Immutable record of a manual entity-graph mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAdjustment {
    pub id: Uuid,
    pub action: AdjustmentAction,
    pub old_entity_id: Option<Uuid>,
    pub new_entity_id: Option<Uuid>,
    pub event_id: Uuid,
    pub description_snapshot: String,
    pub created_at: DateTime<Utc>,
}

/// Process-wide configuration for one AI vision provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub position: usize,
    pub video_method: VideoMethod,
    pub tokens_per_image: u32,
    pub price_input_per_1k: f64,
    pub price_output_per_1k: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_camera() -> Camera {
        Camera {
            id: Uuid::new_v4(),
            name: "Driveway".to_string(),
            source_kind: SourceKind::Rtsp,
            enabled: true,
            detection_filter: HashSet::new(),
            analysis_mode: AnalysisMode::SingleFrame,
            prompt_override: None,
            is_doorbell: false,
            motion_cooldown: Camera::DEFAULT_COOLDOWN,
            protect_id: None,
            mac: None,
        }
    }

    #[test]
    fn empty_filter_is_pass_all() {
        let cam = sample_camera();
        assert!(cam.is_pass_all());
        assert!(cam.passes_filter(DetectionType::Vehicle));
    }

    #[test]
    fn motion_only_filter_is_pass_all() {
        let mut cam = sample_camera();
        cam.detection_filter.insert(DetectionType::Motion);
        assert!(cam.is_pass_all());
        assert!(cam.passes_filter(DetectionType::Package));
    }

    #[test]
    fn non_trivial_filter_rejects_other_types() {
        let mut cam = sample_camera();
        cam.detection_filter.insert(DetectionType::Person);
        assert!(!cam.is_pass_all());
        assert!(cam.passes_filter(DetectionType::Person));
        assert!(!cam.passes_filter(DetectionType::Vehicle));
    }

    #[test]
    fn vehicle_signature_requires_color_and_make_or_make_and_model() {
        let color_only = VehicleAttributes {
            color: Some("white".to_string()),
            make: None,
            model: None,
            signature: None,
        };
        assert!(!color_only.is_valid());
        assert_eq!(color_only.build_signature(), None);

        let color_and_make = VehicleAttributes {
            color: Some("white".to_string()),
            make: Some("toyota".to_string()),
            model: None,
            signature: None,
        };
        assert!(color_and_make.is_valid());
        assert_eq!(
            color_and_make.build_signature(),
            Some("white-toyota".to_string())
        );

        let make_and_model = VehicleAttributes {
            color: None,
            make: Some("toyota".to_string()),
            model: Some("camry".to_string()),
            signature: None,
        };
        assert!(make_and_model.is_valid());
        assert_eq!(
            make_and_model.build_signature(),
            Some("toyota-camry".to_string())
        );
    }

    #[test]
    fn terminal_unavailable_event_is_valid_without_provider() {
        let event = StoredEvent {
            id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            description: AI_UNAVAILABLE.to_string(),
            confidence: 0,
            ai_confidence: None,
            low_confidence: true,
            vague_reason: None,
            objects_detected: vec![],
            thumbnail_path: None,
            source_kind: SourceKind::Protect,
            smart_detection_type: DetectionType::Motion,
            is_doorbell_ring: false,
            analysis_mode: None,
            frame_count_used: None,
            fallback_reason: Some("single_frame:ai_failed".to_string()),
            provider_used: None,
            ai_cost: None,
            delivery_carrier: None,
            key_frames: None,
            audio_transcription: None,
            reanalysis_count: 0,
            correlation_group_id: None,
            description_retry_needed: true,
            analysis_skipped_reason: None,
        };
        assert!(event.check_invariants().is_ok());
    }

    #[test]
    fn non_terminal_event_without_provider_is_invalid() {
        let mut event_template = StoredEvent {
            id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            description: "A person walking.".to_string(),
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
        };
        assert!(event_template.check_invariants().is_ok());

        event_template.provider_used = None;
        assert!(event_template.check_invariants().is_err());
    }

    #[test]
    fn multi_frame_requires_frame_count_in_range() {
        let mut event = StoredEvent {
            id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            description: "A van pulls in.".to_string(),
            confidence: 70,
            ai_confidence: Some(70),
            low_confidence: false,
            vague_reason: None,
            objects_detected: vec![DetectionType::Vehicle],
            thumbnail_path: None,
            source_kind: SourceKind::Protect,
            smart_detection_type: DetectionType::Vehicle,
            is_doorbell_ring: false,
            analysis_mode: Some(AnalysisMode::MultiFrame),
            frame_count_used: Some(2),
            fallback_reason: None,
            provider_used: Some("claude".to_string()),
            ai_cost: Some(0.001),
            delivery_carrier: None,
            key_frames: None,
            audio_transcription: None,
            reanalysis_count: 0,
            correlation_group_id: None,
            description_retry_needed: false,
            analysis_skipped_reason: None,
        };
        assert!(event.check_invariants().is_err());
        event.frame_count_used = Some(5);
        assert!(event.check_invariants().is_ok());
    }

    #[test]
    fn paused_sentinel_detection() {
        assert!(is_paused_sentinel(&ai_paused_description("daily_limit")));
        assert!(!is_paused_sentinel(AI_UNAVAILABLE));
    }
}
