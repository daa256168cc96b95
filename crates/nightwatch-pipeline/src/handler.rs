//! Ingestion adapters: turn raw source messages into typed
//! [`ProcessingEvent`]s and offer them to the processor.
//!
//! Parsing and filtering live in [`crate::parsing`]; this module is the
//! glue that resolves the camera, applies its filter set and hands the
//! surviving event to [`EventProcessor::enqueue`], where the cooldown
//! gate runs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use nightwatch_core::model::{DetectionType, Evidence, ProcessingEvent, SourceKind};

use crate::parsing::{extract_detected_types, filter_event, DiscardReason, RawDetectionState};
use crate::processor::{EnqueueOutcome, EventProcessor};

/// What the handler did with one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Enqueued(EnqueueOutcome),
    Discarded(DiscardReason),
}

pub struct EventHandler {
    processor: Arc<EventProcessor>,
}

impl EventHandler {
    #[must_use]
    pub fn new(processor: Arc<EventProcessor>) -> Self {
        Self { processor }
    }

    /// Handles one protect-controller state snapshot, keyed by the
    /// controller-side camera id.
    pub fn handle_protect_state(
        &self,
        protect_id: &str,
        state: &RawDetectionState,
        timestamp: DateTime<Utc>,
    ) -> HandleOutcome {
        let types = extract_detected_types(state);
        let core = self.processor.core();
        let camera = core.camera_by_protect_id(protect_id);
        match filter_event(camera, SourceKind::Protect, &types) {
            Err(reason) => {
                debug!(protect_id, ?reason, "protect state discarded");
                HandleOutcome::Discarded(reason)
            }
            Ok((camera, passing)) => self.enqueue(camera.id, &camera.name, passing, None, timestamp),
        }
    }

    /// Handles one decoded frame from an RTSP or USB source, which carries
    /// its detected types directly and never has a clip.
    pub fn handle_frame(
        &self,
        camera_id: Uuid,
        source_kind: SourceKind,
        jpeg: Vec<u8>,
        types: HashSet<DetectionType>,
        timestamp: DateTime<Utc>,
    ) -> HandleOutcome {
        let core = self.processor.core();
        let camera = core.camera(camera_id);
        match filter_event(camera, source_kind, &types) {
            Err(reason) => {
                debug!(%camera_id, ?reason, "frame event discarded");
                HandleOutcome::Discarded(reason)
            }
            Ok((camera, passing)) => self.enqueue(
                camera.id,
                &camera.name,
                passing,
                Some(Evidence::Frame(jpeg)),
                timestamp,
            ),
        }
    }

    fn enqueue(
        &self,
        camera_id: Uuid,
        camera_name: &str,
        detected_types: HashSet<DetectionType>,
        evidence: Option<Evidence>,
        timestamp: DateTime<Utc>,
    ) -> HandleOutcome {
        let event = ProcessingEvent {
            camera_id,
            camera_name: camera_name.to_string(),
            timestamp,
            detected_types,
            evidence,
            fallback_reason: None,
        };
        HandleOutcome::Enqueued(self.processor.enqueue(event))
    }
}
