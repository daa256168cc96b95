//! Turns a raw camera state transition into a set of canonical detection
//! types, then filters it against the owning camera's configuration before
//! it's allowed to reach the queue.

use std::collections::HashSet;

use nightwatch_core::model::{Camera, DetectionType, SourceKind};

/// Boolean flags carried on a raw camera state update, plus whatever
/// "active smart-detect types" the source already reports directly.
#[derive(Debug, Clone, Default)]
pub struct RawDetectionState {
    pub is_motion_currently_detected: bool,
    pub is_person_currently_detected: bool,
    pub is_vehicle_currently_detected: bool,
    pub is_animal_currently_detected: bool,
    pub is_package_currently_detected: bool,
    pub is_ring_event: bool,
    pub active_smart_detect_types: HashSet<DetectionType>,
}

/// Unions the boolean flags with `active_smart_detect_types` into the
/// canonical label set. Doorbell-only ring events are gated on
/// `is_ring_event` rather than a flag-derived type.
#[must_use]
pub fn extract_detected_types(state: &RawDetectionState) -> HashSet<DetectionType> {
    let mut types = state.active_smart_detect_types.clone();
    if state.is_motion_currently_detected {
        types.insert(DetectionType::Motion);
    }
    if state.is_person_currently_detected {
        types.insert(DetectionType::Person);
    }
    if state.is_vehicle_currently_detected {
        types.insert(DetectionType::Vehicle);
    }
    if state.is_animal_currently_detected {
        types.insert(DetectionType::Animal);
    }
    if state.is_package_currently_detected {
        types.insert(DetectionType::Package);
    }
    if state.is_ring_event {
        types.insert(DetectionType::Ring);
    }
    types
}

/// Maps one controller-side smart-detect key to its canonical label.
/// Unrecognized keys are ignored by [`parse_smart_detect_keys`].
#[must_use]
pub fn smart_detect_label(key: &str) -> Option<DetectionType> {
    match key {
        "motion" => Some(DetectionType::Motion),
        "person" | "face" => Some(DetectionType::Person),
        "vehicle" | "licensePlate" => Some(DetectionType::Vehicle),
        "package" => Some(DetectionType::Package),
        "animal" => Some(DetectionType::Animal),
        "ring" => Some(DetectionType::Ring),
        _ => None,
    }
}

/// Canonicalizes the keys of a controller's `last_smart_detect_event_ids`
/// map into detection types, dropping anything unrecognized.
#[must_use]
pub fn parse_smart_detect_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> HashSet<DetectionType> {
    keys.into_iter().filter_map(smart_detect_label).collect()
}

/// Why an incoming state transition never reached the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    NoDetectedTypes,
    CameraNotFound,
    CameraDisabled,
    WrongSourceKind,
    FilteredOut,
}

/// Looks up `camera`, checks it's enabled and of the expected source kind,
/// then narrows `types` to the ones that pass its detection filter.
///
/// Returns the camera and the passing subset, or the first reason the
/// event was discarded.
pub fn filter_event<'a>(
    camera: Option<&'a Camera>,
    expected_source: SourceKind,
    types: &HashSet<DetectionType>,
) -> Result<(&'a Camera, HashSet<DetectionType>), DiscardReason> {
    if types.is_empty() {
        return Err(DiscardReason::NoDetectedTypes);
    }
    let camera = camera.ok_or(DiscardReason::CameraNotFound)?;
    if !camera.enabled {
        return Err(DiscardReason::CameraDisabled);
    }
    if camera.source_kind != expected_source {
        return Err(DiscardReason::WrongSourceKind);
    }
    let passing: HashSet<DetectionType> =
        types.iter().copied().filter(|t| camera.passes_filter(*t)).collect();
    if passing.is_empty() {
        return Err(DiscardReason::FilteredOut);
    }
    Ok((camera, passing))
}
