//! Identifies one stateful sensor on the bridge.

use nightwatch_core::model::DetectionType;
use uuid::Uuid;

/// Which typed sensor on a camera a trigger or reset applies to.
///
/// `Doorbell` is intentionally absent: a doorbell ring is a stateless press
/// event with no auto-reset timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Motion,
    Occupancy,
    Vehicle,
    Animal,
    Package,
    /// A per-carrier package sensor, keyed by normalized carrier name
    /// (`fedex`, `ups`, `usps`, `amazon`, `dhl`).
    Carrier(String),
}

impl SensorKind {
    /// Maps a detection type to the sensor kind it fans out to. `Ring`
    /// has no entry: doorbell presses are handled as a stateless event,
    /// never as a `SensorKind`.
    #[must_use]
    pub fn for_detection(detection: DetectionType) -> Option<Self> {
        match detection {
            DetectionType::Motion => Some(SensorKind::Motion),
            DetectionType::Person => Some(SensorKind::Occupancy),
            DetectionType::Vehicle => Some(SensorKind::Vehicle),
            DetectionType::Animal => Some(SensorKind::Animal),
            DetectionType::Package => Some(SensorKind::Package),
            DetectionType::Ring => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorKey {
    pub camera_id: Uuid,
    pub kind: SensorKind,
}

impl SensorKey {
    #[must_use]
    pub fn new(camera_id: Uuid, kind: SensorKind) -> Self {
        Self { camera_id, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_person_vehicle_animal_package_map_to_sensors() {
        assert_eq!(SensorKind::for_detection(DetectionType::Motion), Some(SensorKind::Motion));
        assert_eq!(SensorKind::for_detection(DetectionType::Person), Some(SensorKind::Occupancy));
        assert_eq!(SensorKind::for_detection(DetectionType::Vehicle), Some(SensorKind::Vehicle));
        assert_eq!(SensorKind::for_detection(DetectionType::Animal), Some(SensorKind::Animal));
        assert_eq!(SensorKind::for_detection(DetectionType::Package), Some(SensorKind::Package));
    }

    #[test]
    fn ring_has_no_sensor_kind() {
        assert_eq!(SensorKind::for_detection(DetectionType::Ring), None);
    }
}
