//! Per-camera cooldown, consulted (and updated) at enqueue time so it
//! composes with the filter stage: one shared last-event timestamp per
//! camera across every detection type, preventing fan-in by multiple
//! smart-detect types on the same camera.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct CooldownTracker {
    last_event: Mutex<HashMap<Uuid, Instant>>,
}

impl CooldownTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `camera_id` is still within its cooldown window.
    #[must_use]
    pub fn is_in_cooldown(&self, camera_id: Uuid, cooldown: Duration) -> bool {
        self.last_event
            .lock()
            .get(&camera_id)
            .is_some_and(|last| last.elapsed() < cooldown)
    }

    /// Marks `camera_id` as having just produced an accepted event.
    pub fn mark_accepted(&self, camera_id: Uuid) {
        self.last_event.lock().insert(camera_id, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_camera_is_not_in_cooldown() {
        let tracker = CooldownTracker::new();
        assert!(!tracker.is_in_cooldown(Uuid::new_v4(), Duration::from_secs(60)));
    }

    #[test]
    fn accepted_event_starts_a_cooldown_window() {
        let tracker = CooldownTracker::new();
        let camera_id = Uuid::new_v4();
        tracker.mark_accepted(camera_id);
        assert!(tracker.is_in_cooldown(camera_id, Duration::from_secs(60)));
    }

    #[test]
    fn cooldown_expires_after_the_configured_duration() {
        let tracker = CooldownTracker::new();
        let camera_id = Uuid::new_v4();
        tracker.mark_accepted(camera_id);
        assert!(!tracker.is_in_cooldown(camera_id, Duration::from_millis(0)));
    }

    #[test]
    fn cooldown_is_shared_across_detection_types_for_one_camera() {
        let tracker = CooldownTracker::new();
        let camera_id = Uuid::new_v4();
        tracker.mark_accepted(camera_id);
        // A second, different-typed event for the same camera still sees
        // the cooldown from the first.
        assert!(tracker.is_in_cooldown(camera_id, Duration::from_secs(60)));
    }
}
