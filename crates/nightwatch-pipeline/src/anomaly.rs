//! Per-camera activity baseline and anomaly scoring.
//!
//! The baseline is a 24-bucket hour-of-day histogram per camera, updated
//! incrementally as events arrive. The anomaly score for an event asks how
//! unusual activity is at that hour relative to the camera's own history:
//! an event in a historically dead hour scores high, one in a busy hour
//! scores zero.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Below this many observed events a camera has no meaningful baseline and
/// every event scores zero.
const MIN_BASELINE_EVENTS: u64 = 20;

#[derive(Debug, Clone, Copy, Default)]
struct CameraBaseline {
    hour_counts: [u64; 24],
    total: u64,
}

#[derive(Default)]
pub struct ActivityBaseline {
    cameras: Mutex<HashMap<Uuid, CameraBaseline>>,
}

impl ActivityBaseline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores `timestamp` against the camera's current baseline, *then*
    /// folds the event in. Scoring first keeps the event from diluting its
    /// own anomaly.
    #[must_use]
    pub fn score_and_observe(&self, camera_id: Uuid, timestamp: DateTime<Utc>) -> u8 {
        let hour = timestamp.hour() as usize;
        let mut cameras = self.cameras.lock();
        let baseline = cameras.entry(camera_id).or_default();

        let score = Self::score(baseline, hour);
        baseline.hour_counts[hour] += 1;
        baseline.total += 1;
        score
    }

    fn score(baseline: &CameraBaseline, hour: usize) -> u8 {
        if baseline.total < MIN_BASELINE_EVENTS {
            return 0;
        }
        let expected_per_hour = baseline.total as f64 / 24.0;
        let observed = baseline.hour_counts[hour] as f64;
        let ratio = observed / expected_per_hour;
        if ratio >= 1.0 {
            0
        } else {
            ((1.0 - ratio) * 100.0).round() as u8
        }
    }

    #[must_use]
    pub fn total_events(&self, camera_id: Uuid) -> u64 {
        self.cameras.lock().get(&camera_id).map_or(0, |b| b.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn sparse_history_scores_zero() {
        let baseline = ActivityBaseline::new();
        let camera_id = Uuid::new_v4();
        assert_eq!(baseline.score_and_observe(camera_id, at_hour(3)), 0);
        assert_eq!(baseline.total_events(camera_id), 1);
    }

    #[test]
    fn event_in_a_dead_hour_scores_high_once_baseline_exists() {
        let baseline = ActivityBaseline::new();
        let camera_id = Uuid::new_v4();
        // Build a daytime-heavy history: 30 events at 14:00.
        for _ in 0..30 {
            let _ = baseline.score_and_observe(camera_id, at_hour(14));
        }
        // 03:00 has never seen activity.
        let score = baseline.score_and_observe(camera_id, at_hour(3));
        assert_eq!(score, 100);
    }

    #[test]
    fn event_in_the_busiest_hour_scores_zero() {
        let baseline = ActivityBaseline::new();
        let camera_id = Uuid::new_v4();
        for _ in 0..30 {
            let _ = baseline.score_and_observe(camera_id, at_hour(14));
        }
        assert_eq!(baseline.score_and_observe(camera_id, at_hour(14)), 0);
    }

    #[test]
    fn cameras_keep_independent_baselines() {
        let baseline = ActivityBaseline::new();
        let busy = Uuid::new_v4();
        let quiet = Uuid::new_v4();
        for _ in 0..30 {
            let _ = baseline.score_and_observe(busy, at_hour(14));
        }
        // The quiet camera has no history, so it scores zero regardless.
        assert_eq!(baseline.score_and_observe(quiet, at_hour(3)), 0);
    }
}
