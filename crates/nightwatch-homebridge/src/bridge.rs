//! The sensor state machine: one active/inactive flag per `(camera, kind)`
//! pair, auto-reset on a shared timer wheel rather than one task per
//! sensor.
//!
//! Every trigger bumps a per-key generation counter before scheduling its
//! reset entry. When the wheel pops an entry it discards it silently if the
//! generation has moved on — that's what makes "cancel the old timer, start
//! a new one" cheap: there's nothing to remove from the heap, just a stale
//! entry to ignore.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::key::SensorKey;

#[derive(Debug, Default, Clone, Copy)]
struct SensorRecord {
    active: bool,
    first_set_at: Option<Instant>,
}

struct TimerEntry {
    deadline: Instant,
    generation: u64,
    key: SensorKey,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

/// Stateful fan-out target for camera sensor triggers: motion, occupancy,
/// vehicle, animal, package (generic and per-carrier). Doorbell presses are
/// handled separately as they carry no state.
#[derive(Default)]
pub struct SensorBridge {
    states: Mutex<HashMap<SensorKey, SensorRecord>>,
    generations: Mutex<HashMap<SensorKey, u64>>,
    heap: Mutex<BinaryHeap<Reverse<TimerEntry>>>,
    notify: Notify,
    doorbell_presses: Mutex<HashMap<Uuid, u64>>,
}

impl SensorBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers `key` active, cancelling any pending reset and scheduling a
    /// new one `reset_after` from now. If the sensor has been continuously
    /// active since longer than `max_duration`, it is force-cleared instead
    /// — `max_duration` is checked against the time of its *first* trigger
    /// in this active streak, not refreshed by each retrigger.
    pub fn trigger(&self, key: SensorKey, reset_after: Duration, max_duration: Option<Duration>) {
        let now = Instant::now();
        let mut states = self.states.lock();
        let record = states.entry(key.clone()).or_default();

        if record.active {
            if let Some(max) = max_duration {
                let elapsed = now.saturating_duration_since(record.first_set_at.unwrap_or(now));
                if elapsed >= max {
                    record.active = false;
                    record.first_set_at = None;
                    self.bump_generation(&key);
                    warn!(camera_id = %key.camera_id, kind = ?key.kind, "max sensor duration reached, forcing clear");
                    return;
                }
            }
        } else {
            record.first_set_at = Some(now);
        }
        record.active = true;
        drop(states);

        let generation = self.bump_generation(&key);
        let deadline = now + reset_after;
        self.heap.lock().push(Reverse(TimerEntry {
            deadline,
            generation,
            key: key.clone(),
        }));
        self.notify.notify_one();
        info!(camera_id = %key.camera_id, kind = ?key.kind, "sensor triggered");
    }

    fn bump_generation(&self, key: &SensorKey) -> u64 {
        let mut generations = self.generations.lock();
        let next = generations.get(key).copied().unwrap_or(0) + 1;
        generations.insert(key.clone(), next);
        next
    }

    #[must_use]
    pub fn is_active(&self, key: &SensorKey) -> bool {
        self.states.lock().get(key).is_some_and(|r| r.active)
    }

    /// Records a doorbell press. Stateless: no active flag, no reset timer.
    /// Returns the running per-camera press count for observability.
    pub fn trigger_doorbell(&self, camera_id: Uuid) -> u64 {
        let mut presses = self.doorbell_presses.lock();
        let count = presses.entry(camera_id).or_insert(0);
        *count += 1;
        info!(%camera_id, presses = *count, "doorbell pressed");
        *count
    }

    #[must_use]
    pub fn doorbell_presses(&self, camera_id: Uuid) -> u64 {
        self.doorbell_presses.lock().get(&camera_id).copied().unwrap_or(0)
    }

    /// Drives the timer wheel. Runs until the `SensorBridge` is dropped;
    /// callers spawn this once on a long-lived task.
    pub async fn run(&self) {
        loop {
            let next_deadline = self.heap.lock().peek().map(|Reverse(e)| e.deadline);
            match next_deadline {
                None => self.notify.notified().await,
                Some(deadline) => {
                    tokio::select! {
                        () = sleep_until(deadline) => self.process_due(),
                        () = self.notify.notified() => {}
                    }
                }
            }
        }
    }

    fn process_due(&self) {
        let now = Instant::now();
        loop {
            let due = {
                let mut heap = self.heap.lock();
                match heap.peek() {
                    Some(Reverse(entry)) if entry.deadline <= now => heap.pop().map(|Reverse(e)| e),
                    _ => None,
                }
            };
            let Some(entry) = due else { break };

            let current_generation = self.generations.lock().get(&entry.key).copied().unwrap_or(0);
            if current_generation != entry.generation {
                continue; // superseded by a later trigger; stale entry, ignore
            }

            let mut states = self.states.lock();
            if let Some(record) = states.get_mut(&entry.key) {
                record.active = false;
                record.first_set_at = None;
            }
            drop(states);
            info!(camera_id = %entry.key.camera_id, kind = ?entry.key.kind, "sensor auto-reset");
        }
    }

    /// Clears every sensor and drops all pending timers. Called on
    /// shutdown so nothing fires after the pipeline has stopped.
    pub fn clear_all(&self) {
        self.states.lock().clear();
        self.generations.lock().clear();
        self.heap.lock().clear();
        self.doorbell_presses.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SensorKind;

    fn key(kind: SensorKind) -> SensorKey {
        SensorKey::new(Uuid::new_v4(), kind)
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_activates_and_auto_resets_after_timeout() {
        let bridge = SensorBridge::new();
        let key = key(SensorKind::Motion);
        bridge.trigger(key.clone(), Duration::from_secs(30), None);
        assert!(bridge.is_active(&key));

        tokio::time::advance(Duration::from_secs(31)).await;
        bridge.process_due();
        assert!(!bridge.is_active(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn run_drives_the_reset_without_manual_pumping() {
        let bridge = std::sync::Arc::new(SensorBridge::new());
        let key = key(SensorKind::Vehicle);
        let driver = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.run().await }
        });

        bridge.trigger(key.clone(), Duration::from_secs(5), None);
        assert!(bridge.is_active(&key));

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(!bridge.is_active(&key));
        driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_before_timeout_extends_the_window() {
        let bridge = SensorBridge::new();
        let key = key(SensorKind::Occupancy);

        bridge.trigger(key.clone(), Duration::from_secs(10), None);
        tokio::time::advance(Duration::from_secs(8)).await;
        bridge.trigger(key.clone(), Duration::from_secs(10), None);
        tokio::time::advance(Duration::from_secs(8)).await;
        bridge.process_due();
        assert!(bridge.is_active(&key), "retrigger should have extended the reset window");

        tokio::time::advance(Duration::from_secs(3)).await;
        bridge.process_due();
        assert!(!bridge.is_active(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn max_duration_forces_clear_on_continuous_retrigger() {
        let bridge = SensorBridge::new();
        let key = key(SensorKind::Motion);
        let reset = Duration::from_secs(5);
        let max = Duration::from_secs(12);

        bridge.trigger(key.clone(), reset, Some(max));
        tokio::time::advance(Duration::from_secs(4)).await;
        bridge.trigger(key.clone(), reset, Some(max));
        tokio::time::advance(Duration::from_secs(4)).await;
        bridge.trigger(key.clone(), reset, Some(max));
        tokio::time::advance(Duration::from_secs(5)).await;
        // elapsed since first trigger is now 13s, past the 12s cap.
        bridge.trigger(key.clone(), reset, Some(max));

        assert!(!bridge.is_active(&key));
    }

    #[test]
    fn doorbell_press_has_no_active_state() {
        let bridge = SensorBridge::new();
        let camera_id = Uuid::new_v4();
        assert_eq!(bridge.trigger_doorbell(camera_id), 1);
        assert_eq!(bridge.trigger_doorbell(camera_id), 2);
    }

    #[test]
    fn clear_all_resets_every_sensor_and_timer() {
        let bridge = SensorBridge::new();
        let key = key(SensorKind::Package);
        bridge.trigger(key.clone(), Duration::from_secs(60), None);
        assert!(bridge.is_active(&key));

        bridge.clear_all();
        assert!(!bridge.is_active(&key));
    }
}
