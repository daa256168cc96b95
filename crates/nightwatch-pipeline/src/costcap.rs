//! Daily AI-spend tracking: the hard cap consulted before any dispatch and
//! the soft thresholds that fire one alert each as spend climbs.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::warn;

/// Soft alert thresholds, as percentages of the daily cap. Each fires at
/// most once per day.
const ALERT_THRESHOLDS: [u8; 3] = [50, 80, 95];

/// Reason tag stored on events skipped by the cap. Downstream treats it as
/// opaque.
pub const DAILY_LIMIT_REASON: &str = "daily_limit";

#[derive(Debug, Clone)]
struct DayState {
    day: NaiveDate,
    spent_usd: f64,
    alerted: Vec<u8>,
}

impl DayState {
    fn new(day: NaiveDate) -> Self {
        Self { day, spent_usd: 0.0, alerted: Vec::new() }
    }
}

/// Accumulates per-call AI cost against a configurable daily cap. All
/// methods take the current time so day rollover is testable.
pub struct CostTracker {
    daily_cap_usd: Option<f64>,
    state: Mutex<DayState>,
}

impl CostTracker {
    #[must_use]
    pub fn new(daily_cap_usd: Option<f64>) -> Self {
        Self {
            daily_cap_usd,
            state: Mutex::new(DayState::new(NaiveDate::MIN)),
        }
    }

    fn roll_over(&self, state: &mut DayState, now: DateTime<Utc>) {
        let today = now.date_naive();
        if state.day != today {
            *state = DayState::new(today);
        }
    }

    /// Adds one call's cost to today's total.
    pub fn record(&self, cost_usd: f64, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        state.spent_usd += cost_usd;
    }

    #[must_use]
    pub fn spent_today(&self, now: DateTime<Utc>) -> f64 {
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        state.spent_usd
    }

    /// Consulted before any AI dispatch. Returns the skip reason when the
    /// cap is active and exhausted.
    #[must_use]
    pub fn check_cap(&self, now: DateTime<Utc>) -> Option<&'static str> {
        let cap = self.daily_cap_usd?;
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        if state.spent_usd >= cap {
            warn!(spent = state.spent_usd, cap, "daily AI cost cap reached, pausing analysis");
            Some(DAILY_LIMIT_REASON)
        } else {
            None
        }
    }

    /// Soft thresholds newly crossed since the last check, each reported
    /// exactly once per day.
    #[must_use]
    pub fn newly_crossed_thresholds(&self, now: DateTime<Utc>) -> Vec<u8> {
        let Some(cap) = self.daily_cap_usd else {
            return Vec::new();
        };
        let mut state = self.state.lock();
        self.roll_over(&mut state, now);
        let pct_spent = state.spent_usd / cap * 100.0;

        let mut crossed = Vec::new();
        for threshold in ALERT_THRESHOLDS {
            if pct_spent >= f64::from(threshold) && !state.alerted.contains(&threshold) {
                state.alerted.push(threshold);
                crossed.push(threshold);
            }
        }
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn no_cap_means_never_gated() {
        let tracker = CostTracker::new(None);
        tracker.record(1_000_000.0, at(1, 0));
        assert_eq!(tracker.check_cap(at(1, 1)), None);
        assert!(tracker.newly_crossed_thresholds(at(1, 1)).is_empty());
    }

    #[test]
    fn cap_gates_once_spend_reaches_it() {
        let tracker = CostTracker::new(Some(1.0));
        assert_eq!(tracker.check_cap(at(1, 0)), None);
        tracker.record(0.6, at(1, 1));
        assert_eq!(tracker.check_cap(at(1, 2)), None);
        tracker.record(0.4, at(1, 3));
        assert_eq!(tracker.check_cap(at(1, 4)), Some(DAILY_LIMIT_REASON));
    }

    #[test]
    fn spend_resets_at_day_rollover() {
        let tracker = CostTracker::new(Some(1.0));
        tracker.record(2.0, at(1, 23));
        assert_eq!(tracker.check_cap(at(1, 23)), Some(DAILY_LIMIT_REASON));
        assert_eq!(tracker.check_cap(at(2, 0)), None);
        assert_eq!(tracker.spent_today(at(2, 0)), 0.0);
    }

    #[test]
    fn thresholds_fire_once_each_in_order() {
        let tracker = CostTracker::new(Some(1.0));
        tracker.record(0.55, at(1, 0));
        assert_eq!(tracker.newly_crossed_thresholds(at(1, 0)), vec![50]);
        assert!(tracker.newly_crossed_thresholds(at(1, 0)).is_empty());

        tracker.record(0.42, at(1, 1));
        assert_eq!(tracker.newly_crossed_thresholds(at(1, 1)), vec![80, 95]);
        assert!(tracker.newly_crossed_thresholds(at(1, 2)).is_empty());
    }
}
