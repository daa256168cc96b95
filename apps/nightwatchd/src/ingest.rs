//! Stdin ingestion: one JSON object per line, each a camera state
//! snapshot. Malformed lines are dropped at debug level, matching how the
//! pipeline treats unparseable controller messages.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use nightwatch_core::model::DetectionType;
use nightwatch_pipeline::parsing::{parse_smart_detect_keys, RawDetectionState};
use nightwatch_pipeline::EventHandler;

#[derive(Debug, Deserialize)]
struct StateLine {
    protect_id: String,
    #[serde(default)]
    is_motion_currently_detected: bool,
    #[serde(default)]
    is_person_currently_detected: bool,
    #[serde(default)]
    is_vehicle_currently_detected: bool,
    #[serde(default)]
    is_animal_currently_detected: bool,
    #[serde(default)]
    is_package_currently_detected: bool,
    #[serde(default)]
    is_ring_event: bool,
    /// Keys of the controller's `last_smart_detect_event_ids` map.
    #[serde(default)]
    smart_detect_types: Vec<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl StateLine {
    fn into_state(self) -> (String, RawDetectionState, DateTime<Utc>) {
        let smart: HashSet<DetectionType> =
            parse_smart_detect_keys(self.smart_detect_types.iter().map(String::as_str));
        let state = RawDetectionState {
            is_motion_currently_detected: self.is_motion_currently_detected,
            is_person_currently_detected: self.is_person_currently_detected,
            is_vehicle_currently_detected: self.is_vehicle_currently_detected,
            is_animal_currently_detected: self.is_animal_currently_detected,
            is_package_currently_detected: self.is_package_currently_detected,
            is_ring_event: self.is_ring_event,
            active_smart_detect_types: smart,
        };
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        (self.protect_id, state, timestamp)
    }
}

/// Reads state lines from stdin until EOF, offering each to the handler.
pub async fn read_stdin(handler: Arc<EventHandler>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Err(err) => {
                debug!(error = %err, "stdin read failed, stopping ingestion");
                break;
            }
            Ok(None) => {
                info!("stdin closed, ingestion stopped");
                break;
            }
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<StateLine>(line) {
                    Err(err) => debug!(error = %err, "malformed state line dropped"),
                    Ok(parsed) => {
                        let (protect_id, state, timestamp) = parsed.into_state();
                        let outcome = handler.handle_protect_state(&protect_id, &state, timestamp);
                        debug!(protect_id, ?outcome, "state line handled");
                    }
                }
            }
        }
    }
}
