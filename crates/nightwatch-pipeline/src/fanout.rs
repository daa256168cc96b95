//! Post-event fan-out: detached, failure-isolated tasks spawned after an
//! event is persisted. Every task is wrapped so a failure increments a
//! per-category counter and is otherwise dropped — never retried, never
//! propagated to the worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nightwatch_core::model::{Camera, DetectionType, EntityType, StoredEvent};
use nightwatch_entities::extract_vehicle_entity;
use nightwatch_entities::store::EntityStore;
use nightwatch_homebridge::{extract_carrier, SensorKey, SensorKind};

use crate::bus::{topics, CountsPayload, EventPayload, LastEventPayload, MessageBus};
use crate::core::PipelineCore;
use crate::error::Result;
use crate::notify::{Notification, Notifier};
use crate::repo::{EmbeddingRepository, EventRepository};

/// Per-category failure counters for fan-out tasks.
#[derive(Debug, Default)]
pub struct FanoutCounters {
    pub sensors: AtomicU64,
    pub bus: AtomicU64,
    pub notify: AtomicU64,
    pub embedding: AtomicU64,
    pub entity: AtomicU64,
    pub cost_alert: AtomicU64,
    pub anomaly: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutSnapshot {
    pub sensors: u64,
    pub bus: u64,
    pub notify: u64,
    pub embedding: u64,
    pub entity: u64,
    pub cost_alert: u64,
    pub anomaly: u64,
}

impl FanoutCounters {
    #[must_use]
    pub fn snapshot(&self) -> FanoutSnapshot {
        FanoutSnapshot {
            sensors: self.sensors.load(Ordering::Relaxed),
            bus: self.bus.load(Ordering::Relaxed),
            notify: self.notify.load(Ordering::Relaxed),
            embedding: self.embedding.load(Ordering::Relaxed),
            entity: self.entity.load(Ordering::Relaxed),
            cost_alert: self.cost_alert.load(Ordering::Relaxed),
            anomaly: self.anomaly.load(Ordering::Relaxed),
        }
    }
}

/// How an event's subject relates to the known-entity graph after the
/// recognition stage ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionStatus {
    /// Matched a named entity.
    Known,
    /// Matched no entity above threshold; a new one may have been created.
    Stranger,
    /// Recognition didn't run (disabled, no embedding, or wrong object class).
    Unknown,
}

/// Spawns every fan-out task for one persisted event and returns the
/// handles — callers other than tests drop them (fire-and-forget).
pub fn spawn_all(
    core: Arc<PipelineCore>,
    event: StoredEvent,
    camera: Camera,
    embedding: Option<Vec<f32>>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(6);

    handles.push(spawn_guarded("sensors", &core, |c| { c.fanout_counters.sensors.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let event = event.clone();
        async move { trigger_sensors(&core, &event).await }
    }));

    handles.push(spawn_guarded("bus_event", &core, |c| { c.fanout_counters.bus.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let event = event.clone();
        async move { publish_event(&core, &event).await }
    }));

    handles.push(spawn_guarded("bus_status", &core, |c| { c.fanout_counters.bus.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let event = event.clone();
        async move { publish_status(&core, &event).await }
    }));

    if let Some(embedding) = embedding.clone() {
        handles.push(spawn_guarded("embedding", &core, |c| { c.fanout_counters.embedding.fetch_add(1, Ordering::Relaxed); }, {
            let core = core.clone();
            let event_id = event.id;
            async move { core.embeddings.store(event_id, embedding).await }
        }));
    }

    handles.push(spawn_guarded("entity", &core, |c| { c.fanout_counters.entity.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let event = event.clone();
        async move { recognize_and_notify(&core, &event, embedding).await }
    }));

    handles.push(spawn_guarded("cost_alert", &core, |c| { c.fanout_counters.cost_alert.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let camera = camera.clone();
        async move { cost_threshold_alerts(&core, &camera).await }
    }));

    handles.push(spawn_guarded("anomaly", &core, |c| { c.fanout_counters.anomaly.fetch_add(1, Ordering::Relaxed); }, {
        let core = core.clone();
        let event = event.clone();
        async move { score_anomaly(&core, &event) }
    }));

    handles
}

fn spawn_guarded<F>(
    name: &'static str,
    core: &Arc<PipelineCore>,
    on_failure: impl Fn(&PipelineCore) + Send + 'static,
    fut: F,
) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let core = core.clone();
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            warn!(task = name, error = %err, "fan-out task failed, signal dropped");
            on_failure(&core);
        }
    })
}

/// Fan-out item: smart-home sensor triggers. Motion fires on every event;
/// the typed sensors fire only when the detection type matches; the
/// doorbell press is stateless.
async fn trigger_sensors(core: &PipelineCore, event: &StoredEvent) -> Result<()> {
    let s = &core.settings;
    let camera_id = event.camera_id;

    core.bridge.trigger(
        SensorKey::new(camera_id, SensorKind::Motion),
        s.motion_reset,
        Some(s.motion_max),
    );

    match event.smart_detection_type {
        DetectionType::Person => core.bridge.trigger(
            SensorKey::new(camera_id, SensorKind::Occupancy),
            s.occupancy_reset,
            Some(s.occupancy_max),
        ),
        DetectionType::Vehicle => core.bridge.trigger(
            SensorKey::new(camera_id, SensorKind::Vehicle),
            s.vehicle_reset,
            None,
        ),
        DetectionType::Animal => core.bridge.trigger(
            SensorKey::new(camera_id, SensorKind::Animal),
            s.animal_reset,
            None,
        ),
        DetectionType::Package => {
            core.bridge.trigger(
                SensorKey::new(camera_id, SensorKind::Package),
                s.package_reset,
                None,
            );
            if s.per_carrier_sensors {
                if let Some(carrier) = event
                    .delivery_carrier
                    .as_deref()
                    .or_else(|| extract_carrier(&event.description))
                {
                    core.bridge.trigger(
                        SensorKey::new(camera_id, SensorKind::Carrier(carrier.to_string())),
                        s.package_reset,
                        None,
                    );
                }
            }
        }
        DetectionType::Ring => {
            core.bridge.trigger_doorbell(camera_id);
        }
        DetectionType::Motion => {}
    }
    Ok(())
}

/// Fan-out item: full event payload on the per-camera bus topic. Skipped
/// entirely when the bus is down.
async fn publish_event(core: &PipelineCore, event: &StoredEvent) -> Result<()> {
    if !core.bus.is_connected() {
        debug!("bus disconnected, skipping event publish");
        return Ok(());
    }
    let url = core.thumbs.event_url(event.id, event.timestamp);
    let payload = serde_json::to_string(&EventPayload::from_event(event, url))
        .map_err(|e| crate::error::Error::BusFailed(e.to_string()))?;
    core.bus
        .publish(&topics::event(&core.settings.bus_root, event.camera_id), payload)
        .await
}

/// Fan-out item: the three status signals — last_event summary, activity
/// ON, and refreshed today/this-week counts.
async fn publish_status(core: &PipelineCore, event: &StoredEvent) -> Result<()> {
    if !core.bus.is_connected() {
        debug!("bus disconnected, skipping status publish");
        return Ok(());
    }
    let root = &core.settings.bus_root;

    let last_event = serde_json::to_string(&LastEventPayload {
        id: event.id,
        timestamp: event.timestamp,
        description: event.description.clone(),
        smart_detection_type: event.smart_detection_type.as_tag().to_string(),
    })
    .map_err(|e| crate::error::Error::BusFailed(e.to_string()))?;
    core.bus.publish(&topics::last_event(root, event.camera_id), last_event).await?;

    core.bus
        .publish(&topics::activity(root, event.camera_id), "ON".to_string())
        .await?;

    let now = event.timestamp;
    let events_today = core.events.count_since(event.camera_id, now - ChronoDuration::days(1)).await?;
    let events_this_week = core.events.count_since(event.camera_id, now - ChronoDuration::weeks(1)).await?;
    let counts = serde_json::to_string(&CountsPayload { events_today, events_this_week })
        .map_err(|e| crate::error::Error::BusFailed(e.to_string()))?;
    core.bus.publish(&topics::counts(root, event.camera_id), counts).await
}

fn entity_type_for(event: &StoredEvent) -> Option<EntityType> {
    if event.objects_detected.contains(&DetectionType::Person) {
        Some(EntityType::Person)
    } else if event.objects_detected.contains(&DetectionType::Vehicle) {
        Some(EntityType::Vehicle)
    } else {
        None
    }
}

/// Fan-out item: entity recognition, alert enrichment and the push
/// notification. These run as one task because the notification's
/// priority and suppression depend on the recognition outcome.
async fn recognize_and_notify(
    core: &PipelineCore,
    event: &StoredEvent,
    embedding: Option<Vec<f32>>,
) -> Result<()> {
    let terminal = event.provider_used.is_none();
    let mut status = RecognitionStatus::Unknown;
    let mut display_name: Option<String> = None;
    let mut vip = false;
    let mut blocked = false;

    let entity_kind = entity_type_for(event);
    let recognition_enabled = match entity_kind {
        Some(EntityType::Person) => core.settings.face_recognition_enabled,
        Some(EntityType::Vehicle) => core.settings.vehicle_recognition_enabled,
        _ => false,
    };

    if !terminal && recognition_enabled {
        if let (Some(embedding), Some(kind)) = (embedding, entity_kind) {
            let threshold = match kind {
                EntityType::Vehicle => core.settings.vehicle_match_threshold,
                _ => core.settings.person_match_threshold,
            };
            let allowed_create = match kind {
                EntityType::Person => core.settings.auto_create_persons,
                EntityType::Vehicle => core.settings.auto_create_vehicles,
                EntityType::Unknown => false,
            };
            // Without auto-create, only proceed when the subject already
            // exists — by embedding, or for vehicles by exact signature.
            let proceed = if allowed_create {
                true
            } else if core
                .entities
                .match_entity_only(&embedding, threshold)
                .await
                .unwrap_or(None)
                .is_some()
            {
                true
            } else if kind == EntityType::Vehicle {
                match extract_vehicle_entity(&event.description).and_then(|v| v.signature) {
                    Some(signature) => core
                        .entities
                        .store()
                        .find_by_vehicle_signature(&signature)
                        .await
                        .unwrap_or(None)
                        .is_some(),
                    None => false,
                }
            } else {
                false
            };
            if !proceed {
                status = RecognitionStatus::Stranger;
                return finish_notification(core, event, status, None, false, false).await;
            }

            let outcome = match kind {
                EntityType::Vehicle => {
                    core.entities
                        .match_or_create_vehicle(
                            event.id,
                            embedding,
                            Some(&event.description),
                            event.timestamp,
                            threshold,
                        )
                        .await
                }
                _ => {
                    core.entities
                        .match_or_create(event.id, embedding, kind, event.timestamp, threshold)
                        .await
                }
            };

            match outcome {
                Err(err) => {
                    warn!(event_id = %event.id, error = %err, "entity matching failed");
                }
                Ok(matched) => {
                    status = if matched.is_new {
                        RecognitionStatus::Stranger
                    } else {
                        RecognitionStatus::Known
                    };
                    if let Ok(Some(entity)) = core.entities.store().get(matched.entity_id).await {
                        display_name = entity.display_name.clone();
                        vip = entity.vip;
                        blocked = entity.blocked;
                    }

                    // Alert enrichment: rewrite the stored description with
                    // the entity's name so downstream surfaces show who it
                    // was, not just what it looked like.
                    if let Some(name) = &display_name {
                        let enriched = format!("{name}: {}", event.description);
                        if let Err(err) = core.events.update_description(event.id, enriched).await {
                            warn!(event_id = %event.id, error = %err, "description enrichment failed");
                        }
                    }
                    info!(event_id = %event.id, entity_id = %matched.entity_id, ?status, "entity recognition complete");
                }
            }
        }
    }

    finish_notification(core, event, status, display_name, vip, blocked).await
}

/// Sends (or suppresses) the per-event push once the recognition outcome
/// is known.
async fn finish_notification(
    core: &PipelineCore,
    event: &StoredEvent,
    status: RecognitionStatus,
    display_name: Option<String>,
    vip: bool,
    blocked: bool,
) -> Result<()> {
    if blocked {
        info!(event_id = %event.id, "blocked entity, notification suppressed");
        return Ok(());
    }
    debug!(event_id = %event.id, ?status, "dispatching event notification");

    let body = match &display_name {
        Some(name) => format!("{name}: {}", event.description),
        None => event.description.clone(),
    };
    let mut notification = Notification::for_camera(
        event.camera_id,
        core.cameras.get(&event.camera_id).map_or("camera", |c| c.name.as_str()),
        body,
    )
    .with_thumbnail(core.thumbs.event_url(event.id, event.timestamp));
    if vip {
        notification = notification.high_priority();
    }
    core.notifier.push(notification).await
}

/// Fan-out item: soft cost-threshold alerts, one per threshold per day.
async fn cost_threshold_alerts(core: &PipelineCore, camera: &Camera) -> Result<()> {
    for threshold in core.costs.newly_crossed_thresholds(Utc::now()) {
        let notification = Notification::for_camera(
            camera.id,
            "AI cost alert",
            format!("Daily AI spend crossed {threshold}% of the configured cap."),
        );
        core.notifier.push(notification).await?;
    }
    Ok(())
}

/// Fan-out item: activity-baseline update and anomaly scoring.
fn score_anomaly(core: &PipelineCore, event: &StoredEvent) -> Result<()> {
    let score = core.baseline.score_and_observe(event.camera_id, event.timestamp);
    if score > 0 {
        info!(event_id = %event.id, camera_id = %event.camera_id, score, "unusual activity for this hour");
    }
    Ok(())
}

/// Picks the single detection type recorded as the event's
/// `smart_detection_type`, most specific first.
#[must_use]
pub fn primary_detection_type(types: &std::collections::HashSet<DetectionType>) -> DetectionType {
    const PRIORITY: [DetectionType; 6] = [
        DetectionType::Ring,
        DetectionType::Package,
        DetectionType::Person,
        DetectionType::Vehicle,
        DetectionType::Animal,
        DetectionType::Motion,
    ];
    PRIORITY
        .into_iter()
        .find(|t| types.contains(t))
        .unwrap_or(DetectionType::Motion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn primary_detection_type_prefers_specific_types() {
        let types = HashSet::from([DetectionType::Motion, DetectionType::Person]);
        assert_eq!(primary_detection_type(&types), DetectionType::Person);

        let types = HashSet::from([DetectionType::Person, DetectionType::Ring]);
        assert_eq!(primary_detection_type(&types), DetectionType::Ring);

        let types = HashSet::new();
        assert_eq!(primary_detection_type(&types), DetectionType::Motion);
    }

    #[test]
    fn fanout_counters_snapshot_reads_all_categories() {
        let counters = FanoutCounters::default();
        counters.sensors.fetch_add(2, Ordering::Relaxed);
        counters.bus.fetch_add(1, Ordering::Relaxed);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.sensors, 2);
        assert_eq!(snapshot.bus, 1);
        assert_eq!(snapshot.entity, 0);
    }
}
