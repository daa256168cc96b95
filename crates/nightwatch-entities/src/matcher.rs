//! Recurring-visitor matching: the orchestration layer tying the embedding
//! cache, cosine similarity and vehicle signatures together over an
//! [`EntityStore`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nightwatch_core::model::{AdjustmentAction, Entity, EntityAdjustment, EntityEvent, EntityType, VehicleAttributes};

use crate::cache::EmbeddingCache;
use crate::error::{Error, Result};
use crate::similarity::{batch_cosine_similarity, best_match};
use crate::store::EntityStore;
use crate::vehicle::extract_vehicle_entity;

/// Default similarity threshold used when a caller doesn't supply its own.
/// Callers normally pass `Config::DEFAULT_PERSON_THRESHOLD` or
/// `Config::DEFAULT_VEHICLE_THRESHOLD` instead of relying on this.
pub const DEFAULT_THRESHOLD: f32 = 0.75;

/// Similarity score recorded for a vehicle matched by signature rather than
/// by embedding — high confidence, but not a perfect 1.0 manual assignment.
pub const VEHICLE_SIGNATURE_SCORE: f32 = 0.95;

/// Similarity score recorded for a manual assignment or move.
pub const MANUAL_ASSIGNMENT_SCORE: f32 = 1.0;

/// Outcome of a match-or-create call.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u32,
    pub similarity_score: f32,
    pub is_new: bool,
}

/// What `assign_event` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignAction {
    /// The event had no prior entity link.
    Assigned,
    /// The event was relinked from a different entity.
    Moved,
    /// The event was already linked to this entity; nothing changed.
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignOutcome {
    pub action: AssignAction,
    pub entity_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub primary_entity_id: Uuid,
    pub secondary_entity_id: Uuid,
    pub events_moved: u32,
}

/// Matches events to recurring entities (people or vehicles), or creates a
/// new entity when nothing clears the similarity threshold.
pub struct EntityMatcher<S: EntityStore> {
    store: S,
    cache: Mutex<EmbeddingCache>,
}

impl<S: EntityStore> EntityMatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Mutex::new(EmbeddingCache::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn ensure_cache_loaded(&self) -> Result<()> {
        if self.cache.lock().is_loaded() {
            return Ok(());
        }
        let entities = self.store.load_all().await?;
        let pairs = entities.into_iter().map(|e| (e.id, e.embedding));
        let skipped = self.cache.lock().load(pairs);
        if skipped > 0 {
            warn!(skipped, "skipped entities with invalid embeddings while loading cache");
        }
        Ok(())
    }

    fn best_cached_match(&self, embedding: &[f32], threshold: f32) -> Option<(Uuid, f32)> {
        let (ids, embeddings) = self.cache.lock().entries();
        if ids.is_empty() {
            return None;
        }
        let similarities = batch_cosine_similarity(embedding, &embeddings);
        best_match(&similarities, threshold).map(|(idx, score)| (ids[idx], score))
    }

    async fn create_new_entity(
        &self,
        event_id: Uuid,
        embedding: Vec<f32>,
        entity_type: EntityType,
        event_timestamp: DateTime<Utc>,
        vehicle: Option<VehicleAttributes>,
    ) -> Result<MatchOutcome> {
        let entity = Entity {
            id: Uuid::new_v4(),
            entity_type,
            display_name: None,
            embedding: embedding.clone(),
            first_seen: event_timestamp,
            last_seen: event_timestamp,
            occurrence_count: 1,
            vip: false,
            blocked: false,
            vehicle,
        };
        let entity_id = entity.id;
        self.store.insert(entity).await?;
        self.store
            .link(EntityEvent {
                entity_id,
                event_id,
                similarity_score: MANUAL_ASSIGNMENT_SCORE,
                created_at: event_timestamp,
            })
            .await?;
        self.cache.lock().insert(entity_id, embedding);

        info!(%entity_id, %event_id, "created new entity");
        Ok(MatchOutcome {
            entity_id,
            entity_type,
            first_seen: event_timestamp,
            last_seen: event_timestamp,
            occurrence_count: 1,
            similarity_score: MANUAL_ASSIGNMENT_SCORE,
            is_new: true,
        })
    }

    async fn update_existing_entity(
        &self,
        entity_id: Uuid,
        event_id: Uuid,
        similarity_score: f32,
        event_timestamp: DateTime<Utc>,
    ) -> Result<MatchOutcome> {
        let occurrence_count = self.store.touch(entity_id, event_timestamp).await?;
        self.store
            .link(EntityEvent {
                entity_id,
                event_id,
                similarity_score,
                created_at: event_timestamp,
            })
            .await?;
        let entity = self.store.get(entity_id).await?.ok_or(Error::NotFound(entity_id))?;

        info!(%entity_id, %event_id, similarity_score, occurrence_count, "matched existing entity");
        Ok(MatchOutcome {
            entity_id,
            entity_type: entity.entity_type,
            first_seen: entity.first_seen,
            last_seen: event_timestamp,
            occurrence_count,
            similarity_score,
            is_new: false,
        })
    }

    /// Matches `embedding` against the cached entity graph, creating a new
    /// entity when nothing clears `threshold`. Always links the event to
    /// the resulting entity.
    pub async fn match_or_create(
        &self,
        event_id: Uuid,
        embedding: Vec<f32>,
        entity_type: EntityType,
        event_timestamp: DateTime<Utc>,
        threshold: f32,
    ) -> Result<MatchOutcome> {
        self.ensure_cache_loaded().await?;

        if self.cache.lock().is_empty() {
            return self
                .create_new_entity(event_id, embedding, entity_type, event_timestamp, None)
                .await;
        }

        match self.best_cached_match(&embedding, threshold) {
            Some((entity_id, score)) => {
                self.update_existing_entity(entity_id, event_id, score, event_timestamp).await
            }
            None => {
                self.create_new_entity(event_id, embedding, entity_type, event_timestamp, None)
                    .await
            }
        }
    }

    /// Read-only lookup used for prompt context before an event is stored.
    /// Never creates entities or links and never mutates occurrence counts.
    pub async fn match_entity_only(&self, embedding: &[f32], threshold: f32) -> Result<Option<MatchOutcome>> {
        self.ensure_cache_loaded().await?;

        let Some((entity_id, score)) = self.best_cached_match(embedding, threshold) else {
            debug!("no entity match found for context lookup");
            return Ok(None);
        };

        let Some(entity) = self.store.get(entity_id).await? else {
            warn!(%entity_id, "entity present in cache but missing from store");
            return Ok(None);
        };

        Ok(Some(MatchOutcome {
            entity_id,
            entity_type: entity.entity_type,
            first_seen: entity.first_seen,
            last_seen: entity.last_seen,
            occurrence_count: entity.occurrence_count,
            similarity_score: score,
            is_new: false,
        }))
    }

    /// Matches or creates a vehicle entity. Tries an exact signature match
    /// first — a cheap, cache-free lookup — before falling back to the
    /// general embedding path.
    pub async fn match_or_create_vehicle(
        &self,
        event_id: Uuid,
        embedding: Vec<f32>,
        description: Option<&str>,
        event_timestamp: DateTime<Utc>,
        threshold: f32,
    ) -> Result<MatchOutcome> {
        let vehicle_info = description.and_then(extract_vehicle_entity);

        if let Some(info) = &vehicle_info {
            if let Some(signature) = &info.signature {
                if let Some(entity_id) = self.store.find_by_vehicle_signature(signature).await? {
                    debug!(%entity_id, signature, "vehicle matched by signature");
                    return self
                        .update_existing_entity(entity_id, event_id, VEHICLE_SIGNATURE_SCORE, event_timestamp)
                        .await;
                }
            }
        }

        self.ensure_cache_loaded().await?;

        if self.cache.lock().is_empty() {
            return self
                .create_new_entity(event_id, embedding, EntityType::Vehicle, event_timestamp, vehicle_info)
                .await;
        }

        match self.best_cached_match(&embedding, threshold) {
            Some((entity_id, score)) => {
                self.update_existing_entity(entity_id, event_id, score, event_timestamp).await
            }
            None => {
                self.create_new_entity(event_id, embedding, EntityType::Vehicle, event_timestamp, vehicle_info)
                    .await
            }
        }
    }

    /// Assigns or moves an event onto `entity_id`, recording one or two
    /// [`EntityAdjustment`] rows depending on whether it was already linked.
    pub async fn assign_event(&self, event_id: Uuid, entity_id: Uuid, at: DateTime<Utc>) -> Result<AssignOutcome> {
        if self.store.get(entity_id).await?.is_none() {
            return Err(Error::NotFound(entity_id));
        }
        let description = self.store.event_description(event_id).await?.unwrap_or_default();
        let existing = self.store.get_link_for_event(event_id).await?;

        let action = match existing {
            Some(link) if link.entity_id == entity_id => {
                return Ok(AssignOutcome {
                    action: AssignAction::NoOp,
                    entity_id,
                });
            }
            Some(link) => {
                let old_entity_id = link.entity_id;
                self.store
                    .record_adjustment(EntityAdjustment {
                        id: Uuid::new_v4(),
                        action: AdjustmentAction::MoveFrom,
                        old_entity_id: Some(old_entity_id),
                        new_entity_id: Some(entity_id),
                        event_id,
                        description_snapshot: description.clone(),
                        created_at: at,
                    })
                    .await?;
                self.store.adjust_occurrence(old_entity_id, -1).await?;
                self.store.retarget_link(event_id, entity_id, MANUAL_ASSIGNMENT_SCORE, at).await?;
                self.store
                    .record_adjustment(EntityAdjustment {
                        id: Uuid::new_v4(),
                        action: AdjustmentAction::MoveTo,
                        old_entity_id: Some(old_entity_id),
                        new_entity_id: Some(entity_id),
                        event_id,
                        description_snapshot: description,
                        created_at: at,
                    })
                    .await?;
                AssignAction::Moved
            }
            None => {
                self.store
                    .link(EntityEvent {
                        entity_id,
                        event_id,
                        similarity_score: MANUAL_ASSIGNMENT_SCORE,
                        created_at: at,
                    })
                    .await?;
                self.store
                    .record_adjustment(EntityAdjustment {
                        id: Uuid::new_v4(),
                        action: AdjustmentAction::Assign,
                        old_entity_id: None,
                        new_entity_id: Some(entity_id),
                        event_id,
                        description_snapshot: description,
                        created_at: at,
                    })
                    .await?;
                AssignAction::Assigned
            }
        };

        self.store.touch(entity_id, at).await?;
        info!(%event_id, %entity_id, ?action, "event assigned");
        Ok(AssignOutcome { action, entity_id })
    }

    /// Unlinks an event from an entity, decrementing its occurrence count
    /// (never below zero) and recording the adjustment. Returns `false`
    /// when no such link exists.
    pub async fn unlink_event(&self, entity_id: Uuid, event_id: Uuid) -> Result<bool> {
        if self.store.get(entity_id).await?.is_none() {
            return Ok(false);
        }
        let description = self.store.event_description(event_id).await?.unwrap_or_default();
        let removed = self.store.remove_link(entity_id, event_id).await?;
        if !removed {
            return Ok(false);
        }

        self.store
            .record_adjustment(EntityAdjustment {
                id: Uuid::new_v4(),
                action: AdjustmentAction::Unlink,
                old_entity_id: Some(entity_id),
                new_entity_id: None,
                event_id,
                description_snapshot: description,
                created_at: Utc::now(),
            })
            .await?;
        self.store.adjust_occurrence(entity_id, -1).await?;

        info!(%entity_id, %event_id, "event unlinked from entity");
        Ok(true)
    }

    /// Merges `secondary` into `primary`: every event link on `secondary`
    /// is retargeted, occurrence counts combine, and the wider first/last
    /// seen window is kept. `secondary` is then deleted.
    pub async fn merge_entities(&self, primary_id: Uuid, secondary_id: Uuid, at: DateTime<Utc>) -> Result<MergeOutcome> {
        if primary_id == secondary_id {
            return Err(Error::SelfMerge(primary_id));
        }
        let mut primary = self.store.get(primary_id).await?.ok_or(Error::NotFound(primary_id))?;
        let secondary = self.store.get(secondary_id).await?.ok_or(Error::NotFound(secondary_id))?;

        let events_moved = self.store.retarget_all_links(secondary_id, primary_id, at).await?;

        primary.occurrence_count += secondary.occurrence_count;
        if secondary.last_seen > primary.last_seen {
            primary.last_seen = secondary.last_seen;
        }
        if secondary.first_seen < primary.first_seen {
            primary.first_seen = secondary.first_seen;
        }
        self.store.insert(primary).await?;
        self.store.delete(secondary_id).await?;
        self.cache.lock().remove(secondary_id);

        info!(%primary_id, %secondary_id, events_moved, "entities merged");
        Ok(MergeOutcome {
            primary_entity_id: primary_id,
            secondary_entity_id: secondary_id,
            events_moved,
        })
    }
}
