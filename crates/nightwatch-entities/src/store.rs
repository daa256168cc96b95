//! Persistence contract for the entity graph.
//!
//! [`EntityStore`] is implemented by an in-memory default here and by a
//! SQLite-backed repository where the crate is wired into the rest of the
//! pipeline. Everything in [`crate::matcher`] is written against the trait
//! so it can run against either.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nightwatch_core::model::{Entity, EntityAdjustment, EntityEvent};

use crate::error::Result;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// All entities with their embeddings, for a fresh cache load.
    async fn load_all(&self) -> Result<Vec<Entity>>;

    async fn get(&self, id: Uuid) -> Result<Option<Entity>>;

    async fn insert(&self, entity: Entity) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Finds a vehicle entity by its exact signature string.
    async fn find_by_vehicle_signature(&self, signature: &str) -> Result<Option<Uuid>>;

    /// Bumps `occurrence_count` by one and sets `last_seen` to `seen_at`.
    /// Returns the new occurrence count.
    async fn touch(&self, id: Uuid, seen_at: DateTime<Utc>) -> Result<u32>;

    /// Applies `delta` to `occurrence_count`, clamped so it never drops
    /// below zero. Returns the new occurrence count.
    async fn adjust_occurrence(&self, id: Uuid, delta: i32) -> Result<u32>;

    async fn link(&self, link: EntityEvent) -> Result<()>;

    async fn get_link_for_event(&self, event_id: Uuid) -> Result<Option<EntityEvent>>;

    async fn remove_link(&self, entity_id: Uuid, event_id: Uuid) -> Result<bool>;

    async fn retarget_link(
        &self,
        event_id: Uuid,
        new_entity_id: Uuid,
        score: f32,
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Moves every link from `from_entity` to `to_entity`, returning how
    /// many were moved.
    async fn retarget_all_links(
        &self,
        from_entity: Uuid,
        to_entity: Uuid,
        moved_at: DateTime<Utc>,
    ) -> Result<u32>;

    async fn record_adjustment(&self, adjustment: EntityAdjustment) -> Result<()>;

    /// Description snapshot for an event, used on `EntityAdjustment`
    /// records. `None` if the event carries no description yet.
    async fn event_description(&self, event_id: Uuid) -> Result<Option<String>>;
}

#[async_trait]
impl<T: EntityStore + ?Sized> EntityStore for std::sync::Arc<T> {
    async fn load_all(&self) -> Result<Vec<Entity>> {
        (**self).load_all().await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Entity>> {
        (**self).get(id).await
    }

    async fn insert(&self, entity: Entity) -> Result<()> {
        (**self).insert(entity).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        (**self).delete(id).await
    }

    async fn find_by_vehicle_signature(&self, signature: &str) -> Result<Option<Uuid>> {
        (**self).find_by_vehicle_signature(signature).await
    }

    async fn touch(&self, id: Uuid, seen_at: DateTime<Utc>) -> Result<u32> {
        (**self).touch(id, seen_at).await
    }

    async fn adjust_occurrence(&self, id: Uuid, delta: i32) -> Result<u32> {
        (**self).adjust_occurrence(id, delta).await
    }

    async fn link(&self, link: EntityEvent) -> Result<()> {
        (**self).link(link).await
    }

    async fn get_link_for_event(&self, event_id: Uuid) -> Result<Option<EntityEvent>> {
        (**self).get_link_for_event(event_id).await
    }

    async fn remove_link(&self, entity_id: Uuid, event_id: Uuid) -> Result<bool> {
        (**self).remove_link(entity_id, event_id).await
    }

    async fn retarget_link(
        &self,
        event_id: Uuid,
        new_entity_id: Uuid,
        score: f32,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        (**self).retarget_link(event_id, new_entity_id, score, created_at).await
    }

    async fn retarget_all_links(
        &self,
        from_entity: Uuid,
        to_entity: Uuid,
        moved_at: DateTime<Utc>,
    ) -> Result<u32> {
        (**self).retarget_all_links(from_entity, to_entity, moved_at).await
    }

    async fn record_adjustment(&self, adjustment: EntityAdjustment) -> Result<()> {
        (**self).record_adjustment(adjustment).await
    }

    async fn event_description(&self, event_id: Uuid) -> Result<Option<String>> {
        (**self).event_description(event_id).await
    }
}

pub mod memory {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::{async_trait, DateTime, Entity, EntityAdjustment, EntityEvent, EntityStore, Result, Utc, Uuid};

    /// Reference implementation of [`EntityStore`] backed by in-process
    /// maps, used in tests and anywhere persistence isn't wired up yet.
    #[derive(Default)]
    pub struct InMemoryEntityStore {
        entities: Mutex<HashMap<Uuid, Entity>>,
        links: Mutex<Vec<EntityEvent>>,
        adjustments: Mutex<Vec<EntityAdjustment>>,
        event_descriptions: Mutex<HashMap<Uuid, String>>,
    }

    impl InMemoryEntityStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a description so `event_description` can resolve it for
        /// adjustment snapshots, mirroring a real event table lookup.
        pub fn set_event_description(&self, event_id: Uuid, description: impl Into<String>) {
            self.event_descriptions.lock().insert(event_id, description.into());
        }

        #[must_use]
        pub fn adjustments(&self) -> Vec<EntityAdjustment> {
            self.adjustments.lock().clone()
        }
    }

    #[async_trait]
    impl EntityStore for InMemoryEntityStore {
        async fn load_all(&self) -> Result<Vec<Entity>> {
            Ok(self.entities.lock().values().cloned().collect())
        }

        async fn get(&self, id: Uuid) -> Result<Option<Entity>> {
            Ok(self.entities.lock().get(&id).cloned())
        }

        async fn insert(&self, entity: Entity) -> Result<()> {
            self.entities.lock().insert(entity.id, entity);
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> Result<()> {
            self.entities.lock().remove(&id);
            Ok(())
        }

        async fn find_by_vehicle_signature(&self, signature: &str) -> Result<Option<Uuid>> {
            Ok(self
                .entities
                .lock()
                .values()
                .find(|e| {
                    e.vehicle
                        .as_ref()
                        .and_then(|v| v.signature.as_deref())
                        .is_some_and(|s| s == signature)
                })
                .map(|e| e.id))
        }

        async fn touch(&self, id: Uuid, seen_at: DateTime<Utc>) -> Result<u32> {
            let mut entities = self.entities.lock();
            let entity = entities
                .get_mut(&id)
                .ok_or(crate::error::Error::NotFound(id))?;
            entity.occurrence_count += 1;
            entity.last_seen = seen_at;
            Ok(entity.occurrence_count)
        }

        async fn adjust_occurrence(&self, id: Uuid, delta: i32) -> Result<u32> {
            let mut entities = self.entities.lock();
            let entity = entities
                .get_mut(&id)
                .ok_or(crate::error::Error::NotFound(id))?;
            let next = i64::from(entity.occurrence_count) + i64::from(delta);
            entity.occurrence_count = next.max(0) as u32;
            Ok(entity.occurrence_count)
        }

        async fn link(&self, link: EntityEvent) -> Result<()> {
            self.links.lock().push(link);
            Ok(())
        }

        async fn get_link_for_event(&self, event_id: Uuid) -> Result<Option<EntityEvent>> {
            Ok(self.links.lock().iter().find(|l| l.event_id == event_id).cloned())
        }

        async fn remove_link(&self, entity_id: Uuid, event_id: Uuid) -> Result<bool> {
            let mut links = self.links.lock();
            let before = links.len();
            links.retain(|l| !(l.entity_id == entity_id && l.event_id == event_id));
            Ok(links.len() != before)
        }

        async fn retarget_link(
            &self,
            event_id: Uuid,
            new_entity_id: Uuid,
            score: f32,
            created_at: DateTime<Utc>,
        ) -> Result<()> {
            let mut links = self.links.lock();
            if let Some(link) = links.iter_mut().find(|l| l.event_id == event_id) {
                link.entity_id = new_entity_id;
                link.similarity_score = score;
                link.created_at = created_at;
            }
            Ok(())
        }

        async fn retarget_all_links(
            &self,
            from_entity: Uuid,
            to_entity: Uuid,
            moved_at: DateTime<Utc>,
        ) -> Result<u32> {
            let mut links = self.links.lock();
            let mut moved = 0u32;
            for link in links.iter_mut().filter(|l| l.entity_id == from_entity) {
                link.entity_id = to_entity;
                link.created_at = moved_at;
                moved += 1;
            }
            Ok(moved)
        }

        async fn record_adjustment(&self, adjustment: EntityAdjustment) -> Result<()> {
            self.adjustments.lock().push(adjustment);
            Ok(())
        }

        async fn event_description(&self, event_id: Uuid) -> Result<Option<String>> {
            Ok(self.event_descriptions.lock().get(&event_id).cloned())
        }
    }
}
