//! In-memory embedding cache, loaded once from the backing store and
//! invalidated whenever the entity graph changes underneath it.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::similarity::EMBEDDING_DIM;

/// Holds one embedding per entity, keyed by entity id. Entries with the
/// wrong dimensionality are skipped at load time and logged once rather
/// than silently padded or truncated.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: HashMap<Uuid, Vec<f32>>,
    loaded: bool,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replaces the cache contents from a fresh load of the backing store.
    /// Returns the number of entries skipped for being empty or carrying
    /// the wrong dimension.
    pub fn load<I>(&mut self, entities: I) -> usize
    where
        I: IntoIterator<Item = (Uuid, Vec<f32>)>,
    {
        self.entries.clear();
        let mut skipped = 0usize;
        for (id, embedding) in entities {
            if embedding.is_empty() || embedding.len() != EMBEDDING_DIM {
                skipped += 1;
                warn!(
                    entity_id = %id,
                    length = embedding.len(),
                    expected = EMBEDDING_DIM,
                    "entity has invalid embedding, skipping"
                );
                continue;
            }
            self.entries.insert(id, embedding);
        }
        self.loaded = true;
        skipped
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, id: Uuid, embedding: Vec<f32>) {
        self.entries.insert(id, embedding);
    }

    pub fn remove(&mut self, id: Uuid) {
        self.entries.remove(&id);
    }

    /// Snapshot of `(entity_id, embedding)` pairs in stable iteration
    /// order, suitable for a batch similarity pass.
    #[must_use]
    pub fn entries(&self) -> (Vec<Uuid>, Vec<Vec<f32>>) {
        let ids: Vec<Uuid> = self.entries.keys().copied().collect();
        let embeddings: Vec<Vec<f32>> = ids.iter().map(|id| self.entries[id].clone()).collect();
        (ids, embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim_vec(value: f32) -> Vec<f32> {
        vec![value; EMBEDDING_DIM]
    }

    #[test]
    fn load_skips_wrong_dimension_entries() {
        let mut cache = EmbeddingCache::new();
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let skipped = cache.load(vec![(id_a, dim_vec(1.0)), (id_b, vec![1.0, 2.0])]);
        assert_eq!(skipped, 1);
        assert!(cache.is_loaded());
        let (ids, _) = cache.entries();
        assert_eq!(ids, vec![id_a]);
    }

    #[test]
    fn load_skips_empty_embeddings() {
        let mut cache = EmbeddingCache::new();
        let skipped = cache.load(vec![(Uuid::new_v4(), vec![])]);
        assert_eq!(skipped, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_clears_and_unmarks_loaded() {
        let mut cache = EmbeddingCache::new();
        cache.load(vec![(Uuid::new_v4(), dim_vec(0.5))]);
        cache.invalidate();
        assert!(!cache.is_loaded());
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_and_remove_update_entries() {
        let mut cache = EmbeddingCache::new();
        let id = Uuid::new_v4();
        cache.insert(id, dim_vec(0.1));
        assert!(!cache.is_empty());
        cache.remove(id);
        assert!(cache.is_empty());
    }
}
