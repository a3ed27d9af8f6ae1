//! In-memory memo of group rankings.
//!
//! Rankings depend only on the signal set, never on filters, so they are
//! keyed by generation id and grouping key. A new generation id is a cache
//! miss by construction; [`RankingCache::retain_generation`] drops the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::aggregate::{aggregate, GroupKey, GroupScore};
use crate::synth::Generation;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankingKey {
    pub generation_id: u64,
    pub group: GroupKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct RankingCache {
    entries: Mutex<HashMap<RankingKey, Arc<Vec<GroupScore>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RankingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranking of `generation` by `group`, computed on first use.
    pub fn get_or_compute(
        &self,
        generation: &Generation,
        group: GroupKey,
    ) -> Result<Arc<Vec<GroupScore>>, CacheError> {
        let key = RankingKey {
            generation_id: generation.id,
            group,
        };
        if let Some(hit) = self.with_entries(|entries| Ok(entries.get(&key).cloned()))? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(aggregate(&generation.signals, &generation.taxonomy, group));
        self.with_entries(|entries| {
            Ok(Arc::clone(
                entries.entry(key).or_insert_with(|| Arc::clone(&computed)),
            ))
        })
    }

    /// Drop every entry that does not belong to `generation_id`.
    pub fn retain_generation(&self, generation_id: u64) -> Result<(), CacheError> {
        self.with_entries(|entries| {
            entries.retain(|key, _| key.generation_id == generation_id);
            Ok(())
        })
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.with_entries(|entries| Ok(entries.len()))?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        })
    }

    fn with_entries<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&mut HashMap<RankingKey, Arc<Vec<GroupScore>>>) -> Result<R, CacheError>,
    {
        let mut guard = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{synthesize, GeneratorConfig};
    use crate::taxonomy::default_taxonomy;

    #[test]
    fn second_lookup_is_a_hit_returning_the_same_ranking() {
        let cache = RankingCache::new();
        let generation = synthesize(
            default_taxonomy(),
            &GeneratorConfig::default().with_count(300).with_seed(5),
        )
        .unwrap();

        let first = cache.get_or_compute(&generation, GroupKey::Segment).unwrap();
        let second = cache.get_or_compute(&generation, GroupKey::Segment).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats().unwrap();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn retain_drops_other_generations() {
        let cache = RankingCache::new();
        let config = GeneratorConfig::default().with_count(100).with_seed(5);
        let old = synthesize(default_taxonomy(), &config).unwrap();
        let new = synthesize(default_taxonomy(), &config).unwrap();

        cache.get_or_compute(&old, GroupKey::Job).unwrap();
        cache.get_or_compute(&new, GroupKey::Job).unwrap();
        cache.get_or_compute(&new, GroupKey::Cluster).unwrap();
        cache.retain_generation(new.id).unwrap();
        assert_eq!(cache.stats().unwrap().entries, 2);
    }
}
