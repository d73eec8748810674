//! Loaded-particle cache reused across builds of the same source.
//!
//! Entries are stamped with the generation current at insertion. Callers bump
//! the generation with [`ParticleCache::invalidate`] whenever the source data
//! changes (new frame, edited particles); stale entries are never returned.

use std::sync::atomic::{AtomicU64, Ordering};

use frost_geom::Aabb;
use frost_particles::transforms::LoadMode;
use frost_particles::{ChannelMap, ParticleArray};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub generation: u64,
    pub particles: usize,
}

/// What a cached load was made with.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheKey {
    pub channels: ChannelMap,
    pub fraction: f64,
    pub load_mode: LoadMode,
    pub culling_box: Option<Aabb>,
}

impl CacheKey {
    /// A full load satisfies any full request; a partial load only the identical request.
    fn satisfies(&self, want: &CacheKey) -> bool {
        if self.channels != want.channels || self.culling_box != want.culling_box {
            return false;
        }
        if want.fraction < 1.0 {
            self.fraction == want.fraction && self.load_mode == want.load_mode
        } else {
            self.fraction >= 1.0
        }
    }
}

struct Entry {
    key: CacheKey,
    generation: u64,
    particles: ParticleArray,
}

#[derive(Default)]
pub struct ParticleCache {
    entry: Option<Entry>,
    generation: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ParticleCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks every cached load stale and drops it.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.clear();
    }

    pub fn clear(&mut self) {
        if self.entry.take().is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_current(&self, key: &CacheKey) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.generation == self.generation && e.key.satisfies(key))
    }

    pub fn get(&self, key: &CacheKey) -> Option<&ParticleArray> {
        if self.is_current(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.entry.as_ref().map(|e| &e.particles)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Replaces the cached load.
    pub fn insert(&mut self, key: CacheKey, particles: ParticleArray) {
        self.clear();
        log::debug!(
            "particle cache stored {} particles at generation {}",
            particles.len(),
            self.generation
        );
        self.entry = Some(Entry {
            key,
            generation: self.generation,
            particles,
        });
    }

    pub fn stats(&self) -> ParticleCacheStats {
        ParticleCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            generation: self.generation,
            particles: self.entry.as_ref().map_or(0, |e| e.particles.len()),
        }
    }
}
