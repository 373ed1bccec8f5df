//! Pipeline Cache
//!
//! Device-level owner of every [`PipelineObject`], keyed by [`PipelineKey`].
//! Entries are insert-if-absent and never mutated in place: a draw whose
//! features change simply produces a different key.
//!
//! The cache is unbounded by default. With a capacity set, [`end_frame`]
//! evicts least-recently-used pipelines down to the bound, never touching
//! one that was looked up during the frame being ended.
//!
//! [`end_frame`]: PipelineCache::end_frame

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::object::PipelineObject;
use super::pipeline_key::PipelineKey;
use crate::renderer::core::device::GpuDevice;

#[derive(Debug)]
struct CachedPipeline {
    pipeline: Arc<PipelineObject>,
    last_used_frame: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserted: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: FxHashMap<PipelineKey, CachedPipeline>,
    capacity: Option<usize>,
    stats: PipelineCacheStats,
}

impl PipelineCache {
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity,
            stats: PipelineCacheStats::default(),
        }
    }

    /// Looks up `key` and marks it used in `frame`.
    pub fn get(&mut self, key: &PipelineKey, frame: u64) -> Option<Arc<PipelineObject>> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used_frame = frame;
                self.stats.hits += 1;
                log::trace!("Pipeline cache hit: {key}");
                Some(Arc::clone(&entry.pipeline))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Registers `pipeline` under its own key unless one is already there.
    /// Returns the pipeline that ends up cached.
    pub fn insert(&mut self, pipeline: PipelineObject, frame: u64) -> Arc<PipelineObject> {
        let key = pipeline.key().clone();
        let entry = self.entries.entry(key).or_insert_with(|| {
            self.stats.inserted += 1;
            CachedPipeline {
                pipeline: Arc::new(pipeline),
                last_used_frame: frame,
            }
        });
        entry.last_used_frame = frame;
        Arc::clone(&entry.pipeline)
    }

    #[must_use]
    pub fn contains(&self, key: &PipelineKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    #[must_use]
    pub fn stats(&self) -> PipelineCacheStats {
        self.stats
    }

    /// Applies the LRU bound. Pipelines used in `frame` are never evicted.
    pub fn end_frame<D: GpuDevice>(&mut self, device: &mut D, frame: u64) {
        let Some(capacity) = self.capacity else {
            return;
        };
        if self.entries.len() <= capacity {
            return;
        }

        let mut candidates: Vec<(u64, PipelineKey)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.last_used_frame < frame)
            .map(|(k, e)| (e.last_used_frame, k.clone()))
            .collect();
        candidates.sort_by_key(|(used, _)| *used);

        let excess = self.entries.len() - capacity;
        for (_, key) in candidates.into_iter().take(excess) {
            if let Some(entry) = self.entries.remove(&key) {
                device.destroy_render_pipeline(entry.pipeline.id());
                self.stats.evicted += 1;
                log::debug!("Evicted pipeline {key}");
            }
        }
    }

    /// Destroys every cached pipeline.
    pub fn clear<D: GpuDevice>(&mut self, device: &mut D) {
        for (_, entry) in self.entries.drain() {
            device.destroy_render_pipeline(entry.pipeline.id());
        }
    }
}
