//! Materializer cache.
//!
//! Entries are keyed by [`ShapeKey`] and live until purged. Lookups take a
//! read lock; a miss compiles outside any lock and then inserts with
//! `entry().or_insert`, so callers racing on the same key all end up holding
//! the single materializer that won the slot. Failed compilations are never
//! stored.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::materializer::Materializer;
use crate::shape::{ShapeKey, Target};

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Process-shareable store of compiled materializers.
#[derive(Default)]
pub struct MaterializerCache {
    entries: RwLock<HashMap<ShapeKey, Arc<dyn Any + Send + Sync>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MaterializerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached materializer for `key`, compiling it on a miss.
    pub fn get_or_compile<T: 'static>(
        &self,
        key: ShapeKey,
        compile: impl FnOnce() -> Result<Materializer<T>>,
    ) -> Result<Materializer<T>> {
        if let Some(found) = self.get::<T>(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(target_type = key.target.name(), start = key.start, "Materializer cache hit");
            return Ok(found);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = compile()?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let slot = entries
            .entry(key)
            .or_insert_with(|| Arc::new(compiled));
        slot.downcast_ref::<Materializer<T>>()
            .cloned()
            .ok_or_else(|| Error::Custom("materializer cache entry has an unexpected type".into()))
    }

    /// The cached materializer for `key`, if present.
    pub fn get<T: 'static>(&self, key: &ShapeKey) -> Option<Materializer<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .and_then(|entry| entry.downcast_ref::<Materializer<T>>())
            .cloned()
    }

    pub fn contains(&self, key: &ShapeKey) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    /// Drop every cached materializer.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let removed = entries.len();
        entries.clear();
        tracing::debug!(removed, "Purged materializer cache");
        removed
    }

    /// Drop the materializers compiled for one target.
    pub fn purge_target(&self, target: &Target) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| key.target != *target);
        let removed = before - entries.len();
        tracing::debug!(target_type = target.name(), removed, "Purged materializers for target");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MaterializerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializerCache")
            .field("stats", &self.stats())
            .finish()
    }
}
