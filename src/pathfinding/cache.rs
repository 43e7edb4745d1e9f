//! LRU + TTL cache of planned paths
//!
//! Keyed by rounded start and goal tiles. Entries older than the TTL are
//! treated as absent and dropped on lookup; once capacity is exceeded the
//! least recently used entry goes first. Lookups hand out copies so
//! callers can consume waypoints without touching the cached list.

use std::collections::BTreeMap;

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::core::config::PathfindingConfig;
use crate::core::types::{Seconds, TilePos, Vec2};

/// (rounded start, rounded goal)
pub type PathKey = (TilePos, TilePos);

pub fn path_key(start: Vec2, goal: Vec2) -> PathKey {
    (start.tile(), goal.tile())
}

#[derive(Debug, Clone)]
struct CachedPath {
    waypoints: Vec<Vec2>,
    stored_at: Seconds,
    /// Position in the recency index
    stamp: u64,
}

#[derive(Debug, Clone)]
pub struct PathCache {
    capacity: usize,
    ttl: Seconds,
    entries: AHashMap<PathKey, CachedPath>,
    /// stamp -> key, oldest first
    recency: BTreeMap<u64, PathKey>,
    next_stamp: u64,
}

impl PathCache {
    pub fn new(capacity: usize, ttl: Seconds) -> Self {
        Self {
            capacity,
            ttl,
            entries: AHashMap::new(),
            recency: BTreeMap::new(),
            next_stamp: 0,
        }
    }

    pub fn from_config(config: &PathfindingConfig) -> Self {
        Self::new(config.max_cache_size, config.cache_ttl)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Seconds {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    fn stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Fresh copy of the cached path, refreshing its recency
    pub fn get(&mut self, key: &PathKey, now: Seconds) -> Option<Vec<Vec2>> {
        let (stored_at, old_stamp) = {
            let entry = self.entries.get(key)?;
            (entry.stored_at, entry.stamp)
        };

        if now - stored_at >= self.ttl {
            trace!(?key, "Path cache entry expired");
            self.entries.remove(key);
            self.recency.remove(&old_stamp);
            return None;
        }

        let stamp = self.stamp();
        self.recency.remove(&old_stamp);
        self.recency.insert(stamp, *key);
        let entry = self.entries.get_mut(key)?;
        entry.stamp = stamp;
        trace!(?key, "Path cache hit");
        Some(entry.waypoints.clone())
    }

    /// Store a copy of `path`; empty paths are never cached
    pub fn insert(&mut self, key: PathKey, path: &[Vec2], now: Seconds) {
        if path.is_empty() || self.capacity == 0 {
            return;
        }

        let stamp = self.stamp();
        if let Some(previous) = self.entries.insert(
            key,
            CachedPath {
                waypoints: path.to_vec(),
                stored_at: now,
                stamp,
            },
        ) {
            self.recency.remove(&previous.stamp);
        }
        self.recency.insert(stamp, key);

        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(key = ?oldest, "Evicted least recently used path");
        }
    }

    /// Drop every entry whose start or goal lies within `radius` tiles of `tile`
    pub fn invalidate_near(&mut self, tile: TilePos, radius: i32) -> usize {
        let stale: Vec<(PathKey, u64)> = self
            .entries
            .iter()
            .filter(|((start, goal), _)| start.within(&tile, radius) || goal.within(&tile, radius))
            .map(|(key, entry)| (*key, entry.stamp))
            .collect();

        for (key, stamp) in &stale {
            self.entries.remove(key);
            self.recency.remove(stamp);
        }
        if !stale.is_empty() {
            debug!(?tile, radius, removed = stale.len(), "Invalidated cached paths");
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}
