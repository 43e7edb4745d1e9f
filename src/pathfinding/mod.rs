//! Grid path planning with goal resolution and a path cache
//!
//! `PathPlanner::find_path` is the entry point for any mobile entity.
//! It never fails loudly: an unreachable or fully blocked goal yields an
//! empty waypoint list and the caller picks something else next tick.

pub mod astar;
pub mod cache;
pub mod goal;

use tracing::trace;

use crate::core::config::PathfindingConfig;
use crate::core::types::{Seconds, TilePos, Vec2};

pub use astar::find_tiles;
pub use cache::{path_key, PathCache, PathKey};
pub use goal::{approach_point, nearest_walkable_tile, resolve_goal, ResolvedGoal};

/// Entity standing on a blocked goal tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupant {
    pub position: Vec2,
    pub size: u32,
}

/// What the planner needs to know about the world
pub trait Terrain {
    fn in_bounds(&self, tile: TilePos) -> bool;

    /// In bounds and free of blocking entities
    fn walkable(&self, tile: TilePos) -> bool;

    /// Blocking entity registered on `tile`, if any
    fn occupant(&self, tile: TilePos) -> Option<Occupant>;

    /// Simulation clock used for cache expiry
    fn elapsed(&self) -> Seconds;
}

/// A* planner owning its path cache
#[derive(Debug, Clone)]
pub struct PathPlanner {
    cache: PathCache,
}

impl PathPlanner {
    pub fn new(cache: PathCache) -> Self {
        Self { cache }
    }

    pub fn from_config(config: &PathfindingConfig) -> Self {
        Self::new(PathCache::from_config(config))
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Waypoints from `start` to `goal`, excluding the start tile
    ///
    /// The last waypoint is the float goal (or the approach point on an
    /// occupied goal) whenever that point is walkable, so movement ends
    /// exactly where it was ordered. Empty when no path exists.
    pub fn find_path<T: Terrain + ?Sized>(&mut self, start: Vec2, goal: Vec2, terrain: &T) -> Vec<Vec2> {
        let key = path_key(start, goal);
        let now = terrain.elapsed();
        if let Some(cached) = self.cache.get(&key, now) {
            return cached;
        }

        let Some(resolved) = resolve_goal(terrain, start, goal) else {
            trace!(?key, "Goal unreachable");
            return Vec::new();
        };
        let Some(tiles) = find_tiles(terrain, start.tile(), resolved.tile) else {
            trace!(?key, "No path");
            return Vec::new();
        };

        let mut path: Vec<Vec2> = tiles.into_iter().map(Vec2::from).collect();
        let tail = match resolved.approach {
            Some(approach) if terrain.walkable(approach.tile()) => Some(approach),
            Some(_) => None,
            None => terrain.walkable(goal.tile()).then_some(goal),
        };
        if let Some(point) = tail {
            match path.last_mut() {
                Some(last) if last.tile() == point.tile() => *last = point,
                _ => path.push(point),
            }
        }

        self.cache.insert(key, &path, now);
        path
    }

    /// Forget cached paths starting or ending near a tile whose
    /// walkability changed
    pub fn invalidate_near(&mut self, tile: TilePos, radius: i32) -> usize {
        self.cache.invalidate_near(tile, radius)
    }

    /// Drop every cached path (map teardown)
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
