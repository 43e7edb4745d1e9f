//! Goal resolution for blocked destinations
//!
//! Orders aimed at a building or resource name a tile the unit can never
//! stand on. The goal is swapped for a point on the target's edge facing
//! the unit, or failing that the closest walkable tile around it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ahash::AHashSet;

use crate::core::types::{TilePos, Vec2};
use crate::pathfinding::astar::heuristic;
use crate::pathfinding::Terrain;

/// Destination actually searched for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedGoal {
    pub tile: TilePos,
    /// Point on the target's edge the unit should end on, when the goal
    /// was occupied by a target
    pub approach: Option<Vec2>,
}

/// Point on the occupant's footprint edge facing `start`
///
/// Assumes an axis-aligned square footprint centred on `center`.
pub fn approach_point(center: Vec2, size: u32, start: Vec2) -> Vec2 {
    let angle = center.angle_to(&start);
    let reach = (size as f32 - 1.0) / 2.0;
    Vec2::new(center.x + reach * angle.cos(), center.y + reach * angle.sin())
}

/// Best-first search for the walkable tile closest to `origin`
///
/// Expands 8-connected in-bounds tiles ordered by Manhattan distance to
/// `origin`, never revisiting a tile.
pub fn nearest_walkable_tile<T: Terrain + ?Sized>(terrain: &T, origin: TilePos) -> Option<TilePos> {
    let mut open_set = BinaryHeap::new();
    let mut visited = AHashSet::new();
    open_set.push(Reverse((0u32, origin)));
    visited.insert(origin);

    while let Some(Reverse((_, current))) = open_set.pop() {
        if terrain.walkable(current) {
            return Some(current);
        }
        for neighbor in current.neighbors() {
            if terrain.in_bounds(neighbor) && visited.insert(neighbor) {
                open_set.push(Reverse((heuristic(neighbor, origin), neighbor)));
            }
        }
    }
    None
}

/// Tile to run A* towards for a float `goal` seen from `start`
///
/// None when the goal is blocked and no walkable substitute exists.
pub fn resolve_goal<T: Terrain + ?Sized>(terrain: &T, start: Vec2, goal: Vec2) -> Option<ResolvedGoal> {
    let tile = goal.tile();
    if terrain.walkable(tile) {
        return Some(ResolvedGoal { tile, approach: None });
    }

    let Some(occupant) = terrain.occupant(tile) else {
        return None;
    };

    let approach = approach_point(occupant.position, occupant.size, start);
    let approach_tile = approach.tile();
    let tile = if terrain.walkable(approach_tile) {
        approach_tile
    } else {
        nearest_walkable_tile(terrain, approach_tile)?
    };

    Some(ResolvedGoal {
        tile,
        approach: Some(approach),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::tests::TestGrid;

    #[test]
    fn test_walkable_goal_is_kept() {
        let grid = TestGrid::open(10, 10);
        let resolved = resolve_goal(&grid, Vec2::new(0.0, 0.0), Vec2::new(4.2, 3.7)).unwrap();
        assert_eq!(resolved, ResolvedGoal { tile: TilePos::new(4, 4), approach: None });
    }

    #[test]
    fn test_approach_point_faces_start() {
        let point = approach_point(Vec2::new(5.5, 5.5), 4, Vec2::new(0.0, 5.5));
        assert!((point.x - 4.0).abs() < 1e-5);
        assert!((point.y - 5.5).abs() < 1e-5);

        // 1x1 targets approach at their own centre
        let point = approach_point(Vec2::new(3.0, 3.0), 1, Vec2::new(9.0, 0.0));
        assert_eq!(point, Vec2::new(3.0, 3.0));
    }

    #[test]
    fn test_blocked_goal_resolves_next_to_occupant() {
        let mut grid = TestGrid::open(20, 20);
        // 4x4 building on tiles 8..=11, centred at 9.5
        grid.place(TilePos::new(8, 8), 4);

        let start = Vec2::new(2.0, 9.5);
        let resolved = resolve_goal(&grid, start, Vec2::new(9.5, 9.5)).unwrap();
        let approach = resolved.approach.unwrap();

        assert!(grid.walkable(resolved.tile));
        assert!(approach.x < 9.5);
        assert!(resolved.tile.chebyshev(&approach.tile()) <= 1);
    }

    #[test]
    fn test_blocked_without_occupant_fails() {
        let mut grid = TestGrid::open(10, 10);
        grid.block(TilePos::new(5, 5));
        assert!(resolve_goal(&grid, Vec2::new(0.0, 0.0), Vec2::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn test_nearest_walkable_tile() {
        let mut grid = TestGrid::open(10, 10);
        grid.place(TilePos::new(3, 3), 3);

        let found = nearest_walkable_tile(&grid, TilePos::new(4, 4)).unwrap();
        assert_eq!(found.manhattan(&TilePos::new(4, 4)), 2);

        let mut sealed = TestGrid::open(3, 3);
        sealed.place(TilePos::new(0, 0), 3);
        assert!(nearest_walkable_tile(&sealed, TilePos::new(1, 1)).is_none());
    }
}
