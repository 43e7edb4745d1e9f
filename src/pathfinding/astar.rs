//! A* search over walkable tiles
//!
//! 8-connected grid, uniform step cost of 1 (diagonals are free to cut
//! corners), Manhattan heuristic. The heuristic overestimates diagonal
//! moves so the search is fast rather than expansion-optimal; callers
//! should rely on path validity and length, not on which of several
//! equal-length paths comes back.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::core::types::TilePos;
use crate::pathfinding::Terrain;

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    tile: TilePos,
    f_cost: u32, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.tile == other.tile
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.f_cost.cmp(&self.f_cost)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn heuristic(a: TilePos, b: TilePos) -> u32 {
    a.manhattan(&b)
}

/// Walkable 8-neighbours of a tile, orthogonal first
pub fn walkable_neighbors<T: Terrain + ?Sized>(terrain: &T, tile: TilePos) -> impl Iterator<Item = TilePos> + '_ {
    tile.neighbors().into_iter().filter(move |n| terrain.walkable(*n))
}

/// Find the tiles stepped onto between `start` and `goal`
///
/// The start tile is not part of the result; `Some(vec![])` means the
/// unit is already there. Returns None if the goal cannot be reached.
pub fn find_tiles<T: Terrain + ?Sized>(terrain: &T, start: TilePos, goal: TilePos) -> Option<Vec<TilePos>> {
    if start == goal {
        return Some(Vec::new());
    }
    if !terrain.in_bounds(start) || !terrain.walkable(goal) {
        return None;
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<TilePos, TilePos> = AHashMap::new();
    let mut g_scores: AHashMap<TilePos, u32> = AHashMap::new();

    g_scores.insert(start, 0);
    open_set.push(PathNode {
        tile: start,
        f_cost: heuristic(start, goal),
    });

    while let Some(current) = open_set.pop() {
        if current.tile == goal {
            return Some(reconstruct_path(&came_from, current.tile));
        }

        let current_g = g_scores.get(&current.tile).copied().unwrap_or(u32::MAX);
        if current_g == u32::MAX {
            continue;
        }

        for neighbor in walkable_neighbors(terrain, current.tile) {
            let tentative_g = current_g + 1;
            let neighbor_g = g_scores.get(&neighbor).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.tile);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    tile: neighbor,
                    f_cost: tentative_g + heuristic(neighbor, goal),
                });
            }
        }
    }

    None // No path found
}

/// Walk the parent map back from the goal; the start tile is dropped
fn reconstruct_path(came_from: &AHashMap<TilePos, TilePos>, mut current: TilePos) -> Vec<TilePos> {
    let mut path = Vec::new();
    while let Some(&prev) = came_from.get(&current) {
        path.push(current);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::tests::TestGrid;

    fn assert_connected(start: TilePos, path: &[TilePos]) {
        let mut previous = start;
        for tile in path {
            assert_eq!(previous.chebyshev(tile), 1, "{previous:?} -> {tile:?} is not a single step");
            previous = *tile;
        }
    }

    #[test]
    fn test_straight_and_diagonal_lengths() {
        let grid = TestGrid::open(20, 20);
        let start = TilePos::new(0, 0);

        for goal in [TilePos::new(5, 5), TilePos::new(5, 0), TilePos::new(3, 7)] {
            let path = find_tiles(&grid, start, goal).unwrap();
            assert_eq!(path.len() as u32, start.chebyshev(&goal));
            assert_eq!(path.last(), Some(&goal));
            assert_connected(start, &path);
        }
    }

    #[test]
    fn test_path_around_wall() {
        let mut grid = TestGrid::open(10, 10);
        for y in 0..8 {
            grid.block(TilePos::new(4, y));
        }

        let start = TilePos::new(0, 0);
        let goal = TilePos::new(8, 0);
        let path = find_tiles(&grid, start, goal).unwrap();

        assert!(path.iter().all(|tile| grid.walkable(*tile)));
        assert!(path.iter().any(|tile| tile.x == 4 && tile.y >= 8));
        assert_connected(start, &path);
    }

    #[test]
    fn test_enclosed_goal_has_no_path() {
        let mut grid = TestGrid::open(10, 10);
        let goal = TilePos::new(5, 5);
        for neighbor in goal.neighbors() {
            grid.block(neighbor);
        }
        assert!(find_tiles(&grid, TilePos::new(0, 0), goal).is_none());
    }

    #[test]
    fn test_already_there() {
        let grid = TestGrid::open(5, 5);
        assert_eq!(find_tiles(&grid, TilePos::new(2, 2), TilePos::new(2, 2)), Some(Vec::new()));
    }
}
