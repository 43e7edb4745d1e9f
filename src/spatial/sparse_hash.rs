//! Sparse hash grid for efficient spatial queries
//!
//! Entities are registered in every cell their footprint overlaps. The set
//! of cells is remembered per entity so removal only touches those cells.

use ahash::{AHashMap, AHashSet};

use crate::core::types::{EntityId, TilePos, Vec2};

type Cell = (i32, i32);

/// Uniform-grid hash mapping world cells to the entities occupying them
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: AHashMap<Cell, AHashSet<EntityId>>,
    entity_cells: AHashMap<EntityId, Vec<Cell>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: AHashMap::new(),
            entity_cells: AHashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn cell_coord(&self, x: f32, y: f32) -> Cell {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Cells covered by an N×N footprint centred on `position`
    fn footprint_cells(&self, position: Vec2, size: u32) -> Vec<Cell> {
        let half = (size.max(1) as f32 - 1.0) / 2.0;
        let min = Vec2::new(position.x - half, position.y - half).tile();
        let max = Vec2::new(position.x + half, position.y + half).tile();
        let (min_cx, min_cy) = self.cell_coord(min.x as f32, min.y as f32);
        let (max_cx, max_cy) = self.cell_coord(max.x as f32, max.y as f32);

        let mut cells = Vec::with_capacity(((max_cx - min_cx + 1) * (max_cy - min_cy + 1)) as usize);
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                cells.push((cx, cy));
            }
        }
        cells
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entity_cells.clear();
    }

    /// Register an entity in every cell its footprint overlaps
    ///
    /// Re-inserting a known entity replaces its previous registration.
    pub fn insert(&mut self, entity: EntityId, position: Vec2, size: u32) {
        if self.entity_cells.contains_key(&entity) {
            self.remove(entity);
        }
        let cells = self.footprint_cells(position, size);
        for cell in &cells {
            self.cells.entry(*cell).or_default().insert(entity);
        }
        self.entity_cells.insert(entity, cells);
    }

    /// Drop an entity from all its cells. No-op for unknown entities.
    pub fn remove(&mut self, entity: EntityId) {
        let Some(cells) = self.entity_cells.remove(&entity) else {
            return;
        };
        for cell in cells {
            if let Some(members) = self.cells.get_mut(&cell) {
                members.remove(&entity);
                if members.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Re-register an entity whose position or footprint changed
    pub fn update(&mut self, entity: EntityId, position: Vec2, size: u32) {
        self.remove(entity);
        self.insert(entity, position, size);
    }

    /// Entities in cells within `cell_radius` cells of the cell containing (x, y)
    pub fn query_radius(&self, x: f32, y: f32, cell_radius: i32) -> AHashSet<EntityId> {
        let (cx, cy) = self.cell_coord(x, y);
        let mut found = AHashSet::new();
        for dx in -cell_radius..=cell_radius {
            for dy in -cell_radius..=cell_radius {
                if let Some(members) = self.cells.get(&(cx + dx, cy + dy)) {
                    found.extend(members.iter().copied());
                }
            }
        }
        found
    }

    /// Radius query expressed in world units (tiles)
    pub fn query_world_radius(&self, center: Vec2, radius: f32) -> AHashSet<EntityId> {
        let cell_radius = (radius / self.cell_size).ceil().max(0.0) as i32;
        self.query_radius(center.x, center.y, cell_radius)
    }

    /// Entities in all cells overlapping the rectangle
    pub fn query_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> AHashSet<EntityId> {
        let (min_cx, min_cy) = self.cell_coord(min_x, min_y);
        let (max_cx, max_cy) = self.cell_coord(max_x, max_y);
        let mut found = AHashSet::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(members) = self.cells.get(&(cx, cy)) {
                    found.extend(members.iter().copied());
                }
            }
        }
        found
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entity_cells.contains_key(&entity)
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.entity_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_cells.is_empty()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell coordinate of a tile, for callers that bucket their own data
    pub fn cell_of(&self, tile: TilePos) -> (i32, i32) {
        self.cell_coord(tile.x as f32, tile.y as f32)
    }
}
