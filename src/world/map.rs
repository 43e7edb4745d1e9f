//! Game map - the tile grid, entity registry and spatial index of a match
//!
//! The map owns every entity. Entities occupy an N×N block of tiles whose
//! top-left corner is the placement origin; their `position` is the centre
//! of that block. Tiles whose walkability changes are recorded so the
//! owner of the path cache can invalidate stale routes.

use std::collections::BTreeMap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::core::error::PlacementError;
use crate::core::types::{EntityId, Seconds, TeamId, TilePos, Vec2};
use crate::pathfinding::{Occupant, Terrain};
use crate::spatial::SpatialIndex;
use crate::world::entity::{BuildingKind, Entity, UnitKind};
use crate::world::team::Team;

#[derive(Debug, Clone)]
pub struct GameMap {
    width: i32,
    height: i32,
    entities: BTreeMap<EntityId, Entity>,
    grid: AHashMap<TilePos, Vec<EntityId>>,
    resource_tiles: AHashMap<TilePos, Vec<EntityId>>,
    spatial: SpatialIndex,
    teams: Vec<Team>,
    next_id: u32,
    elapsed: Seconds,
    walkability_changes: Vec<TilePos>,
}

impl GameMap {
    pub fn new(width: i32, height: i32, cell_size: f32, teams: Vec<Team>) -> Self {
        Self {
            width,
            height,
            entities: BTreeMap::new(),
            grid: AHashMap::new(),
            resource_tiles: AHashMap::new(),
            spatial: SpatialIndex::new(cell_size),
            teams,
            next_id: 1,
            elapsed: 0.0,
            walkability_changes: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    // === CLOCK ===

    pub fn elapsed(&self) -> Seconds {
        self.elapsed
    }

    pub fn advance_clock(&mut self, dt: Seconds) {
        self.elapsed += dt.max(0.0);
    }

    // === TEAMS ===

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(id.index())
    }

    pub fn team_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(id.index())
    }

    pub fn is_valid_team(&self, id: TeamId) -> bool {
        id.index() < self.teams.len()
    }

    // === ENTITY REGISTRY ===

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    fn footprint(origin: TilePos, size: u32) -> impl Iterator<Item = TilePos> {
        let size = size.max(1) as i32;
        (0..size).flat_map(move |i| (0..size).map(move |j| origin.offset(i, j)))
    }

    fn origin_of(entity: &Entity) -> TilePos {
        let half = (entity.size() as f32 - 1.0) / 2.0;
        Vec2::new(entity.position.x - half, entity.position.y - half).tile()
    }

    /// Register `entity` with its footprint's top-left corner at (x, y)
    pub fn add_entity(&mut self, mut entity: Entity, x: f32, y: f32) -> Result<EntityId, PlacementError> {
        if let Some(team) = entity.team {
            if !self.is_valid_team(team) {
                return Err(PlacementError::InvalidTeam(team));
            }
        }

        let origin = Vec2::new(x, y).tile();
        let size = entity.size();
        let far_corner = origin.offset(size as i32 - 1, size as i32 - 1);
        if !self.in_bounds(origin) || !self.in_bounds(far_corner) {
            return Err(PlacementError::OutOfBounds { origin, size });
        }

        if let Some(blocked) = Self::footprint(origin, size)
            .find(|tile| self.grid.contains_key(tile) && !self.walkable_position(*tile))
        {
            return Err(PlacementError::Blocked(blocked));
        }

        let id = EntityId(self.next_id);
        self.next_id += 1;
        entity.id = id;
        let half = (size as f32 - 1.0) / 2.0;
        entity.position = Vec2::new(origin.x as f32 + half, origin.y as f32 + half);

        for tile in Self::footprint(origin, size) {
            self.grid.entry(tile).or_default().push(id);
            if entity.provides_resources() {
                self.resource_tiles.entry(tile).or_default().push(id);
            }
            if !entity.is_walkable() {
                self.walkability_changes.push(tile);
            }
        }

        self.spatial.insert(id, entity.position, size);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Unregister an entity from every index, returning it
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        let origin = Self::origin_of(&entity);
        for tile in Self::footprint(origin, entity.size()) {
            Self::unlink(&mut self.grid, tile, id);
            Self::unlink(&mut self.resource_tiles, tile, id);
            if !entity.is_walkable() {
                self.walkability_changes.push(tile);
            }
        }
        self.spatial.remove(id);
        Some(entity)
    }

    fn unlink(index: &mut AHashMap<TilePos, Vec<EntityId>>, tile: TilePos, id: EntityId) {
        if let Some(members) = index.get_mut(&tile) {
            members.retain(|member| *member != id);
            if members.is_empty() {
                index.remove(&tile);
            }
        }
    }

    /// Move a mobile unit, keeping tile and spatial registration in sync
    pub fn move_entity(&mut self, id: EntityId, position: Vec2) -> bool {
        let tile = position.tile();
        if !self.in_bounds(tile) {
            return false;
        }
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.is_unit() {
            return false;
        }

        let old_tile = entity.position.tile();
        entity.position = position;
        if old_tile != tile {
            Self::unlink(&mut self.grid, old_tile, id);
            self.grid.entry(tile).or_default().push(id);
        }
        self.spatial.update(id, position, 1);
        true
    }

    // === TILE QUERIES ===

    pub fn walkable_position(&self, tile: TilePos) -> bool {
        if !self.in_bounds(tile) {
            return false;
        }
        self.entities_at(tile)
            .iter()
            .filter_map(|id| self.entities.get(id))
            .all(Entity::is_walkable)
    }

    /// True when an N×N footprint at (x, y) is in bounds and fully empty
    pub fn buildable_position(&self, x: i32, y: i32, size: u32) -> bool {
        let origin = TilePos::new(x, y);
        let far_corner = origin.offset(size as i32 - 1, size as i32 - 1);
        if !self.in_bounds(origin) || !self.in_bounds(far_corner) {
            return false;
        }
        Self::footprint(origin, size).all(|tile| !self.grid.contains_key(&tile))
    }

    pub fn entities_at(&self, tile: TilePos) -> &[EntityId] {
        self.grid.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resources_at(&self, tile: TilePos) -> &[EntityId] {
        self.resource_tiles.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities whose cells lie within `radius` tiles (cell-granular)
    pub fn entities_in_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self.spatial.query_world_radius(center, radius).into_iter().collect();
        found.sort();
        found
    }

    pub fn entities_in_rect(&self, min: Vec2, max: Vec2) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self.spatial.query_rect(min.x, min.y, max.x, max.y).into_iter().collect();
        found.sort();
        found
    }

    /// Tiles whose walkability changed since the last call
    pub fn take_walkability_changes(&mut self) -> Vec<TilePos> {
        let mut changes = std::mem::take(&mut self.walkability_changes);
        changes.sort();
        changes.dedup();
        changes
    }

    // === TEAM VIEWS ===

    /// Living entities owned by `team`, in id order
    pub fn team_entities(&self, team: TeamId) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |entity| entity.team == Some(team) && entity.is_alive())
    }

    pub fn team_units(&self, team: TeamId) -> impl Iterator<Item = &Entity> {
        self.team_entities(team).filter(|entity| entity.is_unit())
    }

    pub fn team_buildings(&self, team: TeamId) -> impl Iterator<Item = &Entity> {
        self.team_entities(team).filter(|entity| entity.is_building())
    }

    pub fn team_villagers(&self, team: TeamId) -> impl Iterator<Item = &Entity> {
        self.team_entities(team).filter(|entity| entity.is_worker())
    }

    pub fn team_military(&self, team: TeamId) -> impl Iterator<Item = &Entity> {
        self.team_entities(team).filter(|entity| entity.is_combat_unit())
    }

    /// Living units plus units waiting in training queues
    pub fn population(&self, team: TeamId) -> u32 {
        let queued: usize = self
            .team_buildings(team)
            .map(|building| building.training_queue.len())
            .sum();
        (self.team_units(team).count() + queued) as u32
    }

    /// Population supported by finished buildings, capped by the team maximum
    pub fn population_capacity(&self, team: TeamId) -> u32 {
        let housing: u32 = self
            .team_buildings(team)
            .filter(|building| building.is_built())
            .filter_map(Entity::building_kind)
            .map(BuildingKind::population)
            .sum();
        let cap = self.team(team).map_or(0, |team| team.max_population);
        housing.min(cap)
    }

    pub fn nearest_drop_point(&self, team: TeamId, from: Vec2) -> Option<EntityId> {
        self.team_buildings(team)
            .filter(|building| building.is_drop_point() && building.is_built())
            .min_by_key(|building| OrderedFloat(building.position.distance(&from)))
            .map(|building| building.id)
    }

    // === ECONOMY ===

    /// Pay for and lay out a construction site at (x, y)
    pub fn place_construction(
        &mut self,
        team: TeamId,
        kind: BuildingKind,
        x: i32,
        y: i32,
    ) -> Result<EntityId, PlacementError> {
        let cost = kind.cost();
        let stock = self.team(team).ok_or(PlacementError::InvalidTeam(team))?.resources;
        if !stock.has_enough(&cost) {
            return Err(PlacementError::InsufficientResources(team));
        }
        let origin = TilePos::new(x, y);
        if !self.buildable_position(x, y, kind.size()) {
            return Err(PlacementError::Blocked(origin));
        }

        let id = self.add_entity(Entity::construction_site(kind, team), x as f32, y as f32)?;
        if let Some(team) = self.team_mut(team) {
            team.resources.spend(&cost);
        }
        Ok(id)
    }

    /// Pay for and queue a unit at a finished building that trains it
    pub fn queue_training(&mut self, building: EntityId, unit: UnitKind) -> bool {
        let Some(team) = self
            .entity(building)
            .filter(|b| b.is_alive() && b.is_built() && b.building_kind() == Some(unit.trained_at()))
            .and_then(|b| b.team)
        else {
            return false;
        };

        let paid = self
            .team_mut(team)
            .is_some_and(|team| team.resources.spend(&unit.cost()));
        if !paid {
            return false;
        }
        if let Some(entity) = self.entity_mut(building) {
            entity.training_queue.push_back(unit);
        }
        true
    }
}

impl Terrain for GameMap {
    fn in_bounds(&self, tile: TilePos) -> bool {
        tile.x >= 0 && tile.y >= 0 && tile.x < self.width && tile.y < self.height
    }

    fn walkable(&self, tile: TilePos) -> bool {
        self.walkable_position(tile)
    }

    fn occupant(&self, tile: TilePos) -> Option<Occupant> {
        self.entities_at(tile)
            .iter()
            .filter_map(|id| self.entities.get(id))
            .find(|entity| !entity.is_walkable())
            .map(|entity| Occupant {
                position: entity.position,
                size: entity.size(),
            })
    }

    fn elapsed(&self) -> Seconds {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::entity::{ResourceNodeKind, UnitKind};
    use crate::world::resources::Resources;

    fn test_map() -> GameMap {
        GameMap::new(20, 20, 10.0, vec![Team::with_resources(TeamId(0), Resources::new(500, 500, 500))])
    }

    #[test]
    fn test_add_entity_registers_footprint() {
        let mut map = test_map();
        let id = map
            .add_entity(Entity::building(BuildingKind::TownCentre, TeamId(0)), 4.0, 4.0)
            .unwrap();

        let centre = map.entity(id).unwrap();
        assert_eq!(centre.position, Vec2::new(5.5, 5.5));
        for x in 4..8 {
            for y in 4..8 {
                assert_eq!(map.entities_at(TilePos::new(x, y)), &[id]);
                assert!(!map.walkable_position(TilePos::new(x, y)));
            }
        }
        assert!(map.walkable_position(TilePos::new(8, 8)));
        assert!(map.spatial().contains(id));
    }

    #[test]
    fn test_invalid_team_rejected() {
        let mut map = test_map();
        let result = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(3)), 1.0, 1.0);
        assert_eq!(result, Err(PlacementError::InvalidTeam(TeamId(3))));
        assert_eq!(map.entity_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_and_blocked() {
        let mut map = test_map();
        let result = map.add_entity(Entity::building(BuildingKind::Barracks, TeamId(0)), 18.0, 18.0);
        assert!(matches!(result, Err(PlacementError::OutOfBounds { .. })));

        map.add_entity(Entity::resource(ResourceNodeKind::Tree), 3.0, 3.0).unwrap();
        let result = map.add_entity(Entity::building(BuildingKind::House, TeamId(0)), 2.0, 2.0);
        assert_eq!(result, Err(PlacementError::Blocked(TilePos::new(3, 3))));

        // Units share walkable tiles
        map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 10.0, 10.0).unwrap();
        assert!(map.add_entity(Entity::unit(UnitKind::Archer, TeamId(0)), 10.0, 10.0).is_ok());
    }

    #[test]
    fn test_remove_entity_cleans_indexes() {
        let mut map = test_map();
        let tree = map.add_entity(Entity::resource(ResourceNodeKind::Tree), 3.0, 3.0).unwrap();
        map.take_walkability_changes();

        assert_eq!(map.resources_at(TilePos::new(3, 3)), &[tree]);
        assert!(map.remove_entity(tree).is_some());
        assert!(map.resources_at(TilePos::new(3, 3)).is_empty());
        assert!(map.entities_at(TilePos::new(3, 3)).is_empty());
        assert!(!map.spatial().contains(tree));
        assert_eq!(map.take_walkability_changes(), vec![TilePos::new(3, 3)]);
        assert!(map.remove_entity(tree).is_none());
    }

    #[test]
    fn test_buildable_position() {
        let mut map = test_map();
        map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 5.0, 5.0).unwrap();
        assert!(map.buildable_position(0, 0, 4));
        assert!(!map.buildable_position(4, 4, 2));
        assert!(!map.buildable_position(18, 18, 3));
    }

    #[test]
    fn test_move_entity_updates_tiles() {
        let mut map = test_map();
        let unit = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 1.0, 1.0).unwrap();
        assert!(map.move_entity(unit, Vec2::new(15.2, 14.8)));
        assert!(map.entities_at(TilePos::new(1, 1)).is_empty());
        assert_eq!(map.entities_at(TilePos::new(15, 15)), &[unit]);
        assert!(!map.move_entity(unit, Vec2::new(-3.0, 0.0)));
    }

    #[test]
    fn test_construction_and_training_spend_resources() {
        let mut map = test_map();
        let site = map.place_construction(TeamId(0), BuildingKind::House, 2, 2).unwrap();
        assert!(!map.entity(site).unwrap().is_built());
        assert_eq!(map.team(TeamId(0)).unwrap().resources.wood, 475);

        let centre = map
            .add_entity(Entity::building(BuildingKind::TownCentre, TeamId(0)), 10.0, 10.0)
            .unwrap();
        assert!(map.queue_training(centre, UnitKind::Villager));
        assert!(!map.queue_training(centre, UnitKind::Archer));
        assert_eq!(map.population(TeamId(0)), 1);
        assert_eq!(map.population_capacity(TeamId(0)), 5);
        assert_eq!(map.team(TeamId(0)).unwrap().resources.food, 450);
    }
}
