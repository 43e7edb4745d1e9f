//! Seeded map generation
//!
//! Splits the map into one rectangular zone per team, seats each team's
//! Town Centre and villagers in its zone, then scatters gold and forests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::core::config::SimulationConfig;
use crate::core::types::{TeamId, TilePos};
use crate::world::entity::{BuildingKind, Entity, ResourceNodeKind, UnitKind};
use crate::world::map::GameMap;
use crate::world::team::Team;

/// Tree clusters are squares of this edge range
const TREE_CLUSTER_SIZE: (i32, i32) = (2, 4);
const GOLD_CLUSTER_SIZE: i32 = 2;
/// Random placement tries per requested resource tile before giving up
const ATTEMPTS_PER_TILE: usize = 20;

/// Inclusive tile rectangle owned by a team at match start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zone {
    pub min: TilePos,
    pub max: TilePos,
}

impl Zone {
    pub fn contains(&self, tile: TilePos) -> bool {
        tile.x >= self.min.x && tile.x <= self.max.x && tile.y >= self.min.y && tile.y <= self.max.y
    }
}

/// Near-square grid of zones, one per team, in row-major order
pub fn team_zones(width: i32, height: i32, teams: usize) -> Vec<Zone> {
    if teams == 0 {
        return Vec::new();
    }
    let cols = (teams as f64).sqrt().ceil() as i32;
    let rows = (teams as i32 + cols - 1) / cols;
    let zone_width = width / cols;
    let zone_height = height / rows;

    (0..teams as i32)
        .map(|i| {
            let (row, col) = (i / cols, i % cols);
            let min = TilePos::new(col * zone_width, row * zone_height);
            let max = TilePos::new(
                (min.x + zone_width).min(width) - 1,
                (min.y + zone_height).min(height) - 1,
            );
            Zone { min, max }
        })
        .collect()
}

/// Build a populated map; the same seed always yields the same layout
pub fn generate_map(config: &SimulationConfig, team_count: u8, seed: u64) -> GameMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let teams = (0..team_count)
        .map(|id| {
            let mut team = Team::with_resources(TeamId(id), config.map.starting_resources);
            team.max_population = config.bot.population_cap;
            team
        })
        .collect();

    let mut map = GameMap::new(config.map.width, config.map.height, config.spatial.cell_size, teams);
    let zones = team_zones(config.map.width, config.map.height, team_count as usize);

    let mut centres = Vec::with_capacity(zones.len());
    for (index, zone) in zones.iter().enumerate() {
        let team = TeamId(index as u8);
        match place_in_zone(&mut map, &mut rng, zone, Entity::building(BuildingKind::TownCentre, team)) {
            Some(origin) => centres.push((team, origin, *zone)),
            None => warn!(?team, "No room for a Town Centre"),
        }
    }

    for (_, origin, _) in &centres {
        place_gold_near(&mut map, &mut rng, *origin);
    }
    scatter_gold(&mut map, &mut rng, config.map.gold_tiles);
    scatter_trees(&mut map, &mut rng, config.map.wood_tiles);

    for (team, origin, zone) in &centres {
        for _ in 0..config.map.starting_villagers {
            place_villager(&mut map, &mut rng, *team, *origin, zone);
        }
    }

    debug!(seed, entities = map.entity_count(), "Map generated");
    map
}

/// Random placement inside a zone, then a row scan of the whole map
fn place_in_zone(map: &mut GameMap, rng: &mut ChaCha8Rng, zone: &Zone, entity: Entity) -> Option<TilePos> {
    let size = entity.size() as i32;
    let max_x = zone.min.x.max(zone.max.x - size + 1);
    let max_y = zone.min.y.max(zone.max.y - size + 1);
    let attempts = ((zone.max.x - zone.min.x + 1) * (zone.max.y - zone.min.y + 1)).max(1) as usize;

    for _ in 0..attempts {
        let x = rng.gen_range(zone.min.x..=max_x);
        let y = rng.gen_range(zone.min.y..=max_y);
        if map.buildable_position(x, y, size as u32) {
            return map.add_entity(entity, x as f32, y as f32).ok().map(|_| TilePos::new(x, y));
        }
    }

    for y in 0..=(map.height() - size) {
        for x in 0..=(map.width() - size) {
            if map.buildable_position(x, y, size as u32) {
                return map.add_entity(entity, x as f32, y as f32).ok().map(|_| TilePos::new(x, y));
            }
        }
    }
    None
}

fn place_cluster(map: &mut GameMap, kind: ResourceNodeKind, origin: TilePos, size: i32, budget: usize) -> usize {
    let mut placed = 0;
    for i in 0..size {
        for j in 0..size {
            if placed >= budget {
                return placed;
            }
            let tile = origin.offset(i, j);
            if map.buildable_position(tile.x, tile.y, 1)
                && map.add_entity(Entity::resource(kind), tile.x as f32, tile.y as f32).is_ok()
            {
                placed += 1;
            }
        }
    }
    placed
}

/// A 2×2 gold mine right outside a Town Centre footprint
fn place_gold_near(map: &mut GameMap, rng: &mut ChaCha8Rng, centre: TilePos) {
    let reach = BuildingKind::TownCentre.size() as i32;
    for _ in 0..100 {
        let x = centre.x + rng.gen_range(-GOLD_CLUSTER_SIZE - 1..=reach + 1);
        let y = centre.y + rng.gen_range(-GOLD_CLUSTER_SIZE - 1..=reach + 1);
        if map.buildable_position(x, y, GOLD_CLUSTER_SIZE as u32) {
            place_cluster(map, ResourceNodeKind::GoldMine, TilePos::new(x, y), GOLD_CLUSTER_SIZE, usize::MAX);
            return;
        }
    }
}

fn scatter_gold(map: &mut GameMap, rng: &mut ChaCha8Rng, tiles: usize) {
    let mut placed = 0;
    let mut attempts = 0;
    while placed < tiles && attempts < tiles * ATTEMPTS_PER_TILE {
        attempts += 1;
        let x = rng.gen_range(0..=map.width() - GOLD_CLUSTER_SIZE);
        let y = rng.gen_range(0..=map.height() - GOLD_CLUSTER_SIZE);
        placed += place_cluster(map, ResourceNodeKind::GoldMine, TilePos::new(x, y), GOLD_CLUSTER_SIZE, tiles - placed);
    }
    if placed < tiles {
        debug!(placed, requested = tiles, "Gold placement ran out of room");
    }
}

fn scatter_trees(map: &mut GameMap, rng: &mut ChaCha8Rng, tiles: usize) {
    let mut placed = 0;
    let mut attempts = 0;
    while placed < tiles && attempts < tiles * ATTEMPTS_PER_TILE {
        attempts += 1;
        let size = rng.gen_range(TREE_CLUSTER_SIZE.0..=TREE_CLUSTER_SIZE.1);
        let x = rng.gen_range(0..=(map.width() - size).max(0));
        let y = rng.gen_range(0..=(map.height() - size).max(0));
        placed += place_cluster(map, ResourceNodeKind::Tree, TilePos::new(x, y), size, tiles - placed);
    }
    if placed < tiles {
        debug!(placed, requested = tiles, "Forest placement ran out of room");
    }
}

/// Villagers start on a free tile near their Town Centre, inside the zone
fn place_villager(map: &mut GameMap, rng: &mut ChaCha8Rng, team: TeamId, centre: TilePos, zone: &Zone) {
    let reach = BuildingKind::TownCentre.size() as i32 + 3;
    for _ in 0..1000 {
        let tile = centre.offset(rng.gen_range(-3..=reach), rng.gen_range(-3..=reach));
        if zone.contains(tile)
            && map.walkable_position(tile)
            && map.add_entity(Entity::unit(UnitKind::Villager, team), tile.x as f32, tile.y as f32).is_ok()
        {
            return;
        }
    }
    warn!(?team, "Failed to deploy a starting villager");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.map.width = 60;
        config.map.height = 60;
        config.map.gold_tiles = 40;
        config.map.wood_tiles = 120;
        config
    }

    #[test]
    fn test_zones_tile_the_map() {
        let zones = team_zones(100, 80, 4);
        assert_eq!(zones.len(), 4);
        assert_eq!(zones[0], Zone { min: TilePos::new(0, 0), max: TilePos::new(49, 39) });
        assert_eq!(zones[3], Zone { min: TilePos::new(50, 40), max: TilePos::new(99, 79) });

        let three = team_zones(90, 90, 3);
        assert_eq!(three.len(), 3);
        assert_eq!(three[2].min, TilePos::new(0, 45));
    }

    #[test]
    fn test_every_team_gets_a_base() {
        let config = small_config();
        let map = generate_map(&config, 2, 7);

        for team in [TeamId(0), TeamId(1)] {
            let centres = map
                .team_buildings(team)
                .filter(|b| b.building_kind() == Some(BuildingKind::TownCentre))
                .count();
            assert_eq!(centres, 1);
            assert_eq!(map.team_villagers(team).count(), config.map.starting_villagers);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = small_config();
        let a = generate_map(&config, 2, 1234);
        let b = generate_map(&config, 2, 1234);

        let layout = |map: &GameMap| -> Vec<(u32, i32, i32)> {
            map.entities().map(|e| (e.id.0, e.tile().x, e.tile().y)).collect()
        };
        assert_eq!(layout(&a), layout(&b));
    }

    #[test]
    fn test_resources_are_scattered() {
        let config = small_config();
        let map = generate_map(&config, 2, 99);
        let trees = map.entities().filter(|e| e.yields() == Some(crate::world::resources::ResourceKind::Wood)).count();
        let gold = map.entities().filter(|e| e.yields() == Some(crate::world::resources::ResourceKind::Gold)).count();
        assert_eq!(trees, config.map.wood_tiles);
        assert!(gold >= config.map.gold_tiles);
    }
}
