//! Per-frame world update
//!
//! Runs every frame, between strategic ticks: advances training queues,
//! walks units along planned routes and applies the work their command asks
//! for (gathering, stocking, building, repairing, fighting). Dead entities
//! and exhausted resource providers are removed only after the pass, so no
//! index is mutated while a unit is being processed.

use std::collections::VecDeque;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use crate::core::types::{EntityId, Seconds, TeamId, TilePos, Vec2};
use crate::pathfinding::PathPlanner;
use crate::world::command::{refresh_task, Task, MAXIMUM_CARRY};
use crate::world::entity::{BuildingKind, Entity, UnitKind};
use crate::world::map::GameMap;

/// Resources gathered per second by one worker
pub const GATHER_RATE: f32 = 1.0;

/// Reach beyond a target's footprint edge for non-combat work
pub const WORK_RANGE: f32 = 1.0;

/// Damage per second a finished keep deals to the nearest enemy unit
pub const KEEP_DAMAGE: f32 = 5.0;

/// Distance at which a plain move order counts as arrived
const ARRIVAL_TOLERANCE: f32 = 0.1;

/// Extra reach granted once a unit has walked its whole route
const ARRIVAL_SLACK: f32 = 1.5;

/// Waypoints a unit is walking towards `goal`
#[derive(Debug, Clone)]
struct Route {
    goal: TilePos,
    waypoints: VecDeque<Vec2>,
}

enum RouteProgress {
    Moving,
    Arrived,
    Unreachable,
}

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameEvents {
    pub trained: Vec<EntityId>,
    pub completed: Vec<EntityId>,
    pub removed: Vec<EntityId>,
}

/// Frame-to-frame bookkeeping of the world update
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    routes: AHashMap<EntityId, Route>,
    /// Fractional resources gathered but not yet carried
    gathered: AHashMap<EntityId, f32>,
    /// Seconds spent on the unit at the front of each training queue
    training: AHashMap<EntityId, Seconds>,
}

/// Distance from `from` to the edge of `target`'s footprint, per axis maximum
pub fn edge_gap(from: Vec2, target: &Entity) -> f32 {
    let half = target.size() as f32 / 2.0;
    let dx = (from.x - target.position.x).abs() - half;
    let dy = (from.y - target.position.y).abs() - half;
    dx.max(dy).max(0.0)
}

fn stand_down(map: &mut GameMap, unit: EntityId) {
    if let Some(entity) = map.entity_mut(unit) {
        entity.command.clear();
    }
}

/// First free walkable tile around a building, ring by ring
fn spawn_tile(map: &GameMap, position: Vec2, size: u32) -> Option<TilePos> {
    let centre = position.tile();
    let first = size as i32 / 2 + 1;
    (first..=first + 4)
        .flat_map(|radius| centre.ring(radius))
        .find(|tile| map.walkable_position(*tile) && map.entities_at(*tile).is_empty())
}

impl Stepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units currently following a route
    pub fn routed_units(&self) -> usize {
        self.routes.len()
    }

    /// Advance the world by `dt` seconds
    pub fn step(&mut self, map: &mut GameMap, planner: &mut PathPlanner, dt: Seconds) -> FrameEvents {
        let mut events = FrameEvents::default();
        self.progress_training(map, dt, &mut events);

        let units: Vec<EntityId> = map
            .entities()
            .filter(|e| e.is_unit() && e.is_alive())
            .map(|e| e.id)
            .collect();
        for unit in units {
            self.update_unit(map, planner, unit, dt, &mut events);
        }

        fire_keeps(map, dt);
        self.remove_fallen(map, &mut events);
        events
    }

    fn progress_training(&mut self, map: &mut GameMap, dt: Seconds, events: &mut FrameEvents) {
        let trainers: Vec<(EntityId, UnitKind, TeamId, Vec2, u32)> = map
            .entities()
            .filter(|e| e.is_building() && e.is_built() && e.is_alive())
            .filter_map(|e| Some((e.id, *e.training_queue.front()?, e.team?, e.position, e.size())))
            .collect();

        for (building, kind, team, position, size) in trainers {
            let progress = self.training.entry(building).or_insert(0.0);
            *progress += dt;
            if *progress < kind.training_time() {
                continue;
            }

            // A blocked exit keeps the finished unit waiting
            let Some(tile) = spawn_tile(map, position, size) else {
                continue;
            };
            match map.add_entity(Entity::unit(kind, team), tile.x as f32, tile.y as f32) {
                Ok(id) => {
                    if let Some(entity) = map.entity_mut(building) {
                        entity.training_queue.pop_front();
                    }
                    self.training.remove(&building);
                    events.trained.push(id);
                    debug!(?team, ?kind, ?id, "Unit trained");
                }
                Err(err) => warn!(?building, %err, "Trained unit could not be placed"),
            }
        }
    }

    fn update_unit(
        &mut self,
        map: &mut GameMap,
        planner: &mut PathPlanner,
        unit: EntityId,
        dt: Seconds,
        events: &mut FrameEvents,
    ) {
        let Some(task) = refresh_task(map, unit) else {
            self.forget(unit);
            return;
        };
        let Some(entity) = map.entity(unit) else {
            return;
        };
        let Some(kind) = entity.unit_kind() else {
            return;
        };
        let position = entity.position;
        let command = entity.command.clone();

        let (destination, gap, range) = match task {
            Task::Move => {
                let Some(destination) = command.destination else {
                    stand_down(map, unit);
                    return;
                };
                (destination, position.distance(&destination), ARRIVAL_TOLERANCE)
            }
            _ => {
                let Some(target) = command.target.and_then(|id| map.entity(id)) else {
                    stand_down(map, unit);
                    return;
                };
                let range = if task == Task::Attack { kind.attack_range() } else { WORK_RANGE };
                (target.position, edge_gap(position, target), range)
            }
        };

        if gap > range {
            match self.follow_route(map, planner, unit, position, kind.speed(), destination, dt) {
                RouteProgress::Moving => return,
                RouteProgress::Arrived if task != Task::Move && gap <= range + ARRIVAL_SLACK => {}
                RouteProgress::Arrived | RouteProgress::Unreachable => {
                    self.routes.remove(&unit);
                    stand_down(map, unit);
                    return;
                }
            }
        }
        self.routes.remove(&unit);

        let dt = dt as f32;
        match (task, command.target) {
            // Move orders end on arrival
            (Task::Move, _) | (_, None) => stand_down(map, unit),
            (Task::Collect, Some(target)) => self.gather(map, unit, target, dt),
            (Task::Stock, Some(_)) => deposit(map, unit),
            (Task::Build, Some(target)) => {
                if raise(map, target, dt, true) {
                    events.completed.push(target);
                }
            }
            (Task::Repair, Some(target)) => {
                raise(map, target, dt, false);
            }
            (Task::Attack, Some(target)) => {
                if let Some(victim) = map.entity_mut(target) {
                    victim.hp -= kind.attack_damage() * dt;
                }
            }
        }
    }

    /// Walk `unit` towards `destination`, planning a route when needed
    #[allow(clippy::too_many_arguments)]
    fn follow_route(
        &mut self,
        map: &mut GameMap,
        planner: &mut PathPlanner,
        unit: EntityId,
        position: Vec2,
        speed: f32,
        destination: Vec2,
        dt: Seconds,
    ) -> RouteProgress {
        let goal = destination.tile();
        let stale = self.routes.get(&unit).map_or(true, |route| route.goal != goal);
        if stale {
            let waypoints = planner.find_path(position, destination, &*map);
            if waypoints.is_empty() {
                self.routes.remove(&unit);
                return RouteProgress::Unreachable;
            }
            self.routes.insert(unit, Route { goal, waypoints: waypoints.into() });
        }

        let Some(route) = self.routes.get_mut(&unit) else {
            return RouteProgress::Unreachable;
        };
        if route.waypoints.is_empty() {
            return RouteProgress::Arrived;
        }

        let mut budget = speed * dt as f32;
        let mut current = position;
        while budget > 0.0 {
            let Some(next) = route.waypoints.front().copied() else {
                break;
            };
            let distance = current.distance(&next);
            if distance <= budget {
                current = next;
                budget -= distance;
                route.waypoints.pop_front();
            } else {
                current = current + (next - current) * (budget / distance);
                budget = 0.0;
            }
        }
        map.move_entity(unit, current);
        RouteProgress::Moving
    }

    fn gather(&mut self, map: &mut GameMap, unit: EntityId, target: EntityId, dt: f32) {
        let progress = self.gathered.entry(unit).or_insert(0.0);
        *progress += GATHER_RATE * dt;
        let amount = progress.floor() as u32;
        if amount == 0 {
            return;
        }
        *progress -= amount as f32;

        let Some(resource) = map.entity(target).and_then(Entity::yields) else {
            return;
        };
        let room = map
            .entity(unit)
            .map_or(0, |worker| MAXIMUM_CARRY.saturating_sub(worker.carry.total()));
        let taken = map
            .entity_mut(target)
            .map_or(0, |provider| provider.stock.take(resource, amount.min(room)));
        if let Some(worker) = map.entity_mut(unit) {
            worker.carry.add(resource, taken);
        }
    }

    fn forget(&mut self, unit: EntityId) {
        self.routes.remove(&unit);
        self.gathered.remove(&unit);
    }

    /// Drop dead entities and exhausted providers from the map
    fn remove_fallen(&mut self, map: &mut GameMap, events: &mut FrameEvents) {
        let fallen: Vec<EntityId> = map
            .entities()
            .filter(|e| !e.is_alive() || (e.provides_resources() && e.stock.is_empty()))
            .map(|e| e.id)
            .collect();

        for id in fallen {
            if let Some(entity) = map.remove_entity(id) {
                debug!(?id, kind = ?entity.kind, team = ?entity.team, "Entity removed");
            }
            self.forget(id);
            self.training.remove(&id);
            events.removed.push(id);
        }
    }
}

/// Hand a worker's load to its team
fn deposit(map: &mut GameMap, unit: EntityId) {
    let Some(worker) = map.entity_mut(unit) else {
        return;
    };
    let load = std::mem::take(&mut worker.carry);
    let Some(team) = worker.team else {
        return;
    };
    if let Some(team) = map.team_mut(team) {
        team.resources.deposit(&load);
    }
}

/// Add construction or repair progress; returns true when a site finishes
fn raise(map: &mut GameMap, building: EntityId, dt: f32, construct: bool) -> bool {
    let Some(entity) = map.entity_mut(building) else {
        return false;
    };
    let Some(kind) = entity.building_kind() else {
        return false;
    };
    let rate = entity.max_hp / kind.build_time() as f32;
    entity.hp = (entity.hp + rate * dt).min(entity.max_hp);

    if construct && !entity.built && entity.hp >= entity.max_hp {
        entity.built = true;
        info!(?building, ?kind, team = ?entity.team, "Construction finished");
        return true;
    }
    false
}

/// Finished keeps shoot the nearest enemy unit in range
fn fire_keeps(map: &mut GameMap, dt: Seconds) {
    let keeps: Vec<(TeamId, Vec2, f32)> = map
        .entities()
        .filter(|e| e.is_built() && e.is_alive() && e.building_kind() == Some(BuildingKind::Keep))
        .filter_map(|e| Some((e.team?, e.position, e.building_kind()?.attack_range()?)))
        .collect();

    for (team, position, range) in keeps {
        let victim = map
            .entities_in_radius(position, range)
            .into_iter()
            .filter_map(|id| map.entity(id))
            .filter(|e| e.is_unit() && e.is_alive() && e.team.is_some_and(|t| t != team))
            .map(|e| (OrderedFloat(e.position.distance(&position)), e.id))
            .filter(|(distance, _)| distance.0 <= range)
            .min()
            .map(|(_, id)| id);
        if let Some(victim) = victim.and_then(|id| map.entity_mut(id)) {
            victim.hp -= KEEP_DAMAGE * dt as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PathfindingConfig;
    use crate::world::command::{issue_move, issue_target};
    use crate::world::entity::ResourceNodeKind;
    use crate::world::resources::{ResourceKind, Resources};
    use crate::world::team::Team;

    fn setup() -> (GameMap, PathPlanner, Stepper) {
        let map = GameMap::new(
            30,
            30,
            10.0,
            vec![Team::new(TeamId(0)), Team::new(TeamId(1))],
        );
        (map, PathPlanner::from_config(&PathfindingConfig::default()), Stepper::new())
    }

    fn run(map: &mut GameMap, planner: &mut PathPlanner, stepper: &mut Stepper, frames: usize, dt: Seconds) -> FrameEvents {
        let mut all = FrameEvents::default();
        for _ in 0..frames {
            map.advance_clock(dt);
            let events = stepper.step(map, planner, dt);
            all.trained.extend(events.trained);
            all.completed.extend(events.completed);
            all.removed.extend(events.removed);
        }
        all
    }

    #[test]
    fn test_adjacent_worker_gathers() {
        let (mut map, mut planner, mut stepper) = setup();
        let tree = map.add_entity(Entity::resource(ResourceNodeKind::Tree), 5.0, 5.0).unwrap();
        let worker = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 6.0, 5.0).unwrap();
        issue_target(&mut map, worker, tree);

        run(&mut map, &mut planner, &mut stepper, 5, 1.0);
        assert_eq!(map.entity(worker).unwrap().carry.get(ResourceKind::Wood), 5);
        assert_eq!(map.entity(tree).unwrap().stock.wood, 95);
    }

    #[test]
    fn test_distant_worker_walks_along_route() {
        let (mut map, mut planner, mut stepper) = setup();
        let tree = map.add_entity(Entity::resource(ResourceNodeKind::Tree), 10.0, 2.0).unwrap();
        let worker = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 2.0, 2.0).unwrap();
        issue_target(&mut map, worker, tree);

        run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        // One second at villager speed, towards the tree
        let position = map.entity(worker).unwrap().position;
        assert!((position.distance(&Vec2::new(2.0, 2.0)) - 1.0).abs() < 1e-4, "{position:?}");
        assert!(position.distance(&Vec2::new(10.0, 2.0)) < 7.5);
        assert_eq!(stepper.routed_units(), 1);
        assert_eq!(planner.cache().len(), 1);
    }

    #[test]
    fn test_builder_finishes_site() {
        let (mut map, mut planner, mut stepper) = setup();
        let site = map
            .add_entity(Entity::construction_site(BuildingKind::House, TeamId(0)), 5.0, 5.0)
            .unwrap();
        let builder = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 4.0, 5.0).unwrap();
        issue_target(&mut map, builder, site);

        let events = run(&mut map, &mut planner, &mut stepper, 24, 1.0);
        assert!(events.completed.is_empty());
        let events = run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        assert_eq!(events.completed, vec![site]);
        assert!(map.entity(site).unwrap().is_built());

        // Site done, builder goes idle
        run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        assert!(map.entity(builder).unwrap().command.is_idle());
    }

    #[test]
    fn test_training_spawns_next_to_building() {
        let (mut map, mut planner, mut stepper) = setup();
        let centre = map.add_entity(Entity::building(BuildingKind::TownCentre, TeamId(0)), 10.0, 10.0).unwrap();
        map.entity_mut(centre).unwrap().training_queue.push_back(UnitKind::Villager);

        let events = run(&mut map, &mut planner, &mut stepper, 11, 1.0);
        assert!(events.trained.is_empty());
        let events = run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        assert_eq!(events.trained.len(), 1);

        let villager = map.entity(events.trained[0]).unwrap();
        assert_eq!(villager.team, Some(TeamId(0)));
        assert!(edge_gap(villager.position, map.entity(centre).unwrap()) <= 2.0);
        assert!(map.entity(centre).unwrap().training_queue.is_empty());
    }

    #[test]
    fn test_ranged_attack_kills_and_removes() {
        let (mut map, mut planner, mut stepper) = setup();
        let archer = map.add_entity(Entity::unit(UnitKind::Archer, TeamId(0)), 2.0, 2.0).unwrap();
        let victim = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(1)), 5.0, 2.0).unwrap();
        issue_target(&mut map, archer, victim);

        let events = run(&mut map, &mut planner, &mut stepper, 13, 1.0);
        assert!(events.removed.is_empty());
        // Archers shoot from range without moving
        assert_eq!(map.entity(archer).unwrap().position, Vec2::new(2.0, 2.0));

        let events = run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        assert_eq!(events.removed, vec![victim]);
        assert!(map.entity(victim).is_none());
    }

    #[test]
    fn test_unreachable_move_stands_down() {
        let (mut map, mut planner, mut stepper) = setup();
        let unit = map.add_entity(Entity::unit(UnitKind::Swordsman, TeamId(0)), 0.0, 0.0).unwrap();
        for (x, y) in [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
            map.add_entity(Entity::resource(ResourceNodeKind::GoldMine), x, y).unwrap();
        }
        issue_move(&mut map, unit, Vec2::new(10.0, 10.0));

        run(&mut map, &mut planner, &mut stepper, 1, 1.0);
        assert!(map.entity(unit).unwrap().command.is_idle());
        assert_eq!(map.entity(unit).unwrap().position, Vec2::new(0.0, 0.0));
    }

    #[test]
    fn test_stocking_deposits_into_team() {
        let (mut map, mut planner, mut stepper) = setup();
        let centre = map.add_entity(Entity::building(BuildingKind::TownCentre, TeamId(0)), 10.0, 10.0).unwrap();
        let worker = map.add_entity(Entity::unit(UnitKind::Villager, TeamId(0)), 14.0, 11.0).unwrap();
        map.entity_mut(worker).unwrap().carry = Resources::new(0, 12, 0);
        issue_target(&mut map, worker, centre);

        run(&mut map, &mut planner, &mut stepper, 1, 0.5);
        assert_eq!(map.team(TeamId(0)).unwrap().resources.wood, 12);
        assert!(map.entity(worker).unwrap().carry.is_empty());
    }

    #[test]
    fn test_keep_shoots_intruders() {
        let (mut map, mut planner, mut stepper) = setup();
        map.add_entity(Entity::building(BuildingKind::Keep, TeamId(0)), 10.0, 10.0).unwrap();
        let intruder = map.add_entity(Entity::unit(UnitKind::Archer, TeamId(1)), 14.0, 10.0).unwrap();
        let friend = map.add_entity(Entity::unit(UnitKind::Archer, TeamId(0)), 11.0, 10.0).unwrap();

        run(&mut map, &mut planner, &mut stepper, 2, 1.0);
        assert_eq!(map.entity(intruder).unwrap().hp, UnitKind::Archer.max_hp() - 2.0 * KEEP_DAMAGE);
        assert_eq!(map.entity(friend).unwrap().hp, UnitKind::Archer.max_hp());
    }
}
