//! Worker economy: idle assignment, shortages and reallocation

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::ai::bot::BotContext;
use crate::core::types::{EntityId, TilePos, Vec2};
use crate::world::command::{issue_move, issue_target, Task};
use crate::world::entity::{BuildingKind, Entity};
use crate::world::resources::ResourceKind;

impl BotContext<'_> {
    /// Farms some worker of this team is already collecting from
    fn worked_farms(&self) -> AHashSet<EntityId> {
        self.map
            .team_villagers(self.team())
            .filter(|v| v.command.task == Some(Task::Collect))
            .filter_map(|v| v.command.target)
            .filter(|id| {
                self.map
                    .entity(*id)
                    .and_then(Entity::building_kind)
                    .is_some_and(|kind| kind == BuildingKind::Farm)
            })
            .collect()
    }

    /// Provider a worker of this team may gather from
    fn is_collectable(&self, entity: &Entity, worked_farms: &AHashSet<EntityId>) -> bool {
        if !entity.provides_resources() || !entity.has_stock() {
            return false;
        }
        match entity.team {
            None => true,
            Some(team) => team == self.team() && entity.is_built() && !worked_farms.contains(&entity.id),
        }
    }

    /// Nearest collectable provider on the first perimeter ring that has one
    ///
    /// Rings grow from radius 1 to `max_radius` around `origin`; within a
    /// ring the candidate with the smallest Manhattan offset wins.
    pub fn scan_resources(
        &self,
        origin: TilePos,
        max_radius: i32,
        mut accept: impl FnMut(&Entity) -> bool,
    ) -> Option<EntityId> {
        for radius in 1..=max_radius {
            let mut best: Option<(u32, EntityId)> = None;
            for tile in origin.ring(radius) {
                for id in self.map.resources_at(tile) {
                    let Some(entity) = self.map.entity(*id) else {
                        continue;
                    };
                    if !accept(entity) {
                        continue;
                    }
                    let distance = tile.manhattan(&origin);
                    if best.map_or(true, |(d, _)| distance < d) {
                        best = Some((distance, *id));
                    }
                }
            }
            if let Some((_, id)) = best {
                return Some(id);
            }
        }
        None
    }

    /// Nearest collectable provider anywhere on the map
    fn nearest_resource_anywhere(&self, from: Vec2, worked_farms: &AHashSet<EntityId>) -> Option<EntityId> {
        self.map
            .entities()
            .filter(|entity| self.is_collectable(entity, worked_farms))
            .min_by_key(|entity| OrderedFloat(entity.position.distance(&from)))
            .map(|entity| entity.id)
    }

    fn nearest_unfinished_site(&self, from: Vec2) -> Option<EntityId> {
        self.map
            .team_buildings(self.team())
            .filter(|building| !building.is_built())
            .min_by_key(|building| OrderedFloat(building.position.distance(&from)))
            .map(|building| building.id)
    }

    /// Rally point: the team's first Town Centre, else its first building
    pub fn rally_point(&self) -> Option<Vec2> {
        self.map
            .team_buildings(self.team())
            .filter(|b| b.is_built())
            .find(|b| b.building_kind() == Some(BuildingKind::TownCentre))
            .or_else(|| self.map.team_buildings(self.team()).find(|b| b.is_built()))
            .map(|b| b.position)
    }

    /// Give every idle villager something to do; returns how many got orders
    pub fn assign_idle_workers(&mut self) -> usize {
        let idle: Vec<(EntityId, Vec2, bool)> = self
            .map
            .team_villagers(self.team())
            .filter(|v| v.command.is_idle())
            .map(|v| (v.id, v.position, !v.carry.is_empty()))
            .collect();
        if idle.is_empty() {
            return 0;
        }

        let mut worked_farms = self.worked_farms();
        let rally = self.rally_point();
        let mut assigned = 0;

        for (worker, position, carrying) in idle {
            if carrying {
                if let Some(drop) = self.map.nearest_drop_point(self.team(), position) {
                    if issue_target(self.map, worker, drop).is_some() {
                        assigned += 1;
                        continue;
                    }
                }
            }

            let resource = self
                .scan_resources(position.tile(), self.config.idle_scan_radius, |e| {
                    self.is_collectable(e, &worked_farms)
                })
                .or_else(|| self.nearest_resource_anywhere(position, &worked_farms));
            if let Some(resource) = resource {
                if issue_target(self.map, worker, resource) == Some(Task::Collect) {
                    if self.map.entity(resource).is_some_and(|e| e.team.is_some()) {
                        worked_farms.insert(resource);
                    }
                    assigned += 1;
                    continue;
                }
            }

            if let Some(site) = self.nearest_unfinished_site(position) {
                if issue_target(self.map, worker, site).is_some() {
                    assigned += 1;
                    continue;
                }
            }

            if let Some(rally) = rally {
                if position.distance(&rally) > self.config.rally_threshold && issue_move(self.map, worker, rally) {
                    assigned += 1;
                }
            }
        }

        if assigned > 0 {
            debug!(team = ?self.team(), assigned, "Idle workers assigned");
        }
        assigned
    }

    /// Whether gathering `kind` is possible at all for this team
    fn has_source(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Food => self
                .map
                .team_buildings(self.team())
                .any(|b| b.yields() == Some(ResourceKind::Food) && b.is_built() && b.has_stock()),
            _ => self
                .map
                .entities()
                .any(|e| e.team.is_none() && e.yields() == Some(kind) && e.has_stock()),
        }
    }

    /// Resource most urgently short, or None
    ///
    /// Pending basic construction comes first: the first needed building
    /// the team cannot afford names its largest shortfall. Otherwise the
    /// fixed thresholds are checked in food, wood, gold order. Resources
    /// the team has no way to gather are never reported.
    pub fn resource_shortage(&self) -> Option<ResourceKind> {
        let stock = self.map.team(self.team())?.resources;

        for kind in self.basic_building_needs() {
            let cost = kind.cost();
            if stock.has_enough(&cost) {
                continue;
            }
            if let Some(short) = stock.deficit(&cost).largest().filter(|k| self.has_source(*k)) {
                return Some(short);
            }
        }

        let thresholds = self.config.resource_thresholds;
        ResourceKind::ALL
            .into_iter()
            .find(|kind| stock.get(*kind) < thresholds.get(*kind) && self.has_source(*kind))
    }

    /// Own built farm nobody collects from yet
    fn free_farm(&self, worked_farms: &AHashSet<EntityId>, near: Vec2) -> Option<EntityId> {
        self.map
            .team_buildings(self.team())
            .filter(|b| b.building_kind() == Some(BuildingKind::Farm))
            .filter(|b| self.is_collectable(b, worked_farms))
            .min_by_key(|b| OrderedFloat(b.position.distance(&near)))
            .map(|b| b.id)
    }

    /// Point up to a batch of workers at `kind`, honouring the cooldown
    pub fn reallocate_workers(&mut self, kind: ResourceKind) -> usize {
        let now = self.now();
        if let Some(last) = self.state.last_reallocation {
            if now - last < self.config.reallocation_cooldown {
                return 0;
            }
        }

        let assigned = self.send_workers_to(kind, false);
        if assigned > 0 {
            self.state.last_reallocation = Some(now);
            debug!(team = ?self.team(), ?kind, assigned, "Workers reallocated");
        }
        assigned
    }

    /// Send idle workers (and, unless `idle_only`, workers gathering
    /// something else) towards the nearest `kind` provider
    pub fn send_workers_to(&mut self, kind: ResourceKind, idle_only: bool) -> usize {
        let candidates: Vec<(EntityId, Vec2)> = self
            .map
            .team_villagers(self.team())
            .filter(|v| {
                if v.command.is_idle() {
                    return true;
                }
                if idle_only || v.command.task != Some(Task::Collect) {
                    return false;
                }
                v.command
                    .target
                    .and_then(|id| self.map.entity(id))
                    .and_then(Entity::yields)
                    .is_some_and(|gathered| gathered != kind)
            })
            .map(|v| (v.id, v.position))
            .take(self.config.reallocation_batch)
            .collect();

        let mut worked_farms = self.worked_farms();
        let mut assigned = 0;
        for (worker, position) in candidates {
            let mut wanted = kind;
            if kind == ResourceKind::Food {
                if let Some(farm) = self.free_farm(&worked_farms, position) {
                    if issue_target(self.map, worker, farm) == Some(Task::Collect) {
                        worked_farms.insert(farm);
                        assigned += 1;
                    }
                    continue;
                }
                wanted = ResourceKind::Wood;
            }

            let origin = self
                .map
                .nearest_drop_point(self.team(), position)
                .and_then(|drop| self.map.entity(drop))
                .map_or(position, |drop| drop.position)
                .tile();
            let target = self.scan_resources(origin, self.config.resource_scan_radius, |e| {
                e.team.is_none() && e.yields() == Some(wanted) && e.has_stock()
            });
            if let Some(target) = target {
                if issue_target(self.map, worker, target) == Some(Task::Collect) {
                    assigned += 1;
                }
            }
        }
        assigned
    }
}
