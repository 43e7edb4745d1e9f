//! Construction needs, site search, building placement and repairs

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::ai::bot::BotContext;
use crate::core::types::{EntityId, TilePos, Vec2};
use crate::world::command::{issue_repair, issue_target, Task};
use crate::world::entity::BuildingKind;

/// Buildings every base should have, in construction order
pub const ESSENTIAL_BUILDINGS: [BuildingKind; 5] = [
    BuildingKind::TownCentre,
    BuildingKind::House,
    BuildingKind::Camp,
    BuildingKind::Barracks,
    BuildingKind::Farm,
];

/// Unlocked once the team is ready to expand
pub const ADVANCED_BUILDINGS: [BuildingKind; 3] = [BuildingKind::ArcheryRange, BuildingKind::Stable, BuildingKind::Keep];

impl BotContext<'_> {
    /// Owned buildings per kind, construction sites included
    fn building_counts(&self) -> AHashMap<BuildingKind, usize> {
        let mut counts = AHashMap::new();
        for kind in self.map.team_buildings(self.team()).filter_map(|b| b.building_kind()) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }

    /// Population is close to the housing limit and the cap allows more
    pub fn needs_population_buildings(&self) -> bool {
        let team = self.team();
        let housing_underway = self
            .map
            .team_buildings(team)
            .any(|b| !b.is_built() && b.building_kind().is_some_and(|k| k.population() > 0));
        if housing_underway {
            return false;
        }
        let capacity = self.map.population_capacity(team);
        let cap = self.config.population_cap.min(self.map.team(team).map_or(0, |t| t.max_population));
        self.map.population(team) + self.config.population_margin >= capacity && capacity < cap
    }

    /// Essential, farm, housing and requested buildings still missing
    pub fn basic_building_needs(&self) -> Vec<BuildingKind> {
        let counts = self.building_counts();
        let owned = |kind: BuildingKind| counts.get(&kind).copied().unwrap_or(0);
        let mut needed: Vec<BuildingKind> = ESSENTIAL_BUILDINGS.into_iter().filter(|k| owned(*k) == 0).collect();

        let farm_target = (self.villager_count() / self.config.workers_per_farm.max(1)).max(1);
        if owned(BuildingKind::Farm) < farm_target && !needed.contains(&BuildingKind::Farm) {
            needed.push(BuildingKind::Farm);
        }

        if self.needs_population_buildings() && !needed.contains(&BuildingKind::House) {
            needed.push(BuildingKind::House);
        }

        for kind in &self.state.requested_buildings {
            if owned(*kind) == 0 && !needed.contains(kind) {
                needed.push(*kind);
            }
        }
        needed
    }

    /// Everything the team should build now, most important first
    pub fn building_needs(&self) -> Vec<BuildingKind> {
        let mut needed = self.basic_building_needs();
        if self.ready_to_expand() {
            let counts = self.building_counts();
            for kind in ADVANCED_BUILDINGS {
                if !counts.contains_key(&kind) && !needed.contains(&kind) {
                    needed.push(kind);
                }
            }
        }
        needed
    }

    /// Stable economy, a large enough army, and a town centre plus barracks
    pub fn ready_to_expand(&self) -> bool {
        if self.resource_shortage().is_some() || self.military_count() < self.config.expansion_army {
            return false;
        }
        let team = self.team();
        [BuildingKind::TownCentre, BuildingKind::Barracks].iter().all(|kind| {
            self.map
                .team_buildings(team)
                .any(|b| b.building_kind() == Some(*kind) && b.is_built())
        })
    }

    /// First tile on growing perimeter rings around `reference` where the
    /// footprint of `kind` fits
    pub fn find_build_site(&self, kind: BuildingKind, reference: Vec2) -> Option<TilePos> {
        let origin = reference.tile();
        let size = kind.size();
        (1..=self.config.build_site_radius)
            .flat_map(|radius| origin.ring(radius))
            .find(|tile| self.map.buildable_position(tile.x, tile.y, size))
    }

    /// Reference point for new construction: the Town Centre if there is one
    fn base_reference(&self) -> Option<Vec2> {
        self.rally_point()
            .or_else(|| self.map.team_buildings(self.team()).next().map(|b| b.position))
    }

    /// Place a site for `kind` near `reference` and send builders to it
    pub fn build_building(&mut self, kind: BuildingKind, builders: usize, reference: Vec2) -> Option<EntityId> {
        let team = self.team();
        if !self.map.team(team)?.resources.has_enough(&kind.cost()) {
            return None;
        }
        let site_tile = self.find_build_site(kind, reference)?;
        let site = match self.map.place_construction(team, kind, site_tile.x, site_tile.y) {
            Ok(site) => site,
            Err(err) => {
                debug!(?team, ?kind, %err, "Construction rejected");
                return None;
            }
        };
        self.state.requested_buildings.retain(|requested| *requested != kind);

        let site_position = self.map.entity(site)?.position;
        let mut villagers: Vec<(bool, f32, EntityId)> = self
            .map
            .team_villagers(team)
            .filter(|v| !matches!(v.command.task, Some(Task::Build) | Some(Task::Repair)))
            .map(|v| (!v.command.is_idle(), v.position.distance(&site_position), v.id))
            .collect();
        // Idle villagers first, then the closest
        villagers.sort_by_key(|(busy, distance, id)| (*busy, OrderedFloat(*distance), *id));

        let sent = villagers
            .into_iter()
            .take(builders)
            .filter(|(_, _, worker)| issue_target(self.map, *worker, site) == Some(Task::Build))
            .count();
        debug!(?team, ?kind, ?site_tile, builders = sent, "Construction started");
        Some(site)
    }

    /// Start the first needed building the team can afford
    pub fn build_structure(&mut self, builders: usize) -> bool {
        let Some(reference) = self.base_reference() else {
            return false;
        };
        let Some(stock) = self.map.team(self.team()).map(|t| t.resources) else {
            return false;
        };
        for kind in self.building_needs() {
            if !stock.has_enough(&kind.cost()) {
                continue;
            }
            if self.build_building(kind, builders, reference).is_some() {
                return true;
            }
        }
        false
    }

    /// Finished buildings below the critical health ratio, weakest first
    pub fn critical_buildings(&self) -> Vec<EntityId> {
        let mut critical: Vec<(f32, EntityId)> = self
            .map
            .team_buildings(self.team())
            .filter(|b| b.is_built() && b.health_ratio() < self.config.critical_health_ratio)
            .map(|b| (b.health_ratio(), b.id))
            .collect();
        critical.sort_by_key(|(ratio, id)| (OrderedFloat(*ratio), *id));
        critical.into_iter().map(|(_, id)| id).collect()
    }

    /// Send villagers to the most damaged buildings; returns how many went
    pub fn repair_buildings(&mut self) -> usize {
        let critical = self.critical_buildings();
        if critical.is_empty() {
            return 0;
        }

        // Idle villagers first, then gatherers
        let mut available: Vec<EntityId> = self
            .map
            .team_villagers(self.team())
            .filter(|v| v.command.is_idle())
            .map(|v| v.id)
            .collect();
        available.extend(
            self.map
                .team_villagers(self.team())
                .filter(|v| v.command.task == Some(Task::Collect))
                .map(|v| v.id),
        );

        let mut workers = available.into_iter();
        let mut assigned = 0;
        'buildings: for building in critical.into_iter().take(self.config.max_repair_sites) {
            let mut sent = 0;
            while sent < self.config.repairers_per_site {
                let Some(worker) = workers.next() else {
                    break 'buildings;
                };
                if issue_repair(self.map, worker, building) {
                    sent += 1;
                }
            }
            assigned += sent;
        }
        if assigned > 0 {
            debug!(team = ?self.team(), assigned, "Repairs ordered");
        }
        assigned
    }
}
