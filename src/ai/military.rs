//! Threat detection, defense, training and offensive orders

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::ai::bot::{BotContext, ThreatReport, TrainOutcome};
use crate::core::types::{EntityId, TeamId, Vec2};
use crate::world::command::{issue_target, Task};
use crate::world::entity::{BuildingKind, Entity, UnitKind};

impl BotContext<'_> {
    /// Enemy units standing within the threat radius of any owned building
    ///
    /// Results are reused for `threat_cache_ttl` seconds.
    pub fn detect_threats(&mut self) -> ThreatReport {
        let now = self.now();
        if let Some((scanned_at, report)) = &self.state.threat_cache {
            if now - scanned_at < self.config.threat_cache_ttl {
                return report.clone();
            }
        }

        let team = self.team();
        let radius = self.config.threat_radius;
        let mut attackers: Vec<EntityId> = Vec::new();
        for building in self.map.team_buildings(team) {
            let tile = building.tile();
            for id in self.map.spatial().query_world_radius(building.position, radius as f32) {
                let hostile = self.map.entity(id).is_some_and(|e| {
                    e.is_unit() && e.is_alive() && e.team.is_some_and(|t| t != team) && e.tile().within(&tile, radius)
                });
                if hostile {
                    attackers.push(id);
                }
            }
        }
        attackers.sort();
        attackers.dedup();
        attackers.truncate(self.config.max_reported_attackers);

        let report = ThreatReport { attackers };
        if report.is_under_attack() {
            debug!(?team, attackers = report.attackers.len(), "Base under attack");
        }
        self.state.threat_cache = Some((now, report.clone()));
        report
    }

    fn nearest_enemy(&self, enemy: TeamId, from: Vec2, accept: impl Fn(&Entity) -> bool) -> Option<&Entity> {
        self.map
            .team_entities(enemy)
            .filter(|e| accept(e))
            .min_by_key(|e| (OrderedFloat(e.position.distance(&from)), e.id))
    }

    /// Pick what a unit at `from` should fight on team `enemy`
    ///
    /// Combat units come first. Only in attack mode do workers and buildings
    /// qualify, nearest of either kind, and then a built keep covering the
    /// chosen target draws the attack onto itself.
    pub fn choose_target(&self, from: Vec2, enemy: TeamId, attack_mode: bool) -> Option<EntityId> {
        if let Some(unit) = self.nearest_enemy(enemy, from, Entity::is_combat_unit) {
            if !attack_mode {
                return Some(unit.id);
            }
            return Some(self.keep_covering(enemy, unit).unwrap_or(unit.id));
        }
        if !attack_mode {
            return None;
        }

        let target = self.nearest_enemy(enemy, from, |e| e.is_worker() || e.is_building())?;
        Some(self.keep_covering(enemy, target).unwrap_or(target.id))
    }

    /// A finished enemy keep whose range covers `target`
    fn keep_covering(&self, enemy: TeamId, target: &Entity) -> Option<EntityId> {
        if target.building_kind() == Some(BuildingKind::Keep) {
            return None;
        }
        self.map
            .team_buildings(enemy)
            .filter(|b| b.is_built())
            .filter_map(|b| {
                let range = b.building_kind()?.attack_range()?;
                let distance = b.position.distance(&target.position);
                (distance < range).then_some((OrderedFloat(distance), b.id))
            })
            .min()
            .map(|(_, id)| id)
    }

    /// Order `unit` onto the best target of team `enemy`
    pub fn search_for_target(&mut self, unit: EntityId, enemy: TeamId, attack_mode: bool) -> Option<EntityId> {
        let from = self.map.entity(unit)?.position;
        let target = self.choose_target(from, enemy, attack_mode)?;
        (issue_target(self.map, unit, target) == Some(Task::Attack)).then_some(target)
    }

    /// Own combat units not already fighting a live enemy
    fn available_military(&self) -> Vec<(EntityId, Vec2)> {
        self.map
            .team_military(self.team())
            .filter(|unit| {
                unit.command.task != Some(Task::Attack)
                    || !unit
                        .command
                        .target
                        .and_then(|id| self.map.entity(id))
                        .is_some_and(Entity::is_alive)
            })
            .map(|unit| (unit.id, unit.position))
            .collect()
    }

    /// Send defenders at the reported attackers, then reinforce
    ///
    /// Each attacker gets up to `defenders_per_attacker` of the nearest
    /// available combat units. Afterwards the bot trains more units and tries
    /// to raise a keep next to the building closest to the first attacker.
    pub fn rally_defense(&mut self, report: &ThreatReport) -> usize {
        let mut available = self.available_military();
        let mut assigned = 0;
        for attacker in &report.attackers {
            let Some(attacker_position) = self.map.entity(*attacker).map(|a| a.position) else {
                continue;
            };
            for _ in 0..self.config.defenders_per_attacker {
                let Some(index) = available
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (id, position))| (OrderedFloat(position.distance(&attacker_position)), *id))
                    .map(|(index, _)| index)
                else {
                    break;
                };
                let (defender, _) = available.swap_remove(index);
                if issue_target(self.map, defender, *attacker) == Some(Task::Attack) {
                    assigned += 1;
                }
            }
        }
        if assigned > 0 {
            info!(team = ?self.team(), defenders = assigned, attackers = report.attackers.len(), "Defense rallied");
        }

        self.balance_army();
        self.fortify_front(report);
        assigned
    }

    /// Start a keep beside the building nearest to the first attacker,
    /// unless one already stands or is rising there
    fn fortify_front(&mut self, report: &ThreatReport) -> Option<EntityId> {
        let attacker = self.map.entity(*report.attackers.first()?)?.position;
        let team = self.team();
        let front = self
            .map
            .team_buildings(team)
            .min_by_key(|b| (OrderedFloat(b.position.distance(&attacker)), b.id))?
            .position;

        let guard_range = BuildingKind::Keep.attack_range().unwrap_or_default();
        let guarded = self
            .map
            .team_buildings(team)
            .any(|b| b.building_kind() == Some(BuildingKind::Keep) && b.position.distance(&front) < guard_range);
        if guarded {
            return None;
        }
        self.build_building(BuildingKind::Keep, self.config.keep_builders, front)
    }

    /// Queue one unit of `kind` at the least busy building that trains it
    pub fn train_unit(&mut self, kind: UnitKind) -> TrainOutcome {
        let team = self.team();
        if self.map.population(team) >= self.map.population_capacity(team) {
            return TrainOutcome::PopulationCapped;
        }
        let stock = self.map.team(team).map(|t| t.resources).unwrap_or_default();
        if let Some(missing) = stock.deficit(&kind.cost()).largest() {
            return TrainOutcome::MissingResources(missing);
        }

        let trainer = kind.trained_at();
        let Some(building) = self
            .map
            .team_buildings(team)
            .filter(|b| b.is_built() && b.building_kind() == Some(trainer))
            .min_by_key(|b| (b.training_queue.len(), b.id))
            .map(|b| b.id)
        else {
            return TrainOutcome::MissingBuilding(trainer);
        };

        if self.map.queue_training(building, kind) {
            debug!(?team, ?kind, ?building, "Training queued");
            TrainOutcome::Queued
        } else {
            TrainOutcome::MissingBuilding(trainer)
        }
    }

    /// React to a blocked training order
    fn unblock(&mut self, outcome: TrainOutcome) {
        match outcome {
            TrainOutcome::MissingResources(kind) => {
                self.send_workers_to(kind, true);
            }
            TrainOutcome::MissingBuilding(kind) => {
                if !self.state.requested_buildings.contains(&kind) {
                    self.state.requested_buildings.push(kind);
                }
            }
            TrainOutcome::Queued | TrainOutcome::PopulationCapped => {}
        }
    }

    /// Queue one unit: a villager while below the worker target, otherwise
    /// the first military kind by priority
    ///
    /// Returns how many units were queued.
    pub fn balance_army(&mut self) -> usize {
        if self.villager_count() < self.config.worker_target {
            match self.train_unit(UnitKind::Villager) {
                TrainOutcome::Queued => return 1,
                blocked => self.unblock(blocked),
            }
        }

        if self.military_count() < self.config.military_cap {
            for kind in self.state.priorities.order() {
                match self.train_unit(kind) {
                    TrainOutcome::Queued => return 1,
                    TrainOutcome::PopulationCapped => break,
                    blocked => self.unblock(blocked),
                }
            }
        }
        0
    }

    /// Non-worker units plus non-keep buildings of `team`
    fn strength(&self, team: TeamId) -> usize {
        self.map
            .team_entities(team)
            .filter(|e| e.is_combat_unit() || (e.is_building() && e.building_kind() != Some(BuildingKind::Keep)))
            .count()
    }

    /// Send combat units without a live target after the weakest enemy,
    /// sticking with the current target team while it is still in the match
    pub fn pursue_offense(&mut self) -> usize {
        let enemies = self.enemies();
        let target_team = match self.state.offense_target.filter(|team| enemies.contains(team)) {
            Some(team) => team,
            None => {
                let Some(weakest) = enemies.iter().copied().min_by_key(|team| (self.strength(*team), *team)) else {
                    self.state.offense_target = None;
                    return 0;
                };
                info!(team = ?self.team(), target = ?weakest, "Offense target chosen");
                weakest
            }
        };
        self.state.offense_target = Some(target_team);

        let available: Vec<EntityId> = self.available_military().into_iter().map(|(id, _)| id).collect();
        available
            .into_iter()
            .filter(|unit| self.search_for_target(*unit, target_team, true).is_some())
            .count()
    }

    /// Commit most of the army against the enemy with the smallest army,
    /// aiming at its population buildings first
    pub fn expand(&mut self) -> usize {
        let Some(enemy) = self
            .enemies()
            .into_iter()
            .min_by_key(|team| (self.map.team_military(*team).count(), *team))
        else {
            return 0;
        };

        let army: Vec<EntityId> = self.map.team_military(self.team()).map(|u| u.id).collect();
        let force = (army.len() as f32 * self.config.expansion_force_share).floor() as usize;
        let housing = self
            .map
            .team_buildings(enemy)
            .find(|b| b.building_kind().is_some_and(|k| k.population() > 0))
            .map(|b| b.id);

        let mut committed = AHashSet::new();
        for unit in army.into_iter().take(force) {
            let sent = match housing {
                Some(target) => issue_target(self.map, unit, target) == Some(Task::Attack),
                None => self.search_for_target(unit, enemy, true).is_some(),
            };
            if sent {
                committed.insert(unit);
            }
        }
        if !committed.is_empty() {
            info!(team = ?self.team(), ?enemy, units = committed.len(), "Expansion attack launched");
        }
        committed.len()
    }
}
