//! Unit commands - the fields the strategic layer writes for units
//!
//! Task lifecycle: `idle -> {collect, build, repair, stock, attack, move} -> idle`.
//! New commands override whatever the unit was doing. `refresh_task` applies
//! the liveness transitions the per-frame update relies on (dead targets,
//! full carry, empty carry).

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Vec2};
use crate::world::entity::Entity;
use crate::world::map::GameMap;

/// Maximum resources a worker carries before returning to a drop point
pub const MAXIMUM_CARRY: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Collect,
    Build,
    Repair,
    Stock,
    Attack,
    Move,
}

/// Command state of a unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitCommand {
    pub task: Option<Task>,
    pub target: Option<EntityId>,
    pub destination: Option<Vec2>,
    /// Resource to go back to after a drop-off
    pub resume: Option<EntityId>,
}

impl UnitCommand {
    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn assign(&mut self, task: Task, target: EntityId) {
        self.task = Some(task);
        self.target = Some(target);
        self.destination = None;
    }
}

/// Task a unit would take on when ordered onto `target`
pub fn classify_target(unit: &Entity, target: &Entity) -> Option<Task> {
    if !target.is_alive() || target.id == unit.id || !unit.is_unit() {
        return None;
    }

    let same_team = target.team.is_some() && target.team == unit.team;
    if same_team {
        if !unit.is_worker() || !target.is_building() {
            return None;
        }
        if !target.is_built() {
            return Some(Task::Build);
        }
        if target.is_drop_point() {
            return Some(Task::Stock);
        }
        if target.provides_resources() && target.has_stock() {
            return Some(Task::Collect);
        }
        return None;
    }

    if target.team.is_none() {
        return (unit.is_worker() && target.has_stock()).then_some(Task::Collect);
    }

    Some(Task::Attack)
}

/// Order `unit` onto `target`, replacing its current command
///
/// Returns the task taken on; an invalid target leaves the unit idle.
pub fn issue_target(map: &mut GameMap, unit: EntityId, target: EntityId) -> Option<Task> {
    let task = match (map.entity(unit), map.entity(target)) {
        (Some(u), Some(t)) => classify_target(u, t),
        _ => None,
    };

    let entity = map.entity_mut(unit)?;
    let resume = entity.command.resume;
    entity.command.clear();
    let task = task?;
    entity.command.assign(task, target);
    if task == Task::Stock {
        entity.command.resume = resume;
    }
    Some(task)
}

/// Send a worker to heal a damaged building of its own team
pub fn issue_repair(map: &mut GameMap, unit: EntityId, building: EntityId) -> bool {
    let valid = match (map.entity(unit), map.entity(building)) {
        (Some(u), Some(b)) => {
            u.is_worker() && b.is_building() && b.is_alive() && b.team == u.team && b.hp < b.max_hp
        }
        _ => false,
    };
    if !valid {
        return false;
    }
    match map.entity_mut(unit) {
        Some(entity) => {
            entity.command.clear();
            entity.command.assign(Task::Repair, building);
            true
        }
        None => false,
    }
}

/// Walk to a point without any other intent
pub fn issue_move(map: &mut GameMap, unit: EntityId, destination: Vec2) -> bool {
    match map.entity_mut(unit) {
        Some(entity) if entity.is_unit() => {
            entity.command.clear();
            entity.command.task = Some(Task::Move);
            entity.command.destination = Some(destination);
            true
        }
        _ => false,
    }
}

/// Apply liveness transitions to a unit's task, returns the resulting task
pub fn refresh_task(map: &mut GameMap, unit: EntityId) -> Option<Task> {
    let entity = map.entity(unit)?;
    let command = entity.command.clone();
    let carry = entity.carry.total();
    let team = entity.team;
    let position = entity.position;

    let target_alive = |map: &GameMap, id: Option<EntityId>| {
        id.and_then(|id| map.entity(id)).is_some_and(Entity::is_alive)
    };

    let next = match command.task {
        None => return None,
        Some(Task::Collect) => {
            let depleted = !command
                .target
                .and_then(|id| map.entity(id))
                .is_some_and(Entity::has_stock);
            if carry >= MAXIMUM_CARRY || (depleted && carry > 0) {
                let drop = team.and_then(|team| map.nearest_drop_point(team, position));
                let resume = if depleted { None } else { command.target };
                match drop {
                    Some(drop) => Transition::To(Task::Stock, drop, resume),
                    None => Transition::Idle,
                }
            } else if depleted {
                Transition::Idle
            } else {
                Transition::Keep
            }
        }
        Some(Task::Stock) => {
            if carry == 0 {
                let resume = command
                    .resume
                    .filter(|id| map.entity(*id).is_some_and(Entity::has_stock));
                match resume {
                    Some(resource) => Transition::To(Task::Collect, resource, None),
                    None => Transition::Idle,
                }
            } else if !target_alive(map, command.target) {
                let drop = team.and_then(|team| map.nearest_drop_point(team, position));
                match drop {
                    Some(drop) => Transition::To(Task::Stock, drop, command.resume),
                    None => Transition::Idle,
                }
            } else {
                Transition::Keep
            }
        }
        Some(Task::Build) => {
            let unfinished = command
                .target
                .and_then(|id| map.entity(id))
                .is_some_and(|site| site.is_alive() && !site.is_built());
            if unfinished { Transition::Keep } else { Transition::Idle }
        }
        Some(Task::Repair) => {
            let damaged = command
                .target
                .and_then(|id| map.entity(id))
                .is_some_and(|b| b.is_alive() && b.hp < b.max_hp);
            if damaged { Transition::Keep } else { Transition::Idle }
        }
        Some(Task::Attack) => {
            if target_alive(map, command.target) { Transition::Keep } else { Transition::Idle }
        }
        Some(Task::Move) => {
            if command.destination.is_some() { Transition::Keep } else { Transition::Idle }
        }
    };

    let entity = map.entity_mut(unit)?;
    match next {
        Transition::Keep => {}
        Transition::Idle => entity.command.clear(),
        Transition::To(task, target, resume) => {
            entity.command.assign(task, target);
            entity.command.resume = resume;
        }
    }
    entity.command.task
}

enum Transition {
    Keep,
    Idle,
    To(Task, EntityId, Option<EntityId>),
}
