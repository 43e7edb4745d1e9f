//! World state: entities, teams, the tile map and its generation

pub mod command;
pub mod entity;
pub mod generation;
pub mod map;
pub mod resources;
pub mod team;

pub use command::{issue_move, issue_repair, issue_target, refresh_task, Task, UnitCommand, MAXIMUM_CARRY};
pub use entity::{BuildingKind, Entity, EntityKind, ResourceNodeKind, UnitKind};
pub use generation::{generate_map, team_zones, Zone};
pub use map::GameMap;
pub use resources::{ResourceKind, Resources};
pub use team::Team;
