//! Closed set of entity variants and their capability flags
//!
//! Everything on the map is a unit, a building or a resource node. The
//! spatial index, the path planner and the bot branch on the capability
//! queries below rather than on concrete kinds wherever they can.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, TeamId, TilePos, Vec2};
use crate::world::command::UnitCommand;
use crate::world::resources::{ResourceKind, Resources};

/// Mobile unit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Villager,
    Swordsman,
    Archer,
    Horseman,
}

impl UnitKind {
    pub const MILITARY: [UnitKind; 3] = [UnitKind::Archer, UnitKind::Swordsman, UnitKind::Horseman];

    pub fn cost(self) -> Resources {
        match self {
            UnitKind::Villager => Resources::new(50, 25, 0),
            UnitKind::Swordsman => Resources::new(50, 0, 20),
            UnitKind::Archer => Resources::new(0, 25, 45),
            UnitKind::Horseman => Resources::new(80, 0, 20),
        }
    }

    pub fn max_hp(self) -> f32 {
        match self {
            UnitKind::Villager => 40.0,
            UnitKind::Swordsman => 60.0,
            UnitKind::Archer => 30.0,
            UnitKind::Horseman => 45.0,
        }
    }

    /// Building type that trains this unit
    pub fn trained_at(self) -> BuildingKind {
        match self {
            UnitKind::Villager => BuildingKind::TownCentre,
            UnitKind::Swordsman => BuildingKind::Barracks,
            UnitKind::Archer => BuildingKind::ArcheryRange,
            UnitKind::Horseman => BuildingKind::Stable,
        }
    }

    pub fn is_worker(self) -> bool {
        self == UnitKind::Villager
    }

    /// Tiles per second
    pub fn speed(self) -> f32 {
        match self {
            UnitKind::Villager | UnitKind::Archer => 1.0,
            UnitKind::Swordsman => 0.9,
            UnitKind::Horseman => 1.5,
        }
    }

    /// Damage dealt per second while engaged
    pub fn attack_damage(self) -> f32 {
        match self {
            UnitKind::Villager => 2.0,
            UnitKind::Swordsman => 4.0,
            UnitKind::Archer => 3.0,
            UnitKind::Horseman => 4.0,
        }
    }

    /// Engagement distance beyond the target's footprint edge
    pub fn attack_range(self) -> f32 {
        match self {
            UnitKind::Archer => 4.0,
            _ => 1.0,
        }
    }

    /// Seconds a building needs to produce this unit
    pub fn training_time(self) -> f64 {
        match self {
            UnitKind::Villager => 12.0,
            UnitKind::Swordsman | UnitKind::Horseman => 15.0,
            UnitKind::Archer => 18.0,
        }
    }
}

/// Building types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    TownCentre,
    House,
    Camp,
    Farm,
    Barracks,
    Stable,
    ArcheryRange,
    Keep,
}

impl BuildingKind {
    /// Footprint edge length in tiles
    pub fn size(self) -> u32 {
        match self {
            BuildingKind::TownCentre => 4,
            BuildingKind::House | BuildingKind::Camp | BuildingKind::Farm => 2,
            BuildingKind::Barracks | BuildingKind::Stable | BuildingKind::ArcheryRange => 3,
            BuildingKind::Keep => 1,
        }
    }

    pub fn cost(self) -> Resources {
        match self {
            BuildingKind::TownCentre => Resources::new(0, 350, 0),
            BuildingKind::House => Resources::new(0, 25, 0),
            BuildingKind::Camp => Resources::new(0, 100, 0),
            BuildingKind::Farm => Resources::new(0, 60, 0),
            BuildingKind::Barracks | BuildingKind::Stable | BuildingKind::ArcheryRange => {
                Resources::new(0, 175, 0)
            }
            BuildingKind::Keep => Resources::new(0, 35, 125),
        }
    }

    pub fn max_hp(self) -> f32 {
        match self {
            BuildingKind::TownCentre => 1000.0,
            BuildingKind::House | BuildingKind::Camp => 200.0,
            BuildingKind::Farm => 100.0,
            BuildingKind::Barracks | BuildingKind::Stable | BuildingKind::ArcheryRange => 500.0,
            BuildingKind::Keep => 800.0,
        }
    }

    /// Population capacity this building adds once finished
    pub fn population(self) -> u32 {
        match self {
            BuildingKind::TownCentre | BuildingKind::House => 5,
            _ => 0,
        }
    }

    pub fn is_drop_point(self) -> bool {
        matches!(self, BuildingKind::TownCentre | BuildingKind::Camp)
    }

    pub fn is_walkable(self) -> bool {
        self == BuildingKind::Farm
    }

    /// Range within which a defensive building engages, if it has one
    pub fn attack_range(self) -> Option<f32> {
        match self {
            BuildingKind::Keep => Some(8.0),
            _ => None,
        }
    }

    /// Seconds one worker needs to raise the building
    pub fn build_time(self) -> f64 {
        match self {
            BuildingKind::TownCentre => 150.0,
            BuildingKind::House => 25.0,
            BuildingKind::Camp => 25.0,
            BuildingKind::Farm => 10.0,
            BuildingKind::Barracks | BuildingKind::Stable | BuildingKind::ArcheryRange => 50.0,
            BuildingKind::Keep => 80.0,
        }
    }

    /// Resource yielded to workers and its initial stock
    pub fn yield_stock(self) -> Option<(ResourceKind, u32)> {
        match self {
            BuildingKind::Farm => Some((ResourceKind::Food, 300)),
            _ => None,
        }
    }
}

/// Neutral resource nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceNodeKind {
    Tree,
    GoldMine,
}

impl ResourceNodeKind {
    pub fn resource(self) -> ResourceKind {
        match self {
            ResourceNodeKind::Tree => ResourceKind::Wood,
            ResourceNodeKind::GoldMine => ResourceKind::Gold,
        }
    }

    pub fn initial_stock(self) -> u32 {
        match self {
            ResourceNodeKind::Tree => 100,
            ResourceNodeKind::GoldMine => 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Unit(UnitKind),
    Building(BuildingKind),
    Resource(ResourceNodeKind),
}

/// Anything registered on the map
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Centre of the footprint, in float tile coordinates
    pub position: Vec2,
    pub team: Option<TeamId>,
    pub hp: f32,
    pub max_hp: f32,
    /// False while a building is a construction site
    pub built: bool,
    /// Remaining resources on a provider
    pub stock: Resources,
    /// Resources carried by a worker
    pub carry: Resources,
    pub command: UnitCommand,
    pub training_queue: VecDeque<UnitKind>,
}

impl Entity {
    fn with_kind(kind: EntityKind, team: Option<TeamId>, max_hp: f32) -> Self {
        Self {
            id: EntityId(0),
            kind,
            position: Vec2::default(),
            team,
            hp: max_hp,
            max_hp,
            built: true,
            stock: Resources::default(),
            carry: Resources::default(),
            command: UnitCommand::default(),
            training_queue: VecDeque::new(),
        }
    }

    pub fn unit(kind: UnitKind, team: TeamId) -> Self {
        Self::with_kind(EntityKind::Unit(kind), Some(team), kind.max_hp())
    }

    /// A finished building
    pub fn building(kind: BuildingKind, team: TeamId) -> Self {
        let mut entity = Self::with_kind(EntityKind::Building(kind), Some(team), kind.max_hp());
        if let Some((resource, amount)) = kind.yield_stock() {
            entity.stock.add(resource, amount);
        }
        entity
    }

    /// A building that still has to be raised by workers
    pub fn construction_site(kind: BuildingKind, team: TeamId) -> Self {
        let mut entity = Self::building(kind, team);
        entity.built = false;
        entity.hp = 1.0;
        entity
    }

    pub fn resource(kind: ResourceNodeKind) -> Self {
        let mut entity = Self::with_kind(EntityKind::Resource(kind), None, kind.initial_stock() as f32);
        entity.stock.add(kind.resource(), kind.initial_stock());
        entity
    }

    pub fn size(&self) -> u32 {
        match self.kind {
            EntityKind::Building(kind) => kind.size(),
            EntityKind::Unit(_) | EntityKind::Resource(_) => 1,
        }
    }

    pub fn tile(&self) -> TilePos {
        self.position.tile()
    }

    pub fn unit_kind(&self) -> Option<UnitKind> {
        match self.kind {
            EntityKind::Unit(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn building_kind(&self) -> Option<BuildingKind> {
        match self.kind {
            EntityKind::Building(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, EntityKind::Unit(_))
    }

    pub fn is_building(&self) -> bool {
        matches!(self.kind, EntityKind::Building(_))
    }

    pub fn is_worker(&self) -> bool {
        self.unit_kind().is_some_and(UnitKind::is_worker)
    }

    pub fn is_combat_unit(&self) -> bool {
        self.unit_kind().is_some_and(|kind| !kind.is_worker())
    }

    /// Units never block movement; of the buildings only farms do not
    pub fn is_walkable(&self) -> bool {
        match self.kind {
            EntityKind::Unit(_) => true,
            EntityKind::Building(kind) => kind.is_walkable(),
            EntityKind::Resource(_) => false,
        }
    }

    pub fn provides_resources(&self) -> bool {
        match self.kind {
            EntityKind::Resource(_) => true,
            EntityKind::Building(kind) => kind.yield_stock().is_some(),
            EntityKind::Unit(_) => false,
        }
    }

    /// Resource kind gathered from this entity
    pub fn yields(&self) -> Option<ResourceKind> {
        match self.kind {
            EntityKind::Resource(kind) => Some(kind.resource()),
            EntityKind::Building(kind) => kind.yield_stock().map(|(resource, _)| resource),
            EntityKind::Unit(_) => None,
        }
    }

    pub fn is_drop_point(&self) -> bool {
        self.building_kind().is_some_and(BuildingKind::is_drop_point)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn health_ratio(&self) -> f32 {
        if self.max_hp <= 0.0 {
            return 0.0;
        }
        (self.hp / self.max_hp).max(0.0)
    }

    /// A provider that still has something to gather
    pub fn has_stock(&self) -> bool {
        self.is_alive() && !self.stock.is_empty()
    }
}
