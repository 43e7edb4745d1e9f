//! Strategic controller for one non-player team
//!
//! A `Bot` owns an immutable decision tree and the mutable state it
//! reasons about. Every strategic tick the bot first puts idle workers
//! back to work, then evaluates its tree against a `BotContext`, which
//! implements the predicates and actions over the live map.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::decision_tree::{Action, Condition, DecisionContext, DecisionTree, StrategicMode};
use crate::core::config::BotConfig;
use crate::core::types::{EntityId, Seconds, TeamId};
use crate::world::entity::{BuildingKind, UnitKind};
use crate::world::map::GameMap;
use crate::world::resources::ResourceKind;

/// Training weights for the military unit types; higher trains first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPriorities {
    pub archer: u8,
    pub swordsman: u8,
    pub horseman: u8,
}

impl UnitPriorities {
    pub fn for_mode(mode: StrategicMode) -> Self {
        match mode {
            StrategicMode::Defensive => Self { archer: 4, swordsman: 2, horseman: 1 },
            StrategicMode::Offensive => Self { archer: 2, swordsman: 3, horseman: 2 },
            StrategicMode::Economic | StrategicMode::Default => Self { archer: 3, swordsman: 2, horseman: 1 },
        }
    }

    pub fn weight(&self, kind: UnitKind) -> u8 {
        match kind {
            UnitKind::Archer => self.archer,
            UnitKind::Swordsman => self.swordsman,
            UnitKind::Horseman => self.horseman,
            UnitKind::Villager => 0,
        }
    }

    /// Military unit kinds, highest weight first (ties keep archer,
    /// swordsman, horseman order)
    pub fn order(&self) -> [UnitKind; 3] {
        let mut kinds = UnitKind::MILITARY;
        kinds.sort_by_key(|kind| std::cmp::Reverse(self.weight(*kind)));
        kinds
    }

    /// Counter the enemy's composition
    pub fn adjust_for(&mut self, enemy_horsemen: usize, enemy_archers: usize, enemy_swordsmen: usize) {
        if enemy_horsemen > 5 {
            self.archer = self.archer.max(4);
        }
        if enemy_archers > 7 {
            self.swordsman = self.swordsman.max(3);
        }
        if enemy_swordsmen > 6 {
            self.horseman = self.horseman.max(2);
        }
    }
}

/// Enemy units found near owned buildings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreatReport {
    pub attackers: Vec<EntityId>,
}

impl ThreatReport {
    pub fn is_under_attack(&self) -> bool {
        !self.attackers.is_empty()
    }
}

/// Result of trying to queue a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    Queued,
    MissingResources(ResourceKind),
    MissingBuilding(BuildingKind),
    PopulationCapped,
}

/// Everything the bot remembers between strategic ticks
#[derive(Debug, Clone)]
pub struct BotState {
    pub team: TeamId,
    pub mode: StrategicMode,
    pub priorities: UnitPriorities,
    /// Last threat scan and when it ran
    pub threat_cache: Option<(Seconds, ThreatReport)>,
    pub last_reallocation: Option<Seconds>,
    /// Buildings a blocked training order asked for
    pub requested_buildings: Vec<BuildingKind>,
    /// Enemy team currently pursued by the offense
    pub offense_target: Option<TeamId>,
    pub last_action: Option<Action>,
    accumulator: Seconds,
}

impl BotState {
    pub fn new(team: TeamId, mode: StrategicMode) -> Self {
        Self {
            team,
            mode,
            priorities: UnitPriorities::for_mode(mode),
            threat_cache: None,
            last_reallocation: None,
            requested_buildings: Vec::new(),
            offense_target: None,
            last_action: None,
            accumulator: 0.0,
        }
    }
}

/// Strategic controller of one team
#[derive(Debug, Clone)]
pub struct Bot {
    tree: DecisionTree,
    state: BotState,
    config: BotConfig,
}

impl Bot {
    pub fn new(team: TeamId, mode: StrategicMode, config: BotConfig) -> Self {
        debug_assert!(
            config.decisions_per_second > 0.0,
            "decisions_per_second must be positive, got {}",
            config.decisions_per_second
        );
        Self {
            tree: DecisionTree::for_mode(mode),
            state: BotState::new(team, mode),
            config,
        }
    }

    pub fn team(&self) -> TeamId {
        self.state.team
    }

    pub fn mode(&self) -> StrategicMode {
        self.state.mode
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BotState {
        &mut self.state
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Scoped access to the predicates and actions on `map`
    pub fn context<'a>(&'a mut self, map: &'a mut GameMap) -> BotContext<'a> {
        BotContext {
            state: &mut self.state,
            map,
            config: &self.config,
        }
    }

    /// A team with nothing left on the map is out of the match
    pub fn is_eliminated(&self, map: &GameMap) -> bool {
        map.team(self.state.team).map_or(true, |team| team.eliminated)
            || map.team_entities(self.state.team).next().is_none()
    }

    /// Called every frame; runs the strategic logic at most once per frame,
    /// once the interval has elapsed
    ///
    /// A long frame does not queue up missed ticks. Returns the action fired
    /// this frame, if a tick ran.
    pub fn update(&mut self, map: &mut GameMap, dt: Seconds) -> Option<Action> {
        if self.is_eliminated(map) {
            if let Some(team) = map.team_mut(self.state.team) {
                team.eliminated = true;
            }
            return None;
        }

        self.state.accumulator += dt;
        if self.state.accumulator < self.config.strategic_interval() {
            return None;
        }
        self.state.accumulator = 0.0;
        self.strategic_tick(map)
    }

    /// One strategic decision, regardless of the accumulator
    pub fn strategic_tick(&mut self, map: &mut GameMap) -> Option<Action> {
        let tree = &self.tree;
        let mut ctx = BotContext {
            state: &mut self.state,
            map,
            config: &self.config,
        };
        ctx.adjust_priorities();
        ctx.assign_idle_workers();
        let action = tree.evaluate(&mut ctx);
        self.state.last_action = action;
        action
    }
}

/// Bot state and the map, borrowed together for one strategic tick
pub struct BotContext<'a> {
    pub state: &'a mut BotState,
    pub map: &'a mut GameMap,
    pub config: &'a BotConfig,
}

impl BotContext<'_> {
    pub fn team(&self) -> TeamId {
        self.state.team
    }

    pub fn now(&self) -> Seconds {
        self.map.elapsed()
    }

    /// Opponents still in the match
    pub fn enemies(&self) -> Vec<TeamId> {
        let own = self.team();
        self.map
            .teams()
            .iter()
            .filter(|team| team.id != own && !team.eliminated)
            .map(|team| team.id)
            .filter(|id| self.map.team_entities(*id).next().is_some())
            .collect()
    }

    pub fn military_count(&self) -> usize {
        self.map.team_military(self.team()).count()
    }

    pub fn villager_count(&self) -> usize {
        self.map.team_villagers(self.team()).count()
    }

    /// Count enemy units per military kind and raise the matching counters
    pub fn adjust_priorities(&mut self) {
        let (mut horsemen, mut archers, mut swordsmen) = (0, 0, 0);
        for enemy in self.enemies() {
            for unit in self.map.team_units(enemy) {
                match unit.unit_kind() {
                    Some(UnitKind::Horseman) => horsemen += 1,
                    Some(UnitKind::Archer) => archers += 1,
                    Some(UnitKind::Swordsman) => swordsmen += 1,
                    _ => {}
                }
            }
        }
        self.state.priorities.adjust_for(horsemen, archers, swordsmen);
    }
}

impl DecisionContext for BotContext<'_> {
    fn check(&mut self, condition: Condition) -> bool {
        match condition {
            Condition::UnderAttack => self.detect_threats().is_under_attack(),
            Condition::DamagedBuildings => !self.critical_buildings().is_empty(),
            Condition::ResourceShortage => self.resource_shortage().is_some(),
            Condition::BuildingsNeeded => !self.building_needs().is_empty(),
            Condition::ArmyBelowThreshold => self.military_count() < self.config.army_threshold,
            Condition::MilitaryCountLow => self.military_count() < self.config.military_low,
            Condition::ReadyToExpand => self.ready_to_expand(),
        }
    }

    fn perform(&mut self, action: Action) {
        debug!(team = ?self.team(), ?action, "Strategic action");
        match action {
            Action::Defend => {
                let report = self.detect_threats();
                self.rally_defense(&report);
            }
            Action::RepairBuildings => {
                self.repair_buildings();
            }
            Action::ReallocateWorkers => {
                if let Some(kind) = self.resource_shortage() {
                    self.reallocate_workers(kind);
                }
            }
            Action::BuildStructure => {
                self.build_structure(1);
            }
            Action::BalanceArmy => {
                self.balance_army();
            }
            Action::PursueOffense => {
                self.pursue_offense();
            }
            Action::Expand => {
                self.expand();
            }
        }
    }
}
