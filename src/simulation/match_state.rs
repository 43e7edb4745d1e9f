//! A running match: the map, its path planner, one bot per team and the
//! per-frame world update

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::ai::bot::Bot;
use crate::ai::decision_tree::{Action, StrategicMode};
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::types::{Seconds, TeamId, Vec2};
use crate::pathfinding::PathPlanner;
use crate::simulation::step::{FrameEvents, Stepper};
use crate::world::command::Task;
use crate::world::generation::generate_map;
use crate::world::map::GameMap;
use crate::world::resources::Resources;

pub struct Match {
    map: GameMap,
    planner: PathPlanner,
    bots: Vec<Bot>,
    stepper: Stepper,
    config: SimulationConfig,
    frames: u64,
}

impl Match {
    /// One bot per team on `map`; modes are assigned round-robin
    pub fn new(map: GameMap, modes: &[StrategicMode], config: SimulationConfig) -> Self {
        let bots = map
            .teams()
            .iter()
            .enumerate()
            .map(|(index, team)| {
                let mode = if modes.is_empty() {
                    StrategicMode::Default
                } else {
                    modes[index % modes.len()]
                };
                Bot::new(team.id, mode, config.bot.clone())
            })
            .collect();

        Self {
            planner: PathPlanner::from_config(&config.pathfinding),
            map,
            bots,
            stepper: Stepper::new(),
            config,
            frames: 0,
        }
    }

    /// Generate a map with one team per mode and start a match on it
    pub fn generate(config: SimulationConfig, modes: &[StrategicMode], seed: u64) -> Self {
        let teams = modes.len().clamp(1, u8::MAX as usize) as u8;
        let map = generate_map(&config, teams, seed);
        info!(
            width = map.width(),
            height = map.height(),
            teams,
            entities = map.entity_count(),
            seed,
            "Match generated"
        );
        Self::new(map, modes, config)
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut GameMap {
        &mut self.map
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn elapsed(&self) -> Seconds {
        self.map.elapsed()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance the match by one frame
    pub fn update(&mut self, dt: Seconds) -> FrameEvents {
        self.map.advance_clock(dt);
        self.frames += 1;

        for bot in &mut self.bots {
            if let Some(action) = bot.update(&mut self.map, dt) {
                trace!(team = ?bot.team(), ?action, "Strategic tick");
            }
        }
        // Sites placed by the bots must not be walked through this frame
        self.sync_path_cache();

        let events = self.stepper.step(&mut self.map, &mut self.planner, dt);
        self.sync_path_cache();
        self.mark_eliminated();
        events
    }

    /// Drop cached paths around every tile whose walkability changed
    fn sync_path_cache(&mut self) {
        let radius = self.config.pathfinding.invalidate_radius;
        let mut dropped = 0;
        for tile in self.map.take_walkability_changes() {
            dropped += self.planner.invalidate_near(tile, radius);
        }
        if dropped > 0 {
            trace!(dropped, "Path cache invalidated");
        }
    }

    fn mark_eliminated(&mut self) {
        let empty: Vec<TeamId> = self
            .map
            .teams()
            .iter()
            .filter(|team| !team.eliminated)
            .map(|team| team.id)
            .filter(|id| self.map.team_entities(*id).next().is_none())
            .collect();
        for id in empty {
            if let Some(team) = self.map.team_mut(id) {
                team.eliminated = true;
                info!(team = ?id, elapsed = self.map.elapsed(), "Team eliminated");
            }
        }
    }

    /// Cached path query against the live map
    pub fn find_path(&mut self, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        self.planner.find_path(start, goal, &self.map)
    }

    /// Teams still in the match
    pub fn survivors(&self) -> Vec<TeamId> {
        self.map
            .teams()
            .iter()
            .filter(|team| !team.eliminated)
            .map(|team| team.id)
            .collect()
    }

    /// The last team standing, once every other team is out
    pub fn winner(&self) -> Option<TeamId> {
        match self.survivors().as_slice() {
            [only] if self.map.teams().len() > 1 => Some(*only),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.winner().is_some() || self.survivors().is_empty()
    }

    /// Run fixed frames until `seconds` have passed or the match is decided
    pub fn run_for(&mut self, seconds: Seconds, frame_dt: Seconds) -> MatchSummary {
        let frame_dt = frame_dt.max(f64::EPSILON);
        let end = self.elapsed() + seconds;
        while self.elapsed() < end && !self.is_finished() {
            self.update(frame_dt);
        }
        self.summary()
    }

    pub fn summary(&self) -> MatchSummary {
        let teams = self
            .bots
            .iter()
            .map(|bot| {
                let team = bot.team();
                let mut tasks: BTreeMap<String, usize> = BTreeMap::new();
                for unit in self.map.team_units(team) {
                    let label = unit.command.task.map_or("idle", task_label);
                    *tasks.entry(label.to_string()).or_insert(0) += 1;
                }
                TeamSummary {
                    team,
                    mode: bot.mode(),
                    eliminated: self.map.team(team).map_or(true, |t| t.eliminated),
                    resources: self.map.team(team).map(|t| t.resources).unwrap_or_default(),
                    villagers: self.map.team_villagers(team).count(),
                    military: self.map.team_military(team).count(),
                    buildings: self.map.team_buildings(team).filter(|b| b.is_built()).count(),
                    construction_sites: self.map.team_buildings(team).filter(|b| !b.is_built()).count(),
                    population_capacity: self.map.population_capacity(team),
                    tasks,
                    last_action: bot.state().last_action,
                }
            })
            .collect();

        MatchSummary {
            elapsed: self.elapsed(),
            frames: self.frames,
            winner: self.winner(),
            entities: self.map.entity_count(),
            cached_paths: self.planner.cache().len(),
            teams,
        }
    }
}

fn task_label(task: Task) -> &'static str {
    match task {
        Task::Collect => "collect",
        Task::Build => "build",
        Task::Repair => "repair",
        Task::Stock => "stock",
        Task::Attack => "attack",
        Task::Move => "move",
    }
}

/// Per-team state at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team: TeamId,
    pub mode: StrategicMode,
    pub eliminated: bool,
    pub resources: Resources,
    pub villagers: usize,
    pub military: usize,
    pub buildings: usize,
    pub construction_sites: usize,
    pub population_capacity: u32,
    /// Units per task, idle included
    pub tasks: BTreeMap<String, usize>,
    pub last_action: Option<Action>,
}

/// Snapshot of a match, printable as text or JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub elapsed: Seconds,
    pub frames: u64,
    pub winner: Option<TeamId>,
    pub entities: usize,
    pub cached_paths: usize,
    pub teams: Vec<TeamSummary>,
}

impl MatchSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "=== MATCH after {:.1}s ({} frames, {} entities, {} cached paths) ===",
            self.elapsed, self.frames, self.entities, self.cached_paths
        )?;
        for team in &self.teams {
            let status = if team.eliminated { " [eliminated]" } else { "" };
            writeln!(f, "Team {} ({:?}){}", team.team.0, team.mode, status)?;
            writeln!(
                f,
                "  food {:>5}  wood {:>5}  gold {:>5}",
                team.resources.food, team.resources.wood, team.resources.gold
            )?;
            writeln!(
                f,
                "  villagers {:>3}  military {:>3}  buildings {:>3} (+{} sites)  capacity {}",
                team.villagers, team.military, team.buildings, team.construction_sites, team.population_capacity
            )?;
            let tasks: Vec<String> = team.tasks.iter().map(|(task, count)| format!("{task}={count}")).collect();
            writeln!(f, "  tasks: {}", tasks.join(", "))?;
            if let Some(action) = team.last_action {
                writeln!(f, "  last action: {action:?}")?;
            }
        }
        match self.winner {
            Some(team) => write!(f, "Winner: team {}", team.0),
            None => write!(f, "No winner yet"),
        }
    }
}
