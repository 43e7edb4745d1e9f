//! Simulation configuration with documented constants
//!
//! All magic numbers of the simulation core are collected here with
//! explanations of their purpose and how they interact with each other.
//! Every section deserializes from TOML with per-field defaults, so a
//! config file only needs to name the values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, Result};
use crate::world::resources::Resources;

/// Spatial index tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Edge length of one spatial hash cell, in tiles
    ///
    /// Smaller = more cells, fewer entities to filter per query.
    /// Larger = fewer cells, more entities per cell.
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self { cell_size: 10.0 }
    }
}

/// Path planner and path cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Maximum number of cached paths before least-recently-used eviction
    pub max_cache_size: usize,

    /// Seconds a cached path stays valid
    ///
    /// Short enough that moving crowds are re-planned around a few times
    /// per second, long enough that a whole squad ordered to the same spot
    /// shares one search.
    pub cache_ttl: f64,

    /// Radius (tiles) of cache invalidation around a tile whose
    /// walkability changed
    pub invalidate_radius: i32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 500,
            cache_ttl: 2.0,
            invalidate_radius: 5,
        }
    }
}

/// Strategic bot tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Strategic decisions per second (strategic tick = 1 / rate)
    pub decisions_per_second: f64,

    // === THREATS ===
    /// Tiles around each owned building scanned for enemy units
    pub threat_radius: i32,
    /// Seconds a threat scan result is reused
    pub threat_cache_ttl: f64,
    /// Maximum attackers reported by a single threat scan
    pub max_reported_attackers: usize,
    /// Idle combat units sent per detected attacker
    pub defenders_per_attacker: usize,
    /// Villagers sent to raise an emergency keep near the front
    pub keep_builders: usize,

    // === ECONOMY ===
    /// Workers moved per reallocation pass
    pub reallocation_batch: usize,
    /// Seconds between two reallocation passes
    pub reallocation_cooldown: f64,
    /// Perimeter scan radius when reallocating towards a resource type
    pub resource_scan_radius: i32,
    /// Perimeter scan cap for idle workers before the full-map fallback
    pub idle_scan_radius: i32,
    /// Workers further than this from the rally point walk back to it
    pub rally_threshold: f32,
    /// Minimum stock per resource before a shortage is declared
    pub resource_thresholds: Resources,

    // === CONSTRUCTION ===
    /// Perimeter scan radius for construction sites
    pub build_site_radius: i32,
    /// Workers per farm when computing the farm target
    pub workers_per_farm: usize,
    /// Free population slots under which more housing is requested
    pub population_margin: u32,
    /// Absolute population cap of a team
    pub population_cap: u32,
    /// Health ratio under which a building needs repairs
    pub critical_health_ratio: f32,
    /// Damaged buildings handled per repair pass
    pub max_repair_sites: usize,
    /// Villagers sent to each damaged building
    pub repairers_per_site: usize,

    // === ARMY ===
    /// Offensive mode trains until the army reaches this size
    pub army_threshold: usize,
    /// Default mode trains while the army is smaller than this
    pub military_low: usize,
    /// Army size required before expanding
    pub expansion_army: usize,
    /// Villager count the bot trains towards
    pub worker_target: usize,
    /// No more military training past this army size
    pub military_cap: usize,
    /// Share of the army committed to an expansion attack
    pub expansion_force_share: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            decisions_per_second: 2.0,

            threat_radius: 5,
            threat_cache_ttl: 1.0,
            max_reported_attackers: 10,
            defenders_per_attacker: 2,
            keep_builders: 3,

            reallocation_batch: 3,
            reallocation_cooldown: 3.0,
            resource_scan_radius: 19,
            idle_scan_radius: 15,
            rally_threshold: 3.0,
            resource_thresholds: Resources::new(150, 100, 150),

            build_site_radius: 15,
            workers_per_farm: 5,
            population_margin: 5,
            population_cap: 200,
            critical_health_ratio: 0.3,
            max_repair_sites: 3,
            repairers_per_site: 2,

            army_threshold: 15,
            military_low: 10,
            expansion_army: 15,
            worker_target: 20,
            military_cap: 30,
            expansion_force_share: 0.7,
        }
    }
}

impl BotConfig {
    /// Seconds between two strategic ticks
    pub fn strategic_interval(&self) -> f64 {
        1.0 / self.decisions_per_second
    }
}

/// Map generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub width: i32,
    pub height: i32,
    pub gold_tiles: usize,
    pub wood_tiles: usize,
    /// Villagers each team starts with
    pub starting_villagers: usize,
    /// Stock each team starts with
    pub starting_resources: Resources,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 120,
            height: 120,
            gold_tiles: 200,
            wood_tiles: 500,
            starting_villagers: 5,
            starting_resources: Resources::new(100, 80, 80),
        }
    }
}

/// Configuration for the simulation core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub spatial: SpatialConfig,
    pub pathfinding: PathfindingConfig,
    pub bot: BotConfig,
    pub map: MapConfig,
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.spatial.cell_size <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "spatial.cell_size ({}) must be positive",
                self.spatial.cell_size
            )));
        }

        if self.pathfinding.max_cache_size == 0 || self.pathfinding.cache_ttl <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "path cache size and TTL must be positive".into(),
            ));
        }

        if self.bot.decisions_per_second <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "bot.decisions_per_second ({}) must be positive",
                self.bot.decisions_per_second
            )));
        }

        if self.bot.military_low > self.bot.army_threshold {
            return Err(CoreError::InvalidConfig(format!(
                "bot.military_low ({}) should be <= bot.army_threshold ({})",
                self.bot.military_low, self.bot.army_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.bot.expansion_force_share) {
            return Err(CoreError::InvalidConfig(
                "bot.expansion_force_share must be within 0.0..=1.0".into(),
            ));
        }

        if self.bot.workers_per_farm == 0 {
            return Err(CoreError::InvalidConfig("bot.workers_per_farm must be >= 1".into()));
        }

        if self.map.width <= 0 || self.map.height <= 0 {
            return Err(CoreError::InvalidConfig("map dimensions must be positive".into()));
        }

        Ok(())
    }
}

/// Load a simulation config from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<SimulationConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    SimulationConfig::from_toml_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_strategic_interval() {
        let config = BotConfig::default();
        assert!((config.strategic_interval() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [pathfinding]
            cache_ttl = 5.0

            [bot]
            reallocation_batch = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.pathfinding.cache_ttl, 5.0);
        assert_eq!(config.pathfinding.max_cache_size, 500);
        assert_eq!(config.bot.reallocation_batch, 6);
        assert_eq!(config.bot.threat_radius, 5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SimulationConfig::from_toml_str("[spatial]\ncell_size = 0.0\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));

        let result = SimulationConfig::from_toml_str("[bot]\nmilitary_low = 40\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = SimulationConfig::from_toml_str("[bot\n");
        assert!(matches!(result, Err(CoreError::TomlError(_))));
    }

    #[test]
    fn test_load_sample_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/simulation.toml");
        let config = load_config(path).unwrap();
        assert_eq!(config.spatial.cell_size, 10.0);
    }
}
