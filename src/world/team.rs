//! Player factions

use serde::{Deserialize, Serialize};

use crate::core::types::TeamId;
use crate::world::resources::Resources;

/// A player faction; membership is derived from entity ownership on the map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub resources: Resources,
    /// Hard population cap regardless of housing
    pub max_population: u32,
    pub eliminated: bool,
}

/// Population cap of a team unless configured otherwise
pub const DEFAULT_MAX_POPULATION: u32 = 200;

impl Team {
    pub fn new(id: TeamId) -> Self {
        Self {
            id,
            resources: Resources::default(),
            max_population: DEFAULT_MAX_POPULATION,
            eliminated: false,
        }
    }

    pub fn with_resources(id: TeamId, resources: Resources) -> Self {
        Self {
            id,
            resources,
            max_population: DEFAULT_MAX_POPULATION,
            eliminated: false,
        }
    }
}
