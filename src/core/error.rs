use thiserror::Error;

use crate::core::types::{EntityId, TeamId, TilePos};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Why an entity could not be registered on the map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Team {0:?} does not exist")]
    InvalidTeam(TeamId),

    #[error("Footprint at {origin:?} (size {size}) leaves the map")]
    OutOfBounds { origin: TilePos, size: u32 },

    #[error("Tile {0:?} is blocked")]
    Blocked(TilePos),

    #[error("Entity not found: {0:?}")]
    EntityNotFound(EntityId),

    #[error("Team {0:?} cannot afford this")]
    InsufficientResources(TeamId),
}
