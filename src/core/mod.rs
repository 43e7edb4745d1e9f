pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{CoreError, PlacementError, Result};
pub use types::{EntityId, Seconds, TeamId, TilePos, Vec2};
