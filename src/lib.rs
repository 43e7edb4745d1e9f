//! Tile Empires - simulation core of a tile-based real-time strategy game
//!
//! A sparse spatial hash, an A* planner with an LRU/TTL path cache and
//! decision-tree bots that run the economy, construction and army of
//! computer-controlled teams.

pub mod ai;
pub mod core;
pub mod pathfinding;
pub mod simulation;
pub mod spatial;
pub mod world;
