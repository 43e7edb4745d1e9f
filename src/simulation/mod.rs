//! Match orchestration: the strategic bots and the per-frame world update
//! over a shared map and path planner

pub mod match_state;
pub mod step;

pub use match_state::{Match, MatchSummary, TeamSummary};
pub use step::{edge_gap, FrameEvents, Stepper};
