//! Strategic AI for computer-controlled teams
//!
//! `decision_tree` holds the data-only trees, `bot` the controller and its
//! per-tick context. The context's predicates and actions are split by
//! concern across `economy`, `construction` and `military`.

pub mod bot;
pub mod construction;
pub mod decision_tree;
pub mod economy;
pub mod military;

pub use bot::{Bot, BotContext, BotState, ThreatReport, TrainOutcome, UnitPriorities};
pub use decision_tree::{Action, Condition, DecisionContext, DecisionNode, DecisionTree, NodeId, StrategicMode, TreeBuilder};
