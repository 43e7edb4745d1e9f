//! Binary condition/action trees for strategic decisions
//!
//! Nodes are plain data stored in an arena and refer to predicates and
//! actions by identifier. The bot resolves those identifiers through a
//! `DecisionContext` passed to `evaluate`, so a tree holds no state and
//! is built once per strategic mode.

use serde::{Deserialize, Serialize};

/// Overall posture of a bot; selects the tree shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategicMode {
    Economic,
    Defensive,
    Offensive,
    #[default]
    Default,
}

impl StrategicMode {
    pub const ALL: [StrategicMode; 4] = [
        StrategicMode::Economic,
        StrategicMode::Defensive,
        StrategicMode::Offensive,
        StrategicMode::Default,
    ];
}

impl std::str::FromStr for StrategicMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economic" => Ok(StrategicMode::Economic),
            "defensive" => Ok(StrategicMode::Defensive),
            "offensive" => Ok(StrategicMode::Offensive),
            "default" => Ok(StrategicMode::Default),
            other => Err(format!("unknown strategic mode '{other}'")),
        }
    }
}

/// Predicates a tree can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    UnderAttack,
    DamagedBuildings,
    ResourceShortage,
    BuildingsNeeded,
    ArmyBelowThreshold,
    MilitaryCountLow,
    ReadyToExpand,
}

/// Terminal actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Defend,
    RepairBuildings,
    ReallocateWorkers,
    BuildStructure,
    BalanceArmy,
    PursueOffense,
    Expand,
}

/// Resolves condition and action identifiers against live state
pub trait DecisionContext {
    fn check(&mut self, condition: Condition) -> bool;
    fn perform(&mut self, action: Action);
}

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionNode {
    pub condition: Option<Condition>,
    pub on_true: Option<NodeId>,
    pub on_false: Option<NodeId>,
    pub action: Option<Action>,
}

impl DecisionNode {
    pub fn leaf(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn branch(condition: Condition, on_true: NodeId, on_false: NodeId) -> Self {
        Self {
            condition: Some(condition),
            on_true: Some(on_true),
            on_false: Some(on_false),
            action: None,
        }
    }
}

/// Immutable decision tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<DecisionNode>,
    root: NodeId,
}

impl DecisionTree {
    /// Walk from the root and perform at most one action
    ///
    /// Returns the action performed, if any.
    pub fn evaluate<C: DecisionContext + ?Sized>(&self, ctx: &mut C) -> Option<Action> {
        let mut current = self.root;
        loop {
            let node = self.nodes.get(current.0)?;
            let next = match node.condition {
                Some(condition) if ctx.check(condition) => node.on_true,
                Some(_) => node.on_false,
                None => None,
            };
            match next {
                Some(child) => current = child,
                None => {
                    let action = node.action?;
                    ctx.perform(action);
                    return Some(action);
                }
            }
        }
    }

    pub fn for_mode(mode: StrategicMode) -> Self {
        match mode {
            StrategicMode::Economic => Self::economic(),
            StrategicMode::Defensive => Self::defensive(),
            StrategicMode::Offensive => Self::offensive(),
            StrategicMode::Default => Self::default_tree(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&DecisionNode> {
        self.nodes.get(id.0)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Guard → action chain ending in a fallback action
    ///
    /// Guards are checked in order; the first that holds fires its action.
    pub fn chain(guards: &[(Condition, Action)], fallback: Action) -> Self {
        let mut builder = TreeBuilder::default();
        let mut tail = builder.push(DecisionNode::leaf(fallback));
        for &(condition, action) in guards.iter().rev() {
            let hit = builder.push(DecisionNode::leaf(action));
            tail = builder.push(DecisionNode::branch(condition, hit, tail));
        }
        builder.finish(tail)
    }

    fn defensive() -> Self {
        Self::chain(
            &[
                (Condition::UnderAttack, Action::Defend),
                (Condition::DamagedBuildings, Action::RepairBuildings),
                (Condition::ResourceShortage, Action::ReallocateWorkers),
                (Condition::BuildingsNeeded, Action::BuildStructure),
            ],
            Action::BalanceArmy,
        )
    }

    fn offensive() -> Self {
        Self::chain(
            &[
                (Condition::UnderAttack, Action::Defend),
                (Condition::ArmyBelowThreshold, Action::BalanceArmy),
            ],
            Action::PursueOffense,
        )
    }

    fn economic() -> Self {
        Self::chain(
            &[
                (Condition::UnderAttack, Action::Defend),
                (Condition::ResourceShortage, Action::ReallocateWorkers),
                (Condition::BuildingsNeeded, Action::BuildStructure),
                (Condition::ReadyToExpand, Action::Expand),
            ],
            Action::BalanceArmy,
        )
    }

    fn default_tree() -> Self {
        Self::chain(
            &[
                (Condition::UnderAttack, Action::Defend),
                (Condition::ResourceShortage, Action::ReallocateWorkers),
                (Condition::BuildingsNeeded, Action::BuildStructure),
                (Condition::MilitaryCountLow, Action::BalanceArmy),
            ],
            Action::PursueOffense,
        )
    }
}

/// Arena builder for trees of arbitrary shape
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<DecisionNode>,
}

impl TreeBuilder {
    pub fn push(&mut self, node: DecisionNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn finish(self, root: NodeId) -> DecisionTree {
        DecisionTree {
            nodes: self.nodes,
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[derive(Default)]
    struct Scripted {
        holds: AHashSet<Condition>,
        checked: Vec<Condition>,
        performed: Vec<Action>,
    }

    impl DecisionContext for Scripted {
        fn check(&mut self, condition: Condition) -> bool {
            self.checked.push(condition);
            self.holds.contains(&condition)
        }

        fn perform(&mut self, action: Action) {
            self.performed.push(action);
        }
    }

    fn run(mode: StrategicMode, holds: &[Condition]) -> Scripted {
        let mut ctx = Scripted {
            holds: holds.iter().copied().collect(),
            ..Scripted::default()
        };
        DecisionTree::for_mode(mode).evaluate(&mut ctx);
        ctx
    }

    #[test]
    fn test_fallbacks_per_mode() {
        assert_eq!(run(StrategicMode::Defensive, &[]).performed, vec![Action::BalanceArmy]);
        assert_eq!(run(StrategicMode::Offensive, &[]).performed, vec![Action::PursueOffense]);
        assert_eq!(run(StrategicMode::Economic, &[]).performed, vec![Action::BalanceArmy]);
        assert_eq!(run(StrategicMode::Default, &[]).performed, vec![Action::PursueOffense]);
    }

    #[test]
    fn test_condition_order_is_preserved() {
        let ctx = run(StrategicMode::Defensive, &[]);
        assert_eq!(
            ctx.checked,
            vec![
                Condition::UnderAttack,
                Condition::DamagedBuildings,
                Condition::ResourceShortage,
                Condition::BuildingsNeeded,
            ]
        );

        let ctx = run(StrategicMode::Economic, &[Condition::ReadyToExpand]);
        assert_eq!(ctx.performed, vec![Action::Expand]);
        assert_eq!(ctx.checked.len(), 4);
    }

    #[test]
    fn test_earlier_guard_wins() {
        let ctx = run(
            StrategicMode::Default,
            &[Condition::BuildingsNeeded, Condition::ResourceShortage, Condition::MilitaryCountLow],
        );
        assert_eq!(ctx.performed, vec![Action::ReallocateWorkers]);

        let ctx = run(StrategicMode::Offensive, &[Condition::ArmyBelowThreshold]);
        assert_eq!(ctx.performed, vec![Action::BalanceArmy]);
    }

    #[test]
    fn test_under_attack_always_defends() {
        let everything = [
            Condition::UnderAttack,
            Condition::DamagedBuildings,
            Condition::ResourceShortage,
            Condition::BuildingsNeeded,
            Condition::ArmyBelowThreshold,
            Condition::MilitaryCountLow,
            Condition::ReadyToExpand,
        ];
        for mode in StrategicMode::ALL {
            let ctx = run(mode, &everything);
            assert_eq!(ctx.performed, vec![Action::Defend], "{mode:?}");
            assert_eq!(ctx.checked, vec![Condition::UnderAttack]);
        }
    }

    #[test]
    fn test_node_without_branch_or_action_does_nothing() {
        let mut builder = TreeBuilder::default();
        let empty = builder.push(DecisionNode::default());
        let fire = builder.push(DecisionNode::leaf(Action::Expand));
        let root = builder.push(DecisionNode::branch(Condition::ReadyToExpand, fire, empty));
        let tree = builder.finish(root);

        let mut ctx = Scripted::default();
        assert_eq!(tree.evaluate(&mut ctx), None);
        assert!(ctx.performed.is_empty());
    }

    #[test]
    fn test_condition_node_falls_back_to_own_action() {
        let mut builder = TreeBuilder::default();
        let root = builder.push(DecisionNode {
            condition: Some(Condition::UnderAttack),
            on_true: None,
            on_false: None,
            action: Some(Action::Defend),
        });
        let tree = builder.finish(root);

        let mut ctx = Scripted::default();
        assert_eq!(tree.evaluate(&mut ctx), Some(Action::Defend));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Offensive".parse::<StrategicMode>(), Ok(StrategicMode::Offensive));
        assert!("reckless".parse::<StrategicMode>().is_err());
    }
}
