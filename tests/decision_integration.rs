//! Integration tests for the strategic decision trees

use ahash::AHashSet;

use tile_empires::ai::{Action, Condition, DecisionContext, DecisionNode, DecisionTree, StrategicMode, TreeBuilder};

const ALL_CONDITIONS: [Condition; 7] = [
    Condition::UnderAttack,
    Condition::DamagedBuildings,
    Condition::ResourceShortage,
    Condition::BuildingsNeeded,
    Condition::ArmyBelowThreshold,
    Condition::MilitaryCountLow,
    Condition::ReadyToExpand,
];

/// Context answering from a fixed set of true conditions
struct Fixed {
    holds: AHashSet<Condition>,
    performed: Vec<Action>,
}

impl Fixed {
    fn new(holds: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            holds: holds.into_iter().collect(),
            performed: Vec::new(),
        }
    }
}

impl DecisionContext for Fixed {
    fn check(&mut self, condition: Condition) -> bool {
        self.holds.contains(&condition)
    }

    fn perform(&mut self, action: Action) {
        self.performed.push(action);
    }
}

#[test]
fn test_every_condition_subset_fires_exactly_one_action() {
    for mode in StrategicMode::ALL {
        let tree = DecisionTree::for_mode(mode);
        for mask in 0u32..(1 << ALL_CONDITIONS.len()) {
            let holds = ALL_CONDITIONS
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, condition)| *condition);
            let mut ctx = Fixed::new(holds);
            let fired = tree.evaluate(&mut ctx);

            assert_eq!(ctx.performed.len(), 1, "{mode:?} mask {mask:#b}");
            assert_eq!(fired, ctx.performed.first().copied());
            if mask & 1 != 0 {
                assert_eq!(fired, Some(Action::Defend), "{mode:?} mask {mask:#b}");
            }
        }
    }
}

#[test]
fn test_economic_priorities() {
    let tree = DecisionTree::for_mode(StrategicMode::Economic);

    let mut ctx = Fixed::new([Condition::BuildingsNeeded, Condition::ReadyToExpand]);
    assert_eq!(tree.evaluate(&mut ctx), Some(Action::BuildStructure));

    let mut ctx = Fixed::new([Condition::ReadyToExpand, Condition::MilitaryCountLow]);
    assert_eq!(tree.evaluate(&mut ctx), Some(Action::Expand));

    // Damaged buildings are only watched by the defensive tree
    let mut ctx = Fixed::new([Condition::DamagedBuildings]);
    assert_eq!(tree.evaluate(&mut ctx), Some(Action::BalanceArmy));
    let mut ctx = Fixed::new([Condition::DamagedBuildings]);
    assert_eq!(
        DecisionTree::for_mode(StrategicMode::Defensive).evaluate(&mut ctx),
        Some(Action::RepairBuildings)
    );
}

#[test]
fn test_custom_tree_with_nested_branches() {
    let mut builder = TreeBuilder::default();
    let defend = builder.push(DecisionNode::leaf(Action::Defend));
    let expand = builder.push(DecisionNode::leaf(Action::Expand));
    let idle = builder.push(DecisionNode::default());
    let ready = builder.push(DecisionNode::branch(Condition::ReadyToExpand, expand, idle));
    let root = builder.push(DecisionNode::branch(Condition::UnderAttack, defend, ready));
    let tree = builder.finish(root);
    assert_eq!(tree.len(), 5);

    let mut ctx = Fixed::new(Vec::<Condition>::new());
    assert_eq!(tree.evaluate(&mut ctx), None);
    assert!(ctx.performed.is_empty());

    let mut ctx = Fixed::new([Condition::ReadyToExpand]);
    assert_eq!(tree.evaluate(&mut ctx), Some(Action::Expand));
}
