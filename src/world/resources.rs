//! Team stock and costs for the three resource types

use serde::{Deserialize, Serialize};

/// Resource categories gathered by workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Food,
    Wood,
    Gold,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Food, ResourceKind::Wood, ResourceKind::Gold];
}

/// An amount of food, wood and gold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub food: u32,
    pub wood: u32,
    pub gold: u32,
}

impl Resources {
    pub const fn new(food: u32, wood: u32, gold: u32) -> Self {
        Self { food, wood, gold }
    }

    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Gold => self.gold,
        }
    }

    fn slot_mut(&mut self, kind: ResourceKind) -> &mut u32 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    pub fn add(&mut self, kind: ResourceKind, amount: u32) {
        let slot = self.slot_mut(kind);
        *slot = slot.saturating_add(amount);
    }

    /// Remove up to `amount`, returns amount actually removed
    pub fn take(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let slot = self.slot_mut(kind);
        let removed = amount.min(*slot);
        *slot -= removed;
        removed
    }

    pub fn deposit(&mut self, other: &Resources) {
        for kind in ResourceKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    pub fn total(&self) -> u32 {
        self.food + self.wood + self.gold
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn has_enough(&self, cost: &Resources) -> bool {
        ResourceKind::ALL.iter().all(|&kind| self.get(kind) >= cost.get(kind))
    }

    /// Pay `cost` if affordable, returns true if successful
    pub fn spend(&mut self, cost: &Resources) -> bool {
        if !self.has_enough(cost) {
            return false;
        }
        for kind in ResourceKind::ALL {
            self.take(kind, cost.get(kind));
        }
        true
    }

    /// Shortfall per resource kind against `cost`
    pub fn deficit(&self, cost: &Resources) -> Resources {
        Resources::new(
            cost.food.saturating_sub(self.food),
            cost.wood.saturating_sub(self.wood),
            cost.gold.saturating_sub(self.gold),
        )
    }

    /// Kind with the largest positive value, ties broken in `ALL` order
    pub fn largest(&self) -> Option<ResourceKind> {
        let mut best: Option<(ResourceKind, u32)> = None;
        for kind in ResourceKind::ALL {
            let amount = self.get(kind);
            if amount > 0 && best.map_or(true, |(_, b)| amount > b) {
                best = Some((kind, amount));
            }
        }
        best.map(|(kind, _)| kind)
    }
}
