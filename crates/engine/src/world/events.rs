use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::registry::EntityHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Wood,
    Apple,
    Corn,
    Tomato,
}

impl Item {
    pub const ALL: [Item; 4] = [Item::Wood, Item::Apple, Item::Corn, Item::Tomato];

    pub fn name(self) -> &'static str {
        match self {
            Item::Wood => "wood",
            Item::Apple => "apple",
            Item::Corn => "corn",
            Item::Tomato => "tomato",
        }
    }
}

/// Something the simulation wants the session to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    ItemCollected { item: Item, amount: u32 },
    TreeFelled { tree: EntityHandle },
    ShopToggled,
    SleepRequested,
}

/// FIFO of [`WorldEvent`]s, drained once per tick by whoever owns the session.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<WorldEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.pending.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = WorldEvent> + '_ {
        self.pending.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_emission_order() {
        let mut queue = EventQueue::new();
        queue.push(WorldEvent::ShopToggled);
        queue.push(WorldEvent::ItemCollected {
            item: Item::Wood,
            amount: 1,
        });
        queue.push(WorldEvent::SleepRequested);

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(
            drained,
            vec![
                WorldEvent::ShopToggled,
                WorldEvent::ItemCollected {
                    item: Item::Wood,
                    amount: 1
                },
                WorldEvent::SleepRequested,
            ]
        );
        assert!(queue.is_empty());
    }
}
