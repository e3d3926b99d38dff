use std::collections::HashMap;

use super::entity::{Entity, WorldQuery};
use super::events::EventQueue;

/// Well-known group names.
pub mod groups {
    pub const RENDER: &str = "render";
    pub const COLLIDABLE: &str = "collidable";
    pub const TREE: &str = "tree";
    pub const INTERACTABLE: &str = "interactable";
    pub const PLANT: &str = "plant";
    pub const FRUIT: &str = "fruit";
}

/// Generational index into an [`EntityRegistry`]. A handle whose slot has since been
/// reused resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    pub(crate) fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Owns every live entity. Groups hold handles only, never the entities themselves.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    update_order: Vec<EntityHandle>,
    groups: HashMap<String, Vec<EntityHandle>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityHandle {
        let handle = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(entity);
                EntityHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                EntityHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.update_order.push(handle);
        handle
    }

    pub fn spawn_into(&mut self, entity: Entity, groups: &[&str]) -> EntityHandle {
        let handle = self.spawn(entity);
        for group in groups {
            self.add_to_group(group, handle);
        }
        handle
    }

    /// Idempotent; returns false if the handle is stale or already a member.
    pub fn add_to_group(&mut self, group: &str, handle: EntityHandle) -> bool {
        if self.get(handle).is_none() {
            return false;
        }
        let members = self.groups.entry(group.to_string()).or_default();
        if members.contains(&handle) {
            return false;
        }
        members.push(handle);
        true
    }

    pub fn remove_from_group(&mut self, group: &str, handle: EntityHandle) -> bool {
        let Some(members) = self.groups.get_mut(group) else {
            return false;
        };
        let before = members.len();
        members.retain(|member| *member != handle);
        members.len() != before
    }

    pub fn is_member(&self, group: &str, handle: EntityHandle) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&handle))
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some_and(Entity::is_alive)
    }

    /// Marks the entity dead. Storage and group entries are released by the next sweep.
    pub fn kill(&mut self, handle: EntityHandle) -> bool {
        match self.get_mut(handle) {
            Some(entity) if entity.alive => {
                entity.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Alive members of `group` in insertion order.
    pub fn alive_in_group<'a>(
        &'a self,
        group: &str,
    ) -> impl Iterator<Item = (EntityHandle, &'a Entity)> + 'a {
        self.groups
            .get(group)
            .into_iter()
            .flatten()
            .filter_map(move |handle| {
                self.get(*handle)
                    .filter(|entity| entity.alive)
                    .map(|entity| (*handle, entity))
            })
    }

    /// Raw membership count, including dead entries not yet swept.
    pub fn group_len(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, Vec::len)
    }

    pub fn alive_count(&self) -> usize {
        self.update_order
            .iter()
            .filter(|handle| self.is_alive(**handle))
            .count()
    }

    /// Runs every alive entity's per-tick behaviour, then sweeps the dead.
    pub fn update(&mut self, dt: f32, world: &dyn WorldQuery, events: &mut EventQueue) {
        for position in 0..self.update_order.len() {
            let handle = self.update_order[position];
            if let Some(entity) = self.get_mut(handle) {
                if entity.alive {
                    entity.update(handle, dt, world, events);
                }
            }
        }
        self.sweep();
    }

    /// Drops dead entities from every group and frees their slots. Returns how many went.
    pub fn sweep(&mut self) -> usize {
        let dead: Vec<EntityHandle> = self
            .update_order
            .iter()
            .copied()
            .filter(|handle| !self.is_alive(*handle))
            .collect();
        if dead.is_empty() {
            return 0;
        }

        self.update_order.retain(|handle| !dead.contains(handle));
        for members in self.groups.values_mut() {
            members.retain(|handle| !dead.contains(handle));
        }
        for handle in &dead {
            let slot = &mut self.slots[handle.index as usize];
            slot.entity = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(handle.index);
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::world::entity::{EntityKind, ZLayer};
    use crate::farm::GridPos;

    struct DryWorld;

    impl WorldQuery for DryWorld {
        fn is_cell_watered(&self, _cell: GridPos) -> bool {
            false
        }
    }

    fn block(x: i32) -> Entity {
        Entity::new(Rect::new(x, 0, 10, 10), ZLayer::Main, EntityKind::Static)
    }

    #[test]
    fn group_membership_is_idempotent() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(block(0));
        assert!(registry.add_to_group(groups::COLLIDABLE, handle));
        assert!(!registry.add_to_group(groups::COLLIDABLE, handle));
        assert_eq!(registry.group_len(groups::COLLIDABLE), 1);
    }

    #[test]
    fn entity_can_belong_to_several_groups() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn_into(block(0), &[groups::RENDER, groups::COLLIDABLE, groups::TREE]);
        assert!(registry.is_member(groups::RENDER, handle));
        assert!(registry.is_member(groups::COLLIDABLE, handle));
        assert!(registry.is_member(groups::TREE, handle));
        assert!(registry.remove_from_group(groups::TREE, handle));
        assert!(!registry.is_member(groups::TREE, handle));
        assert!(registry.is_alive(handle));
    }

    #[test]
    fn kill_hides_entity_but_removal_waits_for_sweep() {
        let mut registry = EntityRegistry::new();
        let first = registry.spawn_into(block(0), &[groups::RENDER]);
        let second = registry.spawn_into(block(20), &[groups::RENDER]);

        assert!(registry.kill(first));
        assert!(!registry.kill(first));
        let alive: Vec<_> = registry
            .alive_in_group(groups::RENDER)
            .map(|(handle, _)| handle)
            .collect();
        assert_eq!(alive, vec![second]);
        assert_eq!(registry.group_len(groups::RENDER), 2);
        assert!(registry.get(first).is_some());

        let mut events = EventQueue::new();
        registry.update(0.016, &DryWorld, &mut events);
        assert_eq!(registry.group_len(groups::RENDER), 1);
        assert!(registry.get(first).is_none());
    }

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut registry = EntityRegistry::new();
        let old = registry.spawn(block(0));
        registry.kill(old);
        registry.sweep();

        let new = registry.spawn(block(5));
        assert_ne!(old, new);
        assert!(registry.get(old).is_none());
        assert!(!registry.add_to_group(groups::RENDER, old));
        assert_eq!(registry.get(new).map(|entity| entity.footprint.x), Some(5));
    }

    #[test]
    fn update_skips_entities_killed_earlier_in_the_tick() {
        let mut registry = EntityRegistry::new();
        let particle = registry.spawn(Entity::new(
            Rect::new(0, 0, 4, 4),
            ZLayer::Main,
            EntityKind::Particle { remaining: 0.1 },
        ));
        registry.kill(particle);

        let mut events = EventQueue::new();
        registry.update(0.016, &DryWorld, &mut events);
        assert_eq!(registry.alive_count(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn alive_in_group_keeps_insertion_order() {
        let mut registry = EntityRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|i| registry.spawn_into(block(i * 10), &[groups::RENDER]))
            .collect();
        registry.kill(handles[1]);
        registry.sweep();
        let reused = registry.spawn_into(block(99), &[groups::RENDER]);

        let order: Vec<_> = registry
            .alive_in_group(groups::RENDER)
            .map(|(handle, _)| handle)
            .collect();
        assert_eq!(order, vec![handles[0], handles[2], handles[3], reused]);
    }
}
