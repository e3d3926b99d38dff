use engine::world::TreeSize;
use engine::{
    groups, Entity, EntityHandle, EntityKind, EntityRegistry, Rect, Sprite, Vec2, ZLayer,
};
use rand::Rng;

pub(super) const APPLE_KEY: &str = "graphics/fruit/apple.png";
const APPLE_SIZE: (i32, i32) = (16, 16);
/// Each slot grows an apple with probability `APPLE_ODDS.0 / APPLE_ODDS.1`.
const APPLE_ODDS: (u32, u32) = (2, 11);
const PARTICLE_SECONDS: f32 = 0.2;
const PARTICLE_COLOR: [u8; 4] = [255, 255, 255, 255];

pub(super) fn standing_tree_key(size: TreeSize) -> &'static str {
    match size {
        TreeSize::Small => "graphics/objects/tree_small.png",
        TreeSize::Large => "graphics/objects/tree_medium.png",
    }
}

/// Replaces the tree's apples with a fresh roll over its slots. Stumps grow nothing.
pub(super) fn regrow_apples(
    registry: &mut EntityRegistry,
    tree: EntityHandle,
    rng: &mut impl Rng,
) -> usize {
    clear_apples(registry, tree);
    let Some((origin, size)) = registry.get(tree).and_then(|entity| {
        entity
            .as_tree()
            .filter(|state| !state.stump)
            .map(|state| (entity.footprint, state.size))
    }) else {
        return 0;
    };

    let mut apples = Vec::new();
    for (dx, dy) in size.apple_slots() {
        if rng.gen_range(0..APPLE_ODDS.1) >= APPLE_ODDS.0 {
            continue;
        }
        let footprint = Rect::new(origin.x + dx, origin.y + dy, APPLE_SIZE.0, APPLE_SIZE.1);
        let apple = Entity::new(footprint, ZLayer::Fruit, EntityKind::Fruit)
            .with_sprite(Sprite::from_key(APPLE_KEY));
        apples.push(registry.spawn_into(apple, &[groups::RENDER, groups::FRUIT]));
    }

    let grown = apples.len();
    if let Some(state) = registry.get_mut(tree).and_then(Entity::as_tree_mut) {
        state.apples = apples;
    }
    grown
}

pub(super) fn clear_apples(registry: &mut EntityRegistry, tree: EntityHandle) {
    let apples = registry
        .get_mut(tree)
        .and_then(Entity::as_tree_mut)
        .map(|state| std::mem::take(&mut state.apples))
        .unwrap_or_default();
    for apple in apples {
        registry.kill(apple);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Chop {
    pub(super) tree: EntityHandle,
    pub(super) apple_dropped: bool,
}

/// Hits the first standing tree whose footprint contains `target`. A hit costs the tree one
/// health and shakes loose one random apple.
pub(super) fn chop(registry: &mut EntityRegistry, target: Vec2, rng: &mut impl Rng) -> Option<Chop> {
    let tree = registry
        .alive_in_group(groups::TREE)
        .find(|(_, entity)| {
            entity.footprint.contains_point(target)
                && entity.as_tree().is_some_and(|state| !state.stump)
        })
        .map(|(handle, _)| handle)?;

    let state = registry.get_mut(tree).and_then(Entity::as_tree_mut)?;
    state.health -= 1;
    let apple = if state.apples.is_empty() {
        None
    } else {
        let index = rng.gen_range(0..state.apples.len());
        Some(state.apples.remove(index))
    };

    let mut apple_dropped = false;
    if let Some(apple) = apple {
        if let Some(fruit) = registry.get(apple) {
            let (footprint, sprite) = (fruit.footprint, fruit.sprite.clone());
            spawn_particle(registry, footprint, sprite, ZLayer::Fruit);
        }
        apple_dropped = registry.kill(apple);
    }
    Some(Chop {
        tree,
        apple_dropped,
    })
}

/// A short-lived white silhouette of whatever just disappeared.
pub(super) fn spawn_particle(
    registry: &mut EntityRegistry,
    footprint: Rect,
    sprite: Option<Sprite>,
    z: ZLayer,
) -> EntityHandle {
    let sprite = sprite.map(|sprite| Sprite {
        silhouette: Some(PARTICLE_COLOR),
        ..sprite
    });
    let particle = Entity::new(
        footprint,
        z,
        EntityKind::Particle {
            remaining: PARTICLE_SECONDS,
        },
    )
    .with_sprite(sprite);
    registry.spawn_into(particle, &[groups::RENDER])
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::world::TreeState;
    use engine::EventQueue;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Dry;

    impl engine::world::WorldQuery for Dry {
        fn is_cell_watered(&self, _cell: engine::GridPos) -> bool {
            false
        }
    }

    fn spawn_tree(registry: &mut EntityRegistry, footprint: Rect) -> EntityHandle {
        let tree = Entity::new(
            footprint,
            ZLayer::Main,
            EntityKind::Tree(TreeState::new(TreeSize::Small)),
        );
        registry.spawn_into(tree, &[groups::RENDER, groups::COLLIDABLE, groups::TREE])
    }

    fn give_apples(registry: &mut EntityRegistry, tree: EntityHandle, count: usize) {
        let mut rng = StdRng::seed_from_u64(1);
        while registry
            .get(tree)
            .and_then(Entity::as_tree)
            .map_or(0, |state| state.apples.len())
            < count
        {
            regrow_apples(registry, tree, &mut rng);
        }
    }

    #[test]
    fn regrowing_replaces_old_apples() {
        let mut registry = EntityRegistry::new();
        let tree = spawn_tree(&mut registry, Rect::new(0, 0, 64, 96));
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let grown = regrow_apples(&mut registry, tree, &mut rng);
            assert!(grown <= TreeSize::Small.apple_slots().len());
            registry.sweep();
            assert_eq!(registry.group_len(groups::FRUIT), grown);
        }
    }

    #[test]
    fn apples_sit_on_their_slots() {
        let mut registry = EntityRegistry::new();
        let tree = spawn_tree(&mut registry, Rect::new(100, 200, 64, 96));
        give_apples(&mut registry, tree, 1);
        let slots = TreeSize::Small.apple_slots();
        for (_, apple) in registry.alive_in_group(groups::FRUIT) {
            let offset = (apple.footprint.x - 100, apple.footprint.y - 200);
            assert!(slots.contains(&offset));
            assert_eq!(apple.z, ZLayer::Fruit);
        }
    }

    #[test]
    fn chop_misses_when_no_tree_is_under_the_target() {
        let mut registry = EntityRegistry::new();
        spawn_tree(&mut registry, Rect::new(0, 0, 64, 96));
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(chop(&mut registry, Vec2::new(500.0, 500.0), &mut rng), None);
    }

    #[test]
    fn chop_drops_one_apple_and_leaves_a_particle() {
        let mut registry = EntityRegistry::new();
        let tree = spawn_tree(&mut registry, Rect::new(0, 0, 64, 96));
        give_apples(&mut registry, tree, 1);
        let before = registry.alive_in_group(groups::FRUIT).count();
        let mut rng = StdRng::seed_from_u64(5);

        let outcome = chop(&mut registry, Vec2::new(32.0, 48.0), &mut rng).expect("hit");
        assert!(outcome.apple_dropped);
        assert_eq!(registry.alive_in_group(groups::FRUIT).count(), before - 1);
        let state = registry.get(tree).and_then(Entity::as_tree).expect("tree");
        assert_eq!(state.health, 4);
        assert_eq!(state.apples.len(), before - 1);

        let particles = registry
            .alive_in_group(groups::RENDER)
            .filter(|(_, entity)| matches!(entity.kind, EntityKind::Particle { .. }))
            .count();
        assert_eq!(particles, 1);
    }

    #[test]
    fn stumps_are_not_chopped_again() {
        let mut registry = EntityRegistry::new();
        let tree = spawn_tree(&mut registry, Rect::new(0, 0, 64, 96));
        let mut rng = StdRng::seed_from_u64(9);
        let mut events = EventQueue::new();
        for _ in 0..5 {
            chop(&mut registry, Vec2::new(32.0, 80.0), &mut rng).expect("hit");
        }
        registry.update(0.016, &Dry, &mut events);
        assert!(registry.get(tree).and_then(Entity::as_tree).expect("tree").stump);

        let stump = registry.get(tree).expect("stump").footprint.center();
        assert_eq!(chop(&mut registry, stump, &mut rng), None);
        assert_eq!(regrow_apples(&mut registry, tree, &mut rng), 0);
    }
}
