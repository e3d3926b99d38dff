use engine::map::MapObject;
use engine::world::{InteractionKind, TreeSize, TreeState};
use engine::{
    groups, Entity, EntityKind, EntityRegistry, FarmGrid, GridPos, Rect, Sprite, TileMap, Vec2,
    ZLayer,
};
use rand::Rng;
use tracing::{info, warn};

use super::trees;
use crate::app::player::Player;
use crate::app::settings::FarmSettings;

const TREES_GROUP: &str = "Trees";
const DECORATION_GROUP: &str = "Decoration";
const INTERACTION_GROUP: &str = "Interaction";
const PLAYER_GROUP: &str = "Player";
const SPAWN_OBJECT: &str = "Start";

/// Grid used when the map has no farmable layer.
const FALLBACK_GRID: (u32, u32) = (50, 40);
const FALLBACK_FARM_MIN: GridPos = GridPos::new(15, 15);
const FALLBACK_FARM_MAX: GridPos = GridPos::new(35, 25);
const DEFAULT_TILE_SIZE: u32 = 64;

/// Tried in order when the spawn point starts inside something solid.
const SPAWN_NUDGES: [(f32, f32); 8] = [
    (100.0, 0.0),
    (-100.0, 0.0),
    (0.0, 100.0),
    (0.0, -100.0),
    (150.0, 0.0),
    (-150.0, 0.0),
    (100.0, 100.0),
    (-100.0, -100.0),
];

/// Everything that depends on the loaded map.
#[derive(Debug)]
pub(super) struct World {
    pub(super) map: TileMap,
    pub(super) registry: EntityRegistry,
    pub(super) farm: FarmGrid,
    pub(super) player: Player,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct SetupCounts {
    pub(super) blocks: usize,
    pub(super) fences: usize,
    pub(super) trees: usize,
    pub(super) decorations: usize,
    pub(super) interactions: usize,
}

pub(super) fn build_world(map: TileMap, settings: &FarmSettings, rng: &mut impl Rng) -> World {
    let mut registry = EntityRegistry::new();
    let counts = SetupCounts {
        blocks: spawn_blocks(&map, &settings.collision_layer, &mut registry),
        fences: spawn_blocks(&map, &settings.fence_layer, &mut registry),
        trees: spawn_trees(&map, &mut registry, rng),
        decorations: spawn_decorations(&map, &mut registry),
        interactions: spawn_interactions(&map, &mut registry),
    };
    let farm = build_farm(&map, settings);

    let spawn = nudge_spawn(&registry, spawn_point(&map));
    let handle = registry.spawn_into(Player::entity(spawn), &[groups::RENDER]);
    let player = Player::new(handle, settings);

    info!(
        blocks = counts.blocks,
        fences = counts.fences,
        trees = counts.trees,
        decorations = counts.decorations,
        interactions = counts.interactions,
        spawn_x = spawn.x,
        spawn_y = spawn.y,
        "world_built"
    );
    World {
        map,
        registry,
        farm,
        player,
    }
}

fn tile_size(map: &TileMap) -> (u32, u32) {
    if map.tile_width == 0 || map.tile_height == 0 {
        (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
    } else {
        (map.tile_width, map.tile_height)
    }
}

/// One invisible solid block per non-empty tile of the named layer.
fn spawn_blocks(map: &TileMap, layer_name: &str, registry: &mut EntityRegistry) -> usize {
    let Some(layer) = map.layer(layer_name) else {
        return 0;
    };
    let (tile_w, tile_h) = tile_size(map);
    let mut spawned = 0;
    for (x, y, _) in layer.nonzero_tiles() {
        let cell = Rect::new(
            (x * tile_w) as i32,
            (y * tile_h) as i32,
            tile_w as i32,
            tile_h as i32,
        );
        registry.spawn_into(
            Entity::new(cell, ZLayer::Main, EntityKind::Static),
            &[groups::COLLIDABLE],
        );
        spawned += 1;
    }
    spawned
}

fn objects<'a>(map: &'a TileMap, group: &str) -> &'a [MapObject] {
    map.object_group(group)
        .map_or(&[], |group| group.objects.as_slice())
}

/// The tile image a gid object carries, if its tileset is known.
fn object_sprite(map: &TileMap, object: &MapObject) -> Option<Sprite> {
    let gid = object.gid?;
    let tile = map.tile_resolver().resolve(gid).ok().flatten()?;
    Some(Sprite {
        image: tile.image.clone(),
        source: (!tile.source_rect.is_empty()).then_some(tile.source_rect),
        silhouette: None,
    })
}

fn spawn_trees(map: &TileMap, registry: &mut EntityRegistry, rng: &mut impl Rng) -> usize {
    let mut spawned = 0;
    for object in objects(map, TREES_GROUP) {
        let footprint = object.rect();
        if footprint.is_empty() {
            warn!(id = object.id, "tree_object_has_no_size");
            continue;
        }
        let size = TreeSize::from_name(&object.name);
        let sprite =
            object_sprite(map, object).or_else(|| Sprite::from_key(trees::standing_tree_key(size)));
        let tree = Entity::new(footprint, ZLayer::Main, EntityKind::Tree(TreeState::new(size)))
            .with_hitbox(footprint.bottom_centered(0.6, 0.3))
            .with_sprite(sprite);
        let handle = registry.spawn_into(tree, &[groups::RENDER, groups::COLLIDABLE, groups::TREE]);
        trees::regrow_apples(registry, handle, rng);
        spawned += 1;
    }
    spawned
}

/// Solid props. Only tile objects have something to draw.
fn spawn_decorations(map: &TileMap, registry: &mut EntityRegistry) -> usize {
    let mut spawned = 0;
    for object in objects(map, DECORATION_GROUP) {
        let footprint = object.rect();
        if footprint.is_empty() {
            continue;
        }
        let sprite = object_sprite(map, object);
        let membership: &[&str] = if sprite.is_some() {
            &[groups::RENDER, groups::COLLIDABLE]
        } else {
            &[groups::COLLIDABLE]
        };
        registry.spawn_into(
            Entity::new(footprint, ZLayer::Main, EntityKind::Static).with_sprite(sprite),
            membership,
        );
        spawned += 1;
    }
    spawned
}

fn spawn_interactions(map: &TileMap, registry: &mut EntityRegistry) -> usize {
    let mut spawned = 0;
    for object in objects(map, INTERACTION_GROUP) {
        let Some(kind) = InteractionKind::from_name(&object.name) else {
            warn!(id = object.id, name = %object.name, "interaction_object_unknown");
            continue;
        };
        registry.spawn_into(
            Entity::new(object.rect(), ZLayer::Main, EntityKind::Interaction(kind)),
            &[groups::INTERACTABLE],
        );
        spawned += 1;
    }
    spawned
}

fn spawn_point(map: &TileMap) -> Vec2 {
    objects(map, PLAYER_GROUP)
        .iter()
        .find(|object| object.name == SPAWN_OBJECT)
        .map(|object| Vec2::new(object.x, object.y))
        .unwrap_or_else(|| {
            let (width, height) = map.pixel_size();
            Vec2::new(width as f32 * 0.5, height as f32 * 0.5)
        })
}

/// Moves the spawn off any obstacle its hitbox would start inside. Keeps the original point
/// when every candidate is blocked.
fn nudge_spawn(registry: &EntityRegistry, spawn: Vec2) -> Vec2 {
    let obstacles: Vec<Rect> = registry
        .alive_in_group(groups::COLLIDABLE)
        .map(|(_, entity)| entity.hitbox)
        .collect();
    let blocked = |center: Vec2| {
        let hitbox = Player::entity(center).hitbox;
        obstacles.iter().any(|obstacle| obstacle.intersects(&hitbox))
    };
    if !blocked(spawn) {
        return spawn;
    }
    let nudged = SPAWN_NUDGES
        .iter()
        .map(|(dx, dy)| spawn + Vec2::new(*dx, *dy))
        .find(|candidate| !blocked(*candidate));
    match nudged {
        Some(candidate) => {
            info!(
                from_x = spawn.x,
                from_y = spawn.y,
                to_x = candidate.x,
                to_y = candidate.y,
                "spawn_nudged"
            );
            candidate
        }
        None => {
            warn!(x = spawn.x, y = spawn.y, "spawn_blocked");
            spawn
        }
    }
}

fn build_farm(map: &TileMap, settings: &FarmSettings) -> FarmGrid {
    let (tile_size, _) = tile_size(map);
    match map.layer(&settings.farmable_layer) {
        Some(layer) => FarmGrid::from_farmable_layer(layer, tile_size),
        None => {
            let (width, height) = if map.width == 0 || map.height == 0 {
                FALLBACK_GRID
            } else {
                (map.width, map.height)
            };
            info!(
                layer = %settings.farmable_layer,
                "farmable_layer_absent_using_fallback_region"
            );
            FarmGrid::with_farmable_rect(
                width,
                height,
                tile_size,
                FALLBACK_FARM_MIN,
                FALLBACK_FARM_MAX,
            )
        }
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use engine::map::ObjectGroup;
    use engine::{CellFlags, TileLayer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(in crate::app) fn object(id: u32, name: &str, rect: Rect) -> MapObject {
        MapObject {
            id,
            name: name.to_string(),
            class: String::new(),
            x: rect.x as f32,
            y: rect.y as f32,
            width: rect.width as f32,
            height: rect.height as f32,
            gid: None,
        }
    }

    /// A 20×12 map: a wall column at x = 10, farmland at x 2..6 / y 2..5, one tree, a trader
    /// and a bed, spawn at (320, 320).
    pub(in crate::app) fn test_map() -> TileMap {
        let (width, height) = (20u32, 12u32);
        let mut collision = vec![0; (width * height) as usize];
        for y in 0..height {
            collision[(y * width + 10) as usize] = 1;
        }
        let mut farmable = vec![0; (width * height) as usize];
        for y in 2..5 {
            for x in 2..6 {
                farmable[(y * width + x) as usize] = 1;
            }
        }

        let mut map = TileMap::empty();
        map.width = width;
        map.height = height;
        map.tile_width = 64;
        map.tile_height = 64;
        map.layers = vec![
            TileLayer::new("Collision", width, height, collision).expect("collision"),
            TileLayer::new("Farmable", width, height, farmable).expect("farmable"),
        ];
        map.object_groups = vec![
            ObjectGroup {
                name: TREES_GROUP.to_string(),
                objects: vec![object(1, "Small", Rect::new(448, 448, 64, 96))],
            },
            ObjectGroup {
                name: INTERACTION_GROUP.to_string(),
                objects: vec![
                    object(2, "Trader", Rect::new(256, 64, 128, 64)),
                    object(3, "Bed", Rect::new(448, 128, 64, 64)),
                    object(4, "Mailbox", Rect::new(0, 0, 32, 32)),
                ],
            },
            ObjectGroup {
                name: PLAYER_GROUP.to_string(),
                objects: vec![object(5, SPAWN_OBJECT, Rect::new(320, 320, 0, 0))],
            },
        ];
        map
    }

    fn build(map: TileMap) -> World {
        let mut rng = StdRng::seed_from_u64(11);
        build_world(map, &FarmSettings::default(), &mut rng)
    }

    #[test]
    fn map_objects_become_entities_in_their_groups() {
        let world = build(test_map());
        let registry = &world.registry;

        assert_eq!(registry.alive_in_group(groups::TREE).count(), 1);
        assert_eq!(registry.alive_in_group(groups::INTERACTABLE).count(), 2);
        // 12 wall blocks plus the tree.
        assert_eq!(registry.alive_in_group(groups::COLLIDABLE).count(), 13);

        let (_, tree) = registry.alive_in_group(groups::TREE).next().expect("tree");
        assert_eq!(tree.footprint, Rect::new(448, 448, 64, 96));
        assert!(registry
            .alive_in_group(groups::RENDER)
            .any(|(_, entity)| entity.kind == EntityKind::Player));
    }

    #[test]
    fn player_starts_on_the_spawn_object() {
        let world = build(test_map());
        let player = world.registry.get(world.player.handle).expect("player");
        assert_eq!(player.footprint.center(), Vec2::new(320.0, 320.0));
        assert_eq!(player.hitbox, player.footprint.bottom_centered(0.3, 0.15));
    }

    #[test]
    fn blocked_spawn_is_nudged_clear() {
        let mut map = test_map();
        map.object_groups[2].objects[0] = object(5, SPAWN_OBJECT, Rect::new(672, 320, 0, 0));
        let world = build(map);
        let player = world.registry.get(world.player.handle).expect("player");
        assert_eq!(player.footprint.center(), Vec2::new(772.0, 320.0));
    }

    #[test]
    fn missing_spawn_object_uses_the_map_center() {
        let mut map = test_map();
        map.object_groups.pop();
        assert_eq!(spawn_point(&map), Vec2::new(640.0, 384.0));
    }

    #[test]
    fn farm_comes_from_the_farmable_layer() {
        let world = build(test_map());
        assert_eq!(world.farm.cells_with(CellFlags::FARMABLE).count(), 12);
        assert!(world
            .farm
            .flags(GridPos::new(2, 2))
            .is_some_and(|flags| flags.contains(CellFlags::FARMABLE)));
    }

    #[test]
    fn empty_map_falls_back_to_the_default_farm_region() {
        let world = build(TileMap::empty());
        assert_eq!(world.farm.width(), 50);
        assert_eq!(world.farm.cells_with(CellFlags::FARMABLE).count(), 200);
    }
}
