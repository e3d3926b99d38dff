use crate::assets::ImageKey;
use crate::farm::{CropKind, GridPos};
use crate::geometry::{Rect, Vec2};

use super::events::{EventQueue, Item, WorldEvent};
use super::registry::EntityHandle;

/// Draw bands, lowest first. Within one band entities are ordered by footprint center y.
/// Map tile layers and the farm's soil and water layers are composited beneath all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZLayer {
    RainFloor,
    GroundPlant,
    Main,
    Fruit,
    RainDrops,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub image: ImageKey,
    /// Sub-rectangle of the image; `None` draws the whole image.
    pub source: Option<Rect>,
    /// Draw every opaque pixel in this colour instead of the image colours.
    pub silhouette: Option<[u8; 4]>,
}

impl Sprite {
    pub fn whole(image: ImageKey) -> Self {
        Self {
            image,
            source: None,
            silhouette: None,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ImageKey::new(key).ok().map(Self::whole)
    }
}

/// Facts an entity may ask about the world it lives in while updating.
pub trait WorldQuery {
    fn is_cell_watered(&self, cell: GridPos) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSize {
    Small,
    Large,
}

const SMALL_APPLE_SLOTS: [(i32, i32); 6] = [(18, 17), (30, 37), (12, 50), (30, 45), (20, 30), (30, 10)];
const LARGE_APPLE_SLOTS: [(i32, i32); 6] = [(30, 24), (60, 65), (50, 50), (16, 40), (45, 50), (42, 70)];

impl TreeSize {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("small") {
            TreeSize::Small
        } else {
            TreeSize::Large
        }
    }

    /// Apple anchor points relative to the tree footprint's top-left corner.
    pub fn apple_slots(self) -> &'static [(i32, i32)] {
        match self {
            TreeSize::Small => &SMALL_APPLE_SLOTS,
            TreeSize::Large => &LARGE_APPLE_SLOTS,
        }
    }

    pub fn stump_key(self) -> &'static str {
        match self {
            TreeSize::Small => "graphics/stumps/small.png",
            TreeSize::Large => "graphics/stumps/large.png",
        }
    }

    pub fn stump_size(self) -> (i32, i32) {
        match self {
            TreeSize::Small => (64, 64),
            TreeSize::Large => (96, 80),
        }
    }
}

pub const TREE_START_HEALTH: i32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeState {
    pub size: TreeSize,
    pub health: i32,
    pub stump: bool,
    pub apples: Vec<EntityHandle>,
}

impl TreeState {
    pub fn new(size: TreeSize) -> Self {
        Self {
            size,
            health: TREE_START_HEALTH,
            stump: false,
            apples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantState {
    pub crop: CropKind,
    pub cell: GridPos,
    pub age: f32,
}

impl PlantState {
    pub fn stage(&self) -> u32 {
        (self.age.max(0.0) as u32).min(self.crop.max_stage())
    }

    pub fn is_harvestable(&self) -> bool {
        self.age >= self.crop.max_stage() as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Trader,
    Bed,
}

impl InteractionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Trader" => Some(InteractionKind::Trader),
            "Bed" => Some(InteractionKind::Bed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Static,
    Player,
    Tree(TreeState),
    Fruit,
    Plant(PlantState),
    Particle { remaining: f32 },
    /// Weather sprite that drifts by `velocity` px/s until its time runs out.
    RainDrop { velocity: Vec2, remaining: f32 },
    Interaction(InteractionKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Center of the hitbox, kept in float so sub-pixel movement accumulates.
    pub position: Vec2,
    pub footprint: Rect,
    pub hitbox: Rect,
    pub z: ZLayer,
    pub sprite: Option<Sprite>,
    pub kind: EntityKind,
    pub(crate) alive: bool,
}

impl Entity {
    pub fn new(footprint: Rect, z: ZLayer, kind: EntityKind) -> Self {
        Self {
            position: footprint.center(),
            footprint,
            hitbox: footprint,
            z,
            sprite: None,
            kind,
            alive: true,
        }
    }

    pub fn with_sprite(mut self, sprite: Option<Sprite>) -> Self {
        self.sprite = sprite;
        self
    }

    pub fn with_hitbox(mut self, hitbox: Rect) -> Self {
        self.hitbox = hitbox;
        self.position = hitbox.center();
        self
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Moves the hitbox to `hitbox` and drags the footprint and position along with it.
    pub fn set_hitbox(&mut self, hitbox: Rect) {
        let dx = hitbox.x - self.hitbox.x;
        let dy = hitbox.y - self.hitbox.y;
        self.footprint = self.footprint.translate(dx, dy);
        self.hitbox = hitbox;
    }

    pub fn as_plant(&self) -> Option<&PlantState> {
        match &self.kind {
            EntityKind::Plant(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&TreeState> {
        match &self.kind {
            EntityKind::Tree(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut TreeState> {
        match &mut self.kind {
            EntityKind::Tree(state) => Some(state),
            _ => None,
        }
    }

    /// Ages a plant by `amount` stages, capped at its last stage. Sprouted plants leave the
    /// ground band and gain a bottom hitbox. Returns true when the visible stage changed.
    pub fn advance_growth(&mut self, amount: f32) -> bool {
        let EntityKind::Plant(plant) = &mut self.kind else {
            return false;
        };
        let before = plant.stage();
        plant.age = (plant.age + amount).min(plant.crop.max_stage() as f32);
        let stage = plant.stage();
        let crop = plant.crop;
        if stage > 0 && self.z == ZLayer::GroundPlant {
            self.z = ZLayer::Main;
            self.hitbox = self.footprint.bottom_centered(0.6, 0.4);
        }
        if stage == before {
            return false;
        }
        self.sprite = Sprite::from_key(&crop.stage_key(stage));
        true
    }

    pub(crate) fn update(
        &mut self,
        handle: EntityHandle,
        dt: f32,
        world: &dyn WorldQuery,
        events: &mut EventQueue,
    ) {
        match &mut self.kind {
            EntityKind::Plant(plant) => {
                if !world.is_cell_watered(plant.cell) {
                    return;
                }
                let amount = plant.crop.growth_per_second() * dt;
                self.advance_growth(amount);
            }
            EntityKind::Tree(tree) => {
                if tree.stump || tree.health > 0 {
                    return;
                }
                tree.stump = true;
                let (width, height) = tree.size.stump_size();
                let bottom_center_x = self.footprint.x + self.footprint.width / 2;
                self.footprint = Rect::new(
                    bottom_center_x - width / 2,
                    self.footprint.y + self.footprint.height - height,
                    width,
                    height,
                );
                let hitbox_height = (height as f32 * 0.4) as i32;
                self.hitbox = Rect::new(
                    self.footprint.x + 5,
                    self.footprint.y + height - hitbox_height,
                    width - 10,
                    hitbox_height,
                );
                self.position = self.hitbox.center();
                self.sprite = Sprite::from_key(tree.size.stump_key());
                events.push(WorldEvent::ItemCollected {
                    item: Item::Wood,
                    amount: 1,
                });
                events.push(WorldEvent::TreeFelled { tree: handle });
            }
            EntityKind::Particle { remaining } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.alive = false;
                }
            }
            EntityKind::RainDrop {
                velocity,
                remaining,
            } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.alive = false;
                    return;
                }
                let step = Vec2::new(velocity.x * dt, velocity.y * dt);
                if step.is_zero() {
                    return;
                }
                self.position = self.position + step;
                let moved = self.hitbox.with_center(self.position);
                self.set_hitbox(moved);
            }
            EntityKind::Static
            | EntityKind::Player
            | EntityKind::Fruit
            | EntityKind::Interaction(_) => {}
        }
    }
}
