mod collision;
mod cooldown;
mod entity;
mod events;
mod registry;

pub use collision::{move_with_collisions, resolve_axis, Axis};
pub use cooldown::Cooldown;
pub use entity::{
    Entity, EntityKind, InteractionKind, PlantState, Sprite, TreeSize, TreeState, WorldQuery,
    ZLayer, TREE_START_HEALTH,
};
pub use events::{EventQueue, Item, WorldEvent};
pub use registry::{groups, EntityHandle, EntityRegistry};
