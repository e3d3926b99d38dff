mod autotile;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::assets::ImageKey;
use crate::geometry::{Rect, Vec2};
use crate::map::{TileImage, TileLayer, TileResolver, Tileset, TilesetKind};
use crate::world::{
    groups, Entity, EntityHandle, EntityKind, EntityRegistry, Item, PlantState, Sprite,
    WorldQuery, ZLayer,
};

pub use autotile::{NeighborMask, SoilVariant};

pub const SOIL_FIRST_GID: u32 = 1;
pub const WATER_FIRST_GID: u32 = SOIL_FIRST_GID + SoilVariant::ALL.len() as u32;
const WATER_VARIANTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropKind {
    Corn,
    Tomato,
}

impl CropKind {
    pub const ALL: [CropKind; 2] = [CropKind::Corn, CropKind::Tomato];

    pub fn name(self) -> &'static str {
        match self {
            CropKind::Corn => "corn",
            CropKind::Tomato => "tomato",
        }
    }

    pub fn growth_per_second(self) -> f32 {
        match self {
            CropKind::Corn => 0.6,
            CropKind::Tomato => 0.9,
        }
    }

    /// Vertical nudge so the plant sits inside the soil patch instead of on its edge.
    pub fn y_offset(self) -> i32 {
        match self {
            CropKind::Corn => -16,
            CropKind::Tomato => -8,
        }
    }

    pub fn max_stage(self) -> u32 {
        3
    }

    pub fn stage_key(self, stage: u32) -> String {
        format!("graphics/fruit/{}/{}.png", self.name(), stage)
    }

    pub fn produce(self) -> Item {
        match self {
            CropKind::Corn => Item::Corn,
            CropKind::Tomato => Item::Tomato,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellFlags(u8);

impl CellFlags {
    pub const EMPTY: CellFlags = CellFlags(0);
    pub const FARMABLE: CellFlags = CellFlags(1 << 0);
    pub const TILLED: CellFlags = CellFlags(1 << 1);
    pub const WATERED: CellFlags = CellFlags(1 << 2);
    pub const PLANTED: CellFlags = CellFlags(1 << 3);

    pub fn contains(self, other: CellFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: CellFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: CellFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for CellFlags {
    type Output = CellFlags;

    fn bitor(self, rhs: CellFlags) -> CellFlags {
        CellFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for CellFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (CellFlags::FARMABLE, "Farmable"),
            (CellFlags::TILLED, "Tilled"),
            (CellFlags::WATERED, "Watered"),
            (CellFlags::PLANTED, "Planted"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "CellFlags({})", set.join(" | "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FarmActionError {
    #[error("cell ({x}, {y}) is outside the farm grid")]
    InvalidGridPosition { x: i32, y: i32 },
    #[error("{action} rejected at ({x}, {y}): {reason}")]
    StateTransitionRejected {
        action: &'static str,
        x: i32,
        y: i32,
        reason: &'static str,
    },
}

/// Dense per-cell farming state plus the two tile layers derived from it.
#[derive(Debug, Clone)]
pub struct FarmGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    cells: Vec<CellFlags>,
    plants: Vec<Option<EntityHandle>>,
    raining: bool,
    soil_layer: TileLayer,
    water_layer: TileLayer,
    tiles: TileResolver,
}

impl FarmGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            tile_size: tile_size.max(1),
            cells: vec![CellFlags::EMPTY; count],
            plants: vec![None; count],
            raining: false,
            soil_layer: TileLayer::filled("Soil", width, height),
            water_layer: TileLayer::filled("Soil Water", width, height),
            tiles: farm_tile_resolver(tile_size),
        }
    }

    /// Every non-empty tile of `layer` marks a farmable cell.
    pub fn from_farmable_layer(layer: &TileLayer, tile_size: u32) -> Self {
        let mut grid = Self::new(layer.width(), layer.height(), tile_size);
        for (x, y, _) in layer.nonzero_tiles() {
            grid.mark_farmable(GridPos::new(x as i32, y as i32));
        }
        grid
    }

    /// Marks the half-open cell range `[min, max)` farmable.
    pub fn with_farmable_rect(
        width: u32,
        height: u32,
        tile_size: u32,
        min: GridPos,
        max: GridPos,
    ) -> Self {
        let mut grid = Self::new(width, height, tile_size);
        for y in min.y..max.y {
            for x in min.x..max.x {
                grid.mark_farmable(GridPos::new(x, y));
            }
        }
        grid
    }

    pub fn mark_farmable(&mut self, pos: GridPos) -> bool {
        match self.index_of(pos) {
            Some(index) => {
                self.cells[index].insert(CellFlags::FARMABLE);
                true
            }
            None => false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn is_raining(&self) -> bool {
        self.raining
    }

    pub fn soil_layer(&self) -> &TileLayer {
        &self.soil_layer
    }

    pub fn water_layer(&self) -> &TileLayer {
        &self.water_layer
    }

    pub fn tile_resolver(&self) -> &TileResolver {
        &self.tiles
    }

    pub fn flags(&self, pos: GridPos) -> Option<CellFlags> {
        self.index_of(pos).map(|index| self.cells[index])
    }

    pub fn plant_handle(&self, pos: GridPos) -> Option<EntityHandle> {
        self.index_of(pos).and_then(|index| self.plants[index])
    }

    pub fn cells_with(&self, flag: CellFlags) -> impl Iterator<Item = GridPos> + '_ {
        let width = self.width.max(1) as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, cell)| cell.contains(flag))
            .map(move |(index, _)| GridPos::new((index % width) as i32, (index / width) as i32))
    }

    pub fn world_to_grid(&self, point: Vec2) -> Option<GridPos> {
        if !point.x.is_finite() || !point.y.is_finite() || point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let pos = GridPos::new(
            point.x as i32 / self.tile_size as i32,
            point.y as i32 / self.tile_size as i32,
        );
        self.index_of(pos).map(|_| pos)
    }

    pub fn cell_world_center(&self, pos: GridPos) -> Vec2 {
        let size = self.tile_size as f32;
        Vec2::new(
            pos.x as f32 * size + size * 0.5,
            pos.y as f32 * size + size * 0.5,
        )
    }

    pub fn cell_world_rect(&self, pos: GridPos) -> Rect {
        let size = self.tile_size as i32;
        Rect::new(pos.x * size, pos.y * size, size, size)
    }

    pub fn is_watered_at(&self, point: Vec2) -> bool {
        self.world_to_grid(point)
            .and_then(|pos| self.flags(pos))
            .is_some_and(|flags| flags.contains(CellFlags::WATERED))
    }

    pub fn till(&mut self, pos: GridPos) -> Result<(), FarmActionError> {
        let index = self.checked_index(pos)?;
        let cell = self.cells[index];
        if !cell.contains(CellFlags::FARMABLE) {
            return Err(rejected("till", pos, "cell is not farmable"));
        }
        if cell.contains(CellFlags::TILLED) {
            return Err(rejected("till", pos, "cell is already tilled"));
        }

        self.cells[index].insert(CellFlags::TILLED);
        self.rebuild_soil_layer();
        if self.raining {
            self.water_all();
        }
        Ok(())
    }

    pub fn water(&mut self, pos: GridPos) -> Result<(), FarmActionError> {
        let index = self.checked_index(pos)?;
        let cell = self.cells[index];
        if !cell.contains(CellFlags::TILLED) {
            return Err(rejected("water", pos, "cell is not tilled"));
        }
        if cell.contains(CellFlags::WATERED) {
            return Err(rejected("water", pos, "cell is already watered"));
        }

        self.cells[index].insert(CellFlags::WATERED);
        self.rebuild_water_layer();
        Ok(())
    }

    /// Spawns the growth entity into the `plant` and `render` groups.
    pub fn plant(
        &mut self,
        pos: GridPos,
        crop: CropKind,
        registry: &mut EntityRegistry,
    ) -> Result<EntityHandle, FarmActionError> {
        let index = self.checked_index(pos)?;
        let cell = self.cells[index];
        if !cell.contains(CellFlags::TILLED | CellFlags::WATERED) {
            return Err(rejected("plant", pos, "cell is not tilled and watered"));
        }
        if cell.contains(CellFlags::PLANTED) {
            return Err(rejected("plant", pos, "cell is already planted"));
        }

        let cell_rect = self.cell_world_rect(pos);
        let mut entity = Entity::new(
            cell_rect.translate(0, crop.y_offset()),
            ZLayer::GroundPlant,
            EntityKind::Plant(PlantState {
                crop,
                cell: pos,
                age: 0.0,
            }),
        )
        .with_sprite(Sprite::from_key(&crop.stage_key(0)));
        entity.position = self.cell_world_center(pos);

        let handle = registry.spawn_into(entity, &[groups::RENDER, groups::PLANT]);
        self.cells[index].insert(CellFlags::PLANTED);
        self.plants[index] = Some(handle);
        Ok(handle)
    }

    /// Clears `Planted` and kills the growth entity; it leaves its groups on the next sweep.
    pub fn harvest(
        &mut self,
        pos: GridPos,
        registry: &mut EntityRegistry,
    ) -> Result<(), FarmActionError> {
        let index = self.checked_index(pos)?;
        if !self.cells[index].contains(CellFlags::PLANTED) {
            return Err(rejected("harvest", pos, "cell has no plant"));
        }

        self.cells[index].remove(CellFlags::PLANTED);
        if let Some(handle) = self.plants[index].take() {
            registry.kill(handle);
        }
        Ok(())
    }

    pub fn till_at(&mut self, point: Vec2) -> Result<(), FarmActionError> {
        let pos = self.point_to_grid(point)?;
        self.till(pos)
    }

    pub fn water_at(&mut self, point: Vec2) -> Result<(), FarmActionError> {
        let pos = self.point_to_grid(point)?;
        self.water(pos)
    }

    pub fn plant_at(
        &mut self,
        point: Vec2,
        crop: CropKind,
        registry: &mut EntityRegistry,
    ) -> Result<EntityHandle, FarmActionError> {
        let pos = self.point_to_grid(point)?;
        self.plant(pos, crop, registry)
    }

    pub fn set_raining(&mut self, raining: bool) {
        self.raining = raining;
    }

    pub fn remove_water(&mut self) {
        for cell in &mut self.cells {
            cell.remove(CellFlags::WATERED);
        }
        self.water_layer.clear();
    }

    pub fn water_all(&mut self) {
        for cell in &mut self.cells {
            if cell.contains(CellFlags::TILLED) {
                cell.insert(CellFlags::WATERED);
            }
        }
        self.rebuild_water_layer();
    }

    /// Start-of-day transition: water evaporates, then rain re-waters every tilled cell.
    pub fn daily_reset(&mut self, rainy: bool) {
        self.remove_water();
        self.set_raining(rainy);
        if rainy {
            self.water_all();
        }
    }

    pub fn neighbor_mask(&self, pos: GridPos) -> NeighborMask {
        let tilled = |dx: i32, dy: i32| {
            self.flags(GridPos::new(pos.x + dx, pos.y + dy))
                .is_some_and(|flags| flags.contains(CellFlags::TILLED))
        };
        NeighborMask {
            top: tilled(0, -1),
            right: tilled(1, 0),
            bottom: tilled(0, 1),
            left: tilled(-1, 0),
        }
    }

    fn rebuild_soil_layer(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = GridPos::new(x as i32, y as i32);
                let gid = match self.flags(pos) {
                    Some(flags) if flags.contains(CellFlags::TILLED) => {
                        SOIL_FIRST_GID + SoilVariant::select(self.neighbor_mask(pos)).index()
                    }
                    _ => 0,
                };
                self.soil_layer.set_tile(x, y, gid);
            }
        }
    }

    fn rebuild_water_layer(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let watered = self
                    .flags(GridPos::new(x as i32, y as i32))
                    .is_some_and(|flags| flags.contains(CellFlags::WATERED));
                let gid = if watered {
                    WATER_FIRST_GID + (x + y) % WATER_VARIANTS
                } else {
                    0
                };
                self.water_layer.set_tile(x, y, gid);
            }
        }
    }

    fn index_of(&self, pos: GridPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    fn checked_index(&self, pos: GridPos) -> Result<usize, FarmActionError> {
        self.index_of(pos).ok_or_else(|| {
            debug!(x = pos.x, y = pos.y, "farm_action_out_of_bounds");
            FarmActionError::InvalidGridPosition { x: pos.x, y: pos.y }
        })
    }

    fn point_to_grid(&self, point: Vec2) -> Result<GridPos, FarmActionError> {
        self.world_to_grid(point)
            .ok_or(FarmActionError::InvalidGridPosition {
                x: (point.x / self.tile_size as f32).floor() as i32,
                y: (point.y / self.tile_size as f32).floor() as i32,
            })
    }
}

impl WorldQuery for FarmGrid {
    fn is_cell_watered(&self, cell: GridPos) -> bool {
        self.flags(cell)
            .is_some_and(|flags| flags.contains(CellFlags::WATERED))
    }
}

fn rejected(action: &'static str, pos: GridPos, reason: &'static str) -> FarmActionError {
    debug!(action, x = pos.x, y = pos.y, reason, "farm_action_rejected");
    FarmActionError::StateTransitionRejected {
        action,
        x: pos.x,
        y: pos.y,
        reason,
    }
}

fn farm_tile_resolver(tile_size: u32) -> TileResolver {
    let image = |key: String| {
        ImageKey::new(&key).ok().map(|key| TileImage {
            key,
            width: tile_size,
            height: tile_size,
        })
    };
    let soil: BTreeMap<u32, TileImage> = SoilVariant::ALL
        .iter()
        .filter_map(|variant| {
            image(format!("graphics/soil/{}.png", variant.asset_name()))
                .map(|image| (variant.index(), image))
        })
        .collect();
    let water: BTreeMap<u32, TileImage> = (0..WATER_VARIANTS)
        .filter_map(|index| {
            image(format!("graphics/soil_water/{index}.png")).map(|image| (index, image))
        })
        .collect();

    let tileset = |name: &str, first_gid: u32, images: BTreeMap<u32, TileImage>| Tileset {
        name: name.to_string(),
        first_gid,
        tile_width: tile_size,
        tile_height: tile_size,
        tile_count: Some(images.len() as u32),
        kind: TilesetKind::PerTile { images },
    };

    TileResolver::from_tilesets([
        tileset("soil", SOIL_FIRST_GID, soil),
        tileset("soil_water", WATER_FIRST_GID, water),
    ])
    .unwrap_or_else(|overlap| {
        warn!(error = %overlap, "farm_tilesets_rejected");
        TileResolver::new()
    })
}
