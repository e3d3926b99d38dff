use tracing::debug;

use crate::geometry::Rect;
use crate::rendering::{Camera, DrawCommand, DrawList, Viewport};

use super::document::{TileLayer, TileMap};
use super::tileset::{TileResolver, TilesetKind};

const TILE_FALLBACK_COLOR: [u8; 4] = [68, 74, 62, 255];

/// Outcome of compositing one or more layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    pub drawn: usize,
    pub empty: usize,
    pub misses: usize,
}

impl std::ops::AddAssign for CompositeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.drawn += rhs.drawn;
        self.empty += rhs.empty;
        self.misses += rhs.misses;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileSpan {
    x_min: u32,
    x_max: u32,
    y_min: u32,
    y_max: u32,
}

/// Turns tile layers into image draws. Tiles are anchored at the top-left of their grid
/// cell and drawn at their image size, so oversized tiles hang over their right and bottom
/// neighbours.
#[derive(Debug, Clone, Copy)]
pub struct LayerCompositor<'a> {
    resolver: &'a TileResolver,
    tile_width: u32,
    tile_height: u32,
    overhang: (u32, u32),
}

impl<'a> LayerCompositor<'a> {
    pub fn new(resolver: &'a TileResolver, tile_width: u32, tile_height: u32) -> Self {
        let (max_width, max_height) = largest_tile_image(resolver);
        Self {
            resolver,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            overhang: (
                max_width.saturating_sub(tile_width),
                max_height.saturating_sub(tile_height),
            ),
        }
    }

    pub fn for_map(map: &'a TileMap) -> Self {
        Self::new(map.tile_resolver(), map.tile_width, map.tile_height)
    }

    /// Draws each named layer in `order`. Names the map does not have are skipped.
    pub fn draw_named(
        &self,
        map: &TileMap,
        order: &[&str],
        camera: &Camera,
        viewport: Viewport,
        out: &mut DrawList,
    ) -> CompositeStats {
        let mut stats = CompositeStats::default();
        for name in order {
            match map.layer(name) {
                Some(layer) => stats += self.draw_layer(layer, camera, viewport, out),
                None => debug!(layer = %name, "compositor_layer_absent"),
            }
        }
        stats
    }

    pub fn draw_layer(
        &self,
        layer: &TileLayer,
        camera: &Camera,
        viewport: Viewport,
        out: &mut DrawList,
    ) -> CompositeStats {
        let mut stats = CompositeStats::default();
        let Some(span) = self.visible_span(layer, camera, viewport) else {
            return stats;
        };
        let screen = viewport.rect();

        for y in span.y_min..=span.y_max {
            for x in span.x_min..=span.x_max {
                let Some(gid) = layer.tile_at(x, y) else {
                    continue;
                };
                let cell = Rect::new(
                    (x * self.tile_width) as i32,
                    (y * self.tile_height) as i32,
                    self.tile_width as i32,
                    self.tile_height as i32,
                );
                match self.resolver.resolve(gid) {
                    Ok(None) => stats.empty += 1,
                    Ok(Some(tile)) => {
                        let (source, size) = if tile.source_rect.is_empty() {
                            (None, (cell.width, cell.height))
                        } else {
                            (
                                Some(tile.source_rect),
                                (tile.source_rect.width, tile.source_rect.height),
                            )
                        };
                        let dest = Rect::new(cell.x, cell.y, size.0, size.1)
                            .translated_by(camera.offset);
                        if !dest.intersects(&screen) {
                            continue;
                        }
                        out.push(DrawCommand::Image {
                            image: tile.image.clone(),
                            source,
                            dest,
                            fallback: TILE_FALLBACK_COLOR,
                            silhouette: None,
                        });
                        stats.drawn += 1;
                    }
                    Err(_) => stats.misses += 1,
                }
            }
        }
        stats
    }

    fn visible_span(&self, layer: &TileLayer, camera: &Camera, viewport: Viewport) -> Option<TileSpan> {
        if layer.width() == 0 || layer.height() == 0 || viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let tile_w = self.tile_width as f32;
        let tile_h = self.tile_height as f32;
        let left = camera.offset.x - self.overhang.0 as f32;
        let top = camera.offset.y - self.overhang.1 as f32;
        let right = camera.offset.x + viewport.width as f32 - 1.0;
        let bottom = camera.offset.y + viewport.height as f32 - 1.0;

        let x_min = (left / tile_w).floor() as i64;
        let x_max = (right / tile_w).floor() as i64;
        let y_min = (top / tile_h).floor() as i64;
        let y_max = (bottom / tile_h).floor() as i64;

        let x_min = x_min.max(0);
        let y_min = y_min.max(0);
        let x_max = x_max.min(layer.width() as i64 - 1);
        let y_max = y_max.min(layer.height() as i64 - 1);
        if x_min > x_max || y_min > y_max {
            return None;
        }
        Some(TileSpan {
            x_min: x_min as u32,
            x_max: x_max as u32,
            y_min: y_min as u32,
            y_max: y_max as u32,
        })
    }
}

fn largest_tile_image(resolver: &TileResolver) -> (u32, u32) {
    resolver
        .tilesets()
        .iter()
        .fold((0, 0), |(width, height), tileset| match &tileset.kind {
            TilesetKind::Atlas { .. } => (width.max(tileset.tile_width), height.max(tileset.tile_height)),
            TilesetKind::PerTile { images } => images.values().fold((width, height), |(w, h), image| {
                (w.max(image.width), h.max(image.height))
            }),
        })
}
