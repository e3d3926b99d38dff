use std::collections::BTreeMap;

use roxmltree::Node;
use thiserror::Error;

use crate::assets::{AssetResolver, ImageKey};
use crate::geometry::Rect;

use super::error::{MapErrorCode, MapParseError, XmlContext};

/// Tiled stores horizontal/vertical/diagonal flips in the top three bits of a gid.
pub const FLIP_FLAGS_MASK: u32 = 0xE000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    pub key: ImageKey,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilesetKind {
    /// One shared image; tile `n` is the `n`-th cell of a row-major grid.
    Atlas { image: TileImage, columns: u32 },
    /// Each local id has its own standalone image.
    PerTile { images: BTreeMap<u32, TileImage> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    pub name: String,
    pub first_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: Option<u32>,
    pub kind: TilesetKind,
}

impl Tileset {
    pub fn is_per_tile(&self) -> bool {
        matches!(self.kind, TilesetKind::PerTile { .. })
    }

    /// One past the last gid this tileset is known to own.
    fn known_end(&self) -> Option<u32> {
        let count = match &self.kind {
            // Image-collection ids can be sparse, so tilecount says nothing about the range.
            TilesetKind::PerTile { images } => images.keys().next_back().map(|last| last + 1),
            TilesetKind::Atlas { .. } => self.tile_count,
        }?;
        Some(self.first_gid.saturating_add(count))
    }

    pub fn image_keys(&self) -> Vec<ImageKey> {
        match &self.kind {
            TilesetKind::Atlas { image, .. } => vec![image.key.clone()],
            TilesetKind::PerTile { images } => {
                images.values().map(|image| image.key.clone()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSource<'a> {
    pub tileset: &'a Tileset,
    pub local_id: u32,
    pub image: &'a ImageKey,
    pub source_rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no tileset owns tile id {gid}")]
pub struct TilesetResolutionMiss {
    pub gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tileset '{name}' starting at gid {first_gid} overlaps an already registered range")]
pub struct TilesetOverlap {
    pub name: String,
    pub first_gid: u32,
}

/// Maps global tile ids to the tileset that owns them, ordered by `first_gid`.
#[derive(Debug, Clone, Default)]
pub struct TileResolver {
    tilesets: Vec<Tileset>,
}

impl TileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tilesets(
        tilesets: impl IntoIterator<Item = Tileset>,
    ) -> Result<Self, TilesetOverlap> {
        let mut resolver = Self::new();
        for tileset in tilesets {
            resolver.register(tileset)?;
        }
        Ok(resolver)
    }

    pub fn register(&mut self, tileset: Tileset) -> Result<(), TilesetOverlap> {
        let insert_at = self
            .tilesets
            .partition_point(|existing| existing.first_gid < tileset.first_gid);

        let overlap_prev = insert_at
            .checked_sub(1)
            .and_then(|index| self.tilesets[index].known_end())
            .is_some_and(|end| end > tileset.first_gid);
        let overlap_next = self.tilesets.get(insert_at).is_some_and(|next| {
            next.first_gid == tileset.first_gid
                || tileset.known_end().is_some_and(|end| end > next.first_gid)
        });
        if tileset.first_gid == 0 || overlap_prev || overlap_next {
            return Err(TilesetOverlap {
                name: tileset.name,
                first_gid: tileset.first_gid,
            });
        }

        self.tilesets.insert(insert_at, tileset);
        Ok(())
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }

    /// The tileset with the greatest `first_gid <= gid`.
    pub fn owning_tileset(&self, gid: u32) -> Result<&Tileset, TilesetResolutionMiss> {
        let gid = gid & !FLIP_FLAGS_MASK;
        let owners = self.tilesets.partition_point(|tileset| tileset.first_gid <= gid);
        owners
            .checked_sub(1)
            .map(|index| &self.tilesets[index])
            .ok_or(TilesetResolutionMiss { gid })
    }

    /// `Ok(None)` for the empty tile 0.
    pub fn resolve(&self, gid: u32) -> Result<Option<TileSource<'_>>, TilesetResolutionMiss> {
        let gid = gid & !FLIP_FLAGS_MASK;
        if gid == 0 {
            return Ok(None);
        }
        let tileset = self.owning_tileset(gid)?;
        let local_id = gid - tileset.first_gid;
        let miss = TilesetResolutionMiss { gid };
        if !tileset.is_per_tile() && tileset.tile_count.is_some_and(|count| local_id >= count) {
            return Err(miss);
        }

        match &tileset.kind {
            TilesetKind::Atlas { image, columns } => {
                if *columns == 0 {
                    return Err(miss);
                }
                let pixel = |index: u32, size: u32| {
                    index
                        .checked_mul(size)
                        .and_then(|offset| i32::try_from(offset).ok())
                };
                let (Some(x), Some(y)) = (
                    pixel(local_id % columns, tileset.tile_width),
                    pixel(local_id / columns, tileset.tile_height),
                ) else {
                    return Err(miss);
                };
                Ok(Some(TileSource {
                    tileset,
                    local_id,
                    image: &image.key,
                    source_rect: Rect::new(
                        x,
                        y,
                        tileset.tile_width as i32,
                        tileset.tile_height as i32,
                    ),
                }))
            }
            TilesetKind::PerTile { images } => {
                let image = images.get(&local_id).ok_or(miss)?;
                Ok(Some(TileSource {
                    tileset,
                    local_id,
                    image: &image.key,
                    source_rect: Rect::new(0, 0, image.width as i32, image.height as i32),
                }))
            }
        }
    }

    pub fn image_keys(&self) -> Vec<ImageKey> {
        self.tilesets.iter().flat_map(Tileset::image_keys).collect()
    }
}

/// Parses a `<tileset>` element; image paths are relative to the file being parsed.
pub(crate) fn parse_tileset_node(
    ctx: &XmlContext<'_, '_>,
    node: Node<'_, '_>,
    first_gid: u32,
    assets: &AssetResolver,
) -> Result<Tileset, MapParseError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let tile_width: u32 = ctx.required(node, "tilewidth")?;
    let tile_height: u32 = ctx.required(node, "tileheight")?;
    let tile_count: Option<u32> = ctx.optional(node, "tilecount")?;
    let columns: Option<u32> = ctx.optional(node, "columns")?;

    let shared_image = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "image");

    // Tiled writes columns="0" for image-collection tilesets.
    let kind = match (columns, shared_image) {
        (Some(0), _) | (_, None) => {
            let mut images = BTreeMap::new();
            for tile in node
                .children()
                .filter(|child| child.is_element() && child.tag_name().name() == "tile")
            {
                let local_id: u32 = ctx.required(tile, "id")?;
                let Some(image_node) = tile
                    .children()
                    .find(|child| child.is_element() && child.tag_name().name() == "image")
                else {
                    continue;
                };
                let image = parse_image(ctx, image_node, assets, tile_width, tile_height)?;
                images.insert(local_id, image);
            }
            TilesetKind::PerTile { images }
        }
        (columns, Some(image_node)) => {
            let image = parse_image(ctx, image_node, assets, tile_width, tile_height)?;
            let columns = columns
                .filter(|value| *value > 0)
                .unwrap_or_else(|| image.width / tile_width.max(1));
            TilesetKind::Atlas { image, columns }
        }
    };

    Ok(Tileset {
        name,
        first_gid,
        tile_width,
        tile_height,
        tile_count,
        kind,
    })
}

fn parse_image(
    ctx: &XmlContext<'_, '_>,
    node: Node<'_, '_>,
    assets: &AssetResolver,
    fallback_width: u32,
    fallback_height: u32,
) -> Result<TileImage, MapParseError> {
    let source: String = ctx.required(node, "source")?;
    let key = assets
        .join_relative(ctx.file, &source)
        .and_then(|joined| ImageKey::new(&joined))
        .map_err(|error| {
            ctx.error_at(
                MapErrorCode::InvalidAssetKey,
                format!("image source '{source}' is not a usable asset key: {error}"),
                node,
            )
        })?;
    Ok(TileImage {
        key,
        width: ctx.optional(node, "width")?.unwrap_or(fallback_width),
        height: ctx.optional(node, "height")?.unwrap_or(fallback_height),
    })
}
