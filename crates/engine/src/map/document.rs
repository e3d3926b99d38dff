use std::fmt;

use roxmltree::Node;
use thiserror::Error;
use tracing::{info, warn};

use crate::assets::AssetResolver;
use crate::geometry::Rect;

use super::error::{MapErrorCode, MapParseError, XmlContext};
use super::tileset::{parse_tileset_node, TileResolver, Tileset, TilesetKind};

/// One named grid of global tile ids, row-major, `0` meaning empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    name: String,
    width: u32,
    height: u32,
    tiles: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileLayerError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

impl TileLayer {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<u32>,
    ) -> Result<Self, TileLayerError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TileLayerError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            tiles,
        })
    }

    pub fn filled(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            tiles: vec![0; width as usize * height as usize],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u32> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn set_tile(&mut self, x: u32, y: u32, gid: u32) -> bool {
        match self.index_of(x, y) {
            Some(index) => {
                self.tiles[index] = gid;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.tiles.fill(0);
    }

    /// `(x, y, gid)` for every non-empty cell in row-major order.
    pub fn nonzero_tiles(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width.max(1);
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, gid)| **gid != 0)
            .map(move |(index, gid)| (index as u32 % width, index as u32 / width, *gid))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub class: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub gid: Option<u32>,
}

impl MapObject {
    /// Tile objects are anchored at their bottom-left corner, plain rectangles at the top-left.
    pub fn rect(&self) -> Rect {
        let top = if self.gid.is_some() {
            self.y - self.height
        } else {
            self.y
        };
        Rect::new(
            self.x.round() as i32,
            top.round() as i32,
            self.width.round() as i32,
            self.height.round() as i32,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGroup {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, Default)]
pub struct TileMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    pub object_groups: Vec<ObjectGroup>,
    tiles: TileResolver,
}

impl TileMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.object_groups.is_empty()
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_groups.iter().find(|group| group.name == name)
    }

    pub fn tile_resolver(&self) -> &TileResolver {
        &self.tiles
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.saturating_mul(self.tile_width),
            self.height.saturating_mul(self.tile_height),
        )
    }

    /// Serializes to TMX with embedded tilesets and CSV layers. `map_key` is where the output
    /// will live, so image sources can be written relative to it.
    pub fn to_tmx_string(&self, map_key: &str) -> String {
        let mut out = String::new();
        // Writing into a String never fails.
        let _ = self.write_tmx(&mut out, map_key);
        out
    }

    /// Writes the map as TMX with CSV layers and embedded tilesets. Image sources are made
    /// relative to `map_key`.
    pub fn write_tmx<W: fmt::Write>(&self, out: &mut W, map_key: &str) -> fmt::Result {
        let depth = map_key.split('/').count().saturating_sub(1);
        let up = "../".repeat(depth);

        out.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        writeln!(
            out,
            "<map version=\"1.10\" orientation=\"orthogonal\" renderorder=\"right-down\" \
width=\"{}\" height=\"{}\" tilewidth=\"{}\" tileheight=\"{}\" infinite=\"0\">",
            self.width, self.height, self.tile_width, self.tile_height
        )?;

        for tileset in self.tiles.tilesets() {
            write_tileset(out, tileset, &up)?;
        }

        for (index, layer) in self.layers.iter().enumerate() {
            writeln!(
                out,
                " <layer id=\"{}\" name=\"{}\" width=\"{}\" height=\"{}\">",
                index + 1,
                escape(&layer.name),
                layer.width,
                layer.height
            )?;
            out.write_str("  <data encoding=\"csv\">\n")?;
            let rows = layer
                .tiles
                .chunks(layer.width.max(1) as usize)
                .map(|row| {
                    row.iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect::<Vec<_>>();
            out.write_str(&rows.join(",\n"))?;
            out.write_str("\n</data>\n </layer>\n")?;
        }

        for group in &self.object_groups {
            writeln!(out, " <objectgroup name=\"{}\">", escape(&group.name))?;
            for object in &group.objects {
                write!(
                    out,
                    "  <object id=\"{}\" name=\"{}\" type=\"{}\"",
                    object.id,
                    escape(&object.name),
                    escape(&object.class)
                )?;
                if let Some(gid) = object.gid {
                    write!(out, " gid=\"{gid}\"")?;
                }
                writeln!(
                    out,
                    " x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>",
                    object.x, object.y, object.width, object.height
                )?;
            }
            out.write_str(" </objectgroup>\n")?;
        }

        out.write_str("</map>\n")
    }
}

fn write_tileset<W: fmt::Write>(out: &mut W, tileset: &Tileset, up: &str) -> fmt::Result {
    match &tileset.kind {
        TilesetKind::Atlas { image, columns } => {
            writeln!(
                out,
                " <tileset firstgid=\"{}\" name=\"{}\" tilewidth=\"{}\" tileheight=\"{}\"{} columns=\"{}\">",
                tileset.first_gid,
                escape(&tileset.name),
                tileset.tile_width,
                tileset.tile_height,
                tile_count_attr(tileset.tile_count),
                columns
            )?;
            writeln!(
                out,
                "  <image source=\"{}{}\" width=\"{}\" height=\"{}\"/>",
                up,
                escape(image.key.as_str()),
                image.width,
                image.height
            )?;
        }
        TilesetKind::PerTile { images } => {
            writeln!(
                out,
                " <tileset firstgid=\"{}\" name=\"{}\" tilewidth=\"{}\" tileheight=\"{}\"{} columns=\"0\">",
                tileset.first_gid,
                escape(&tileset.name),
                tileset.tile_width,
                tileset.tile_height,
                tile_count_attr(tileset.tile_count)
            )?;
            for (local_id, image) in images {
                writeln!(
                    out,
                    "  <tile id=\"{}\"><image source=\"{}{}\" width=\"{}\" height=\"{}\"/></tile>",
                    local_id,
                    up,
                    escape(image.key.as_str()),
                    image.width,
                    image.height
                )?;
            }
        }
    }
    out.write_str(" </tileset>\n")
}

fn tile_count_attr(tile_count: Option<u32>) -> String {
    tile_count
        .map(|count| format!(" tilecount=\"{count}\""))
        .unwrap_or_default()
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn load_map(assets: &AssetResolver, map_key: &str) -> Result<TileMap, MapParseError> {
    let raw = assets.read_to_string(map_key).map_err(|error| {
        MapParseError::without_location(
            MapErrorCode::ReadFile,
            format!(
                "failed to read {}: {error}",
                assets.resolve(map_key).display()
            ),
            map_key,
        )
    })?;
    let map = parse_map(&raw, map_key, assets)?;
    info!(
        map = map_key,
        width = map.width,
        height = map.height,
        layers = map.layers.len(),
        object_groups = map.object_groups.len(),
        tilesets = map.tiles.tilesets().len(),
        "map_loaded"
    );
    Ok(map)
}

/// Like [`load_map`], but a broken or missing map degrades to an empty world.
pub fn load_map_or_empty(assets: &AssetResolver, map_key: &str) -> TileMap {
    match load_map(assets, map_key) {
        Ok(map) => map,
        Err(error) => {
            warn!(map = map_key, error = %error, "map_load_failed_using_empty_map");
            TileMap::empty()
        }
    }
}

pub fn parse_map(
    raw: &str,
    map_key: &str,
    assets: &AssetResolver,
) -> Result<TileMap, MapParseError> {
    let doc = XmlContext::parse(map_key, raw)?;
    let ctx = XmlContext {
        file: map_key,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(ctx.error_at(
            MapErrorCode::InvalidRoot,
            "root element must be <map>".to_string(),
            root,
        ));
    }

    let mut map = TileMap {
        width: ctx.required(root, "width")?,
        height: ctx.required(root, "height")?,
        tile_width: ctx.required(root, "tilewidth")?,
        tile_height: ctx.required(root, "tileheight")?,
        ..TileMap::default()
    };

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "tileset" => {
                let tileset = parse_tileset_ref(&ctx, child, assets)?;
                map.tiles.register(tileset).map_err(|overlap| {
                    ctx.error_at(MapErrorCode::TilesetOverlap, overlap.to_string(), child)
                })?;
            }
            _ => parse_layer_like(&ctx, child, &mut map)?,
        }
    }

    Ok(map)
}

fn parse_layer_like(
    ctx: &XmlContext<'_, '_>,
    node: Node<'_, '_>,
    map: &mut TileMap,
) -> Result<(), MapParseError> {
    match node.tag_name().name() {
        "layer" => map.layers.push(parse_layer(ctx, node)?),
        "objectgroup" => map.object_groups.push(parse_object_group(ctx, node)?),
        "group" => {
            for child in node.children().filter(|child| child.is_element()) {
                parse_layer_like(ctx, child, map)?;
            }
        }
        // imagelayer, properties, editorsettings and anything newer are not rendered.
        _ => {}
    }
    Ok(())
}

fn parse_tileset_ref(
    ctx: &XmlContext<'_, '_>,
    node: Node<'_, '_>,
    assets: &AssetResolver,
) -> Result<Tileset, MapParseError> {
    let first_gid: u32 = ctx.required(node, "firstgid")?;
    let Some(source) = node.attribute("source") else {
        return parse_tileset_node(ctx, node, first_gid, assets);
    };

    let tsx_key = assets.join_relative(ctx.file, source).map_err(|error| {
        ctx.error_at(
            MapErrorCode::InvalidAssetKey,
            format!("tileset source '{source}' is not a usable asset key: {error}"),
            node,
        )
    })?;
    let raw = assets.read_to_string(&tsx_key).map_err(|error| {
        ctx.error_at(
            MapErrorCode::ReadFile,
            format!("failed to read tileset {tsx_key}: {error}"),
            node,
        )
    })?;
    let tsx_doc = XmlContext::parse(&tsx_key, &raw)?;
    let tsx_ctx = XmlContext {
        file: &tsx_key,
        doc: &tsx_doc,
    };
    let tsx_root = tsx_doc.root_element();
    if tsx_root.tag_name().name() != "tileset" {
        return Err(tsx_ctx.error_at(
            MapErrorCode::InvalidRoot,
            "root element must be <tileset>".to_string(),
            tsx_root,
        ));
    }
    parse_tileset_node(&tsx_ctx, tsx_root, first_gid, assets)
}

fn parse_layer(ctx: &XmlContext<'_, '_>, node: Node<'_, '_>) -> Result<TileLayer, MapParseError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width: u32 = ctx.required(node, "width")?;
    let height: u32 = ctx.required(node, "height")?;

    let Some(data) = node
        .children()
        .find(|child| child.is_element() && child.tag_name().name() == "data")
    else {
        return Ok(TileLayer::filled(name, width, height));
    };

    match data.attribute("encoding") {
        Some("csv") => {}
        other => {
            return Err(ctx.error_at(
                MapErrorCode::UnsupportedEncoding,
                format!(
                    "layer '{}' uses encoding {:?}; only csv is supported",
                    name,
                    other.unwrap_or("xml")
                ),
                data,
            ))
        }
    }

    let text = data.text().unwrap_or_default();
    let mut tiles = Vec::with_capacity(width as usize * height as usize);
    for cell in text
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|cell| !cell.is_empty())
    {
        let gid = cell.parse::<u32>().map_err(|_| {
            ctx.error_at(
                MapErrorCode::InvalidValue,
                format!("layer '{name}' contains non-numeric tile '{cell}'"),
                data,
            )
        })?;
        tiles.push(gid);
    }

    TileLayer::new(name, width, height, tiles)
        .map_err(|error| ctx.error_at(MapErrorCode::TileCountMismatch, error.to_string(), data))
}

fn parse_object_group(
    ctx: &XmlContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ObjectGroup, MapParseError> {
    let mut objects = Vec::new();
    for object in node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "object")
    {
        objects.push(MapObject {
            id: ctx.optional(object, "id")?.unwrap_or_default(),
            name: object.attribute("name").unwrap_or_default().to_string(),
            class: object
                .attribute("type")
                .or_else(|| object.attribute("class"))
                .unwrap_or_default()
                .to_string(),
            x: ctx.optional(object, "x")?.unwrap_or_default(),
            y: ctx.optional(object, "y")?.unwrap_or_default(),
            width: ctx.optional(object, "width")?.unwrap_or_default(),
            height: ctx.optional(object, "height")?.unwrap_or_default(),
            gid: ctx.optional(object, "gid")?,
        });
    }

    Ok(ObjectGroup {
        name: node.attribute("name").unwrap_or_default().to_string(),
        objects,
    })
}
