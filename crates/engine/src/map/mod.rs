mod compositor;
mod document;
mod error;
mod tileset;

pub use compositor::{CompositeStats, LayerCompositor};
pub use document::{
    load_map, load_map_or_empty, parse_map, MapObject, ObjectGroup, TileLayer, TileLayerError,
    TileMap,
};
pub use error::{MapErrorCode, MapParseError, SourceLocation};
pub use tileset::{
    TileImage, TileResolver, TileSource, Tileset, TilesetKind, TilesetOverlap,
    TilesetResolutionMiss, FLIP_FLAGS_MASK,
};
