use std::collections::{HashMap, HashSet};
use std::path::Path;

use image::ImageReader;
use tracing::{debug, warn};

use crate::assets::{AssetResolver, ImageKey};
use crate::geometry::Rect;

use super::{DrawCommand, DrawList};

pub struct LoadedImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl LoadedImage {
    /// `None` when `rgba` is shorter than `width * height * 4` or either side is zero.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() < expected {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }
}

/// Decoded images keyed by asset key. Everything is loaded up front by `preload`;
/// drawing only reads the cache, so frames never touch the disk.
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<ImageKey, Option<LoadedImage>>,
    warned_missing: HashSet<ImageKey>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every key not already attempted. Returns how many loaded successfully.
    pub fn preload<'k>(
        &mut self,
        assets: &AssetResolver,
        keys: impl IntoIterator<Item = &'k ImageKey>,
    ) -> usize {
        let mut loaded = 0;
        for key in keys {
            if self.images.contains_key(key) {
                continue;
            }
            let path = assets.resolve(key.as_str());
            let image = match load_image_rgba(&path) {
                Ok(image) => {
                    loaded += 1;
                    Some(image)
                }
                Err(reason) => {
                    warn_image_load_once(&mut self.warned_missing, key, Some(&path), &reason);
                    None
                }
            };
            self.images.insert(key.clone(), image);
        }
        debug!(loaded, cached = self.images.len(), "image_cache_preloaded");
        loaded
    }

    pub fn insert(&mut self, key: ImageKey, image: LoadedImage) {
        self.images.insert(key, Some(image));
    }

    pub fn get(&self, key: &ImageKey) -> Option<&LoadedImage> {
        self.images.get(key).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.images.values().filter(|image| image.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn note_missing(&mut self, key: &ImageKey) {
        if self.images.contains_key(key) {
            // Preload already warned with the reason.
            return;
        }
        warn_image_load_once(&mut self.warned_missing, key, None, "not_preloaded");
    }
}

fn load_image_rgba(path: &Path) -> Result<LoadedImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    let (width, height) = image.dimensions();
    LoadedImage::from_rgba(width, height, image.into_raw())
        .ok_or_else(|| "empty_image".to_string())
}

fn warn_image_load_once(
    warned: &mut HashSet<ImageKey>,
    key: &ImageKey,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned.insert(key.clone()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        image = %key,
        path = %path_display,
        reason = reason,
        "image_missing_using_fallback"
    );
}

/// Paints `list` into an RGBA `frame` of `width × height` pixels.
pub fn rasterize(frame: &mut [u8], width: u32, height: u32, list: &DrawList, images: &mut ImageCache) {
    if width == 0 || height == 0 || frame.len() < width as usize * height as usize * 4 {
        return;
    }
    for command in list.commands() {
        match command {
            DrawCommand::Clear { color } => {
                for chunk in frame.chunks_exact_mut(4) {
                    chunk.copy_from_slice(color);
                }
            }
            DrawCommand::Image {
                image,
                source,
                dest,
                fallback,
                silhouette,
            } => match images.get(image) {
                Some(loaded) => blit(frame, width, height, loaded, *source, *dest, *silhouette),
                None => {
                    images.note_missing(image);
                    fill_rect(frame, width, height, *dest, *fallback);
                }
            },
            DrawCommand::Overlay { color } => {
                for chunk in frame.chunks_exact_mut(4) {
                    blend_into(chunk, *color);
                }
            }
        }
    }
}

fn clip(dest: Rect, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
    if dest.is_empty() {
        return None;
    }
    let left = dest.left().max(0);
    let top = dest.top().max(0);
    let right = (dest.x + dest.width).min(width as i32);
    let bottom = (dest.y + dest.height).min(height as i32);
    if left >= right || top >= bottom {
        return None;
    }
    Some((left, top, right, bottom))
}

fn fill_rect(frame: &mut [u8], width: u32, height: u32, dest: Rect, color: [u8; 4]) {
    let Some((left, top, right, bottom)) = clip(dest, width, height) else {
        return;
    };
    let frame_width = width as usize;
    for y in top..bottom {
        let row = y as usize * frame_width;
        for x in left..right {
            let offset = (row + x as usize) * 4;
            blend_into(&mut frame[offset..offset + 4], color);
        }
    }
}

fn blit(
    frame: &mut [u8],
    width: u32,
    height: u32,
    image: &LoadedImage,
    source: Option<Rect>,
    dest: Rect,
    silhouette: Option<[u8; 4]>,
) {
    let full = Rect::new(0, 0, image.width as i32, image.height as i32);
    let source = source.unwrap_or(full);
    // Clamp the source to the image so a bad atlas rect degrades instead of panicking.
    let src_left = source.x.clamp(0, full.width - 1);
    let src_top = source.y.clamp(0, full.height - 1);
    let src_width = source.width.min(full.width - src_left);
    let src_height = source.height.min(full.height - src_top);
    if src_width <= 0 || src_height <= 0 {
        return;
    }
    let Some((left, top, right, bottom)) = clip(dest, width, height) else {
        return;
    };

    let frame_width = width as usize;
    for out_y in top..bottom {
        let dy = (out_y - dest.y) as i64;
        let src_y = src_top + (dy * src_height as i64 / dest.height as i64) as i32;
        let row = out_y as usize * frame_width;
        for out_x in left..right {
            let dx = (out_x - dest.x) as i64;
            let src_x = src_left + (dx * src_width as i64 / dest.width as i64) as i32;
            let mut pixel = image.pixel(src_x as u32, src_y as u32);
            if pixel[3] == 0 {
                continue;
            }
            if let Some(color) = silhouette {
                pixel = [color[0], color[1], color[2], pixel[3]];
            }
            let offset = (row + out_x as usize) * 4;
            blend_into(&mut frame[offset..offset + 4], pixel);
        }
    }
}

fn blend_into(dst: &mut [u8], src: [u8; 4]) {
    let alpha = src[3] as u32;
    if alpha == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    if alpha == 0 {
        return;
    }
    let inverse = 255 - alpha;
    for channel in 0..3 {
        dst[channel] = ((src[channel] as u32 * alpha + dst[channel] as u32 * inverse) / 255) as u8;
    }
    dst[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(raw: &str) -> ImageKey {
        ImageKey::new(raw).expect("key")
    }

    fn pixel_at(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    fn two_by_one() -> LoadedImage {
        LoadedImage::from_rgba(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255]).expect("image")
    }

    #[test]
    fn clear_then_blit_scales_nearest_neighbour() {
        let mut cache = ImageCache::new();
        cache.insert(key("graphics/pair.png"), two_by_one());
        let mut list = DrawList::new();
        list.push(DrawCommand::Clear { color: [1, 2, 3, 255] });
        list.push(DrawCommand::Image {
            image: key("graphics/pair.png"),
            source: None,
            dest: Rect::new(0, 0, 4, 2),
            fallback: [0; 4],
            silhouette: None,
        });

        let mut frame = vec![0u8; 8 * 4 * 4];
        rasterize(&mut frame, 8, 4, &list, &mut cache);

        assert_eq!(pixel_at(&frame, 8, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 8, 2, 0), [0, 0, 255, 255]);
        assert_eq!(pixel_at(&frame, 8, 5, 3), [1, 2, 3, 255]);
    }

    #[test]
    fn source_rect_selects_an_atlas_cell() {
        let mut cache = ImageCache::new();
        cache.insert(key("graphics/pair.png"), two_by_one());
        let mut list = DrawList::new();
        list.push(DrawCommand::Image {
            image: key("graphics/pair.png"),
            source: Some(Rect::new(1, 0, 1, 1)),
            dest: Rect::new(0, 0, 2, 2),
            fallback: [0; 4],
            silhouette: None,
        });
        let mut frame = vec![0u8; 2 * 2 * 4];
        rasterize(&mut frame, 2, 2, &list, &mut cache);
        assert!(frame.chunks_exact(4).all(|px| px == [0, 0, 255, 255]));
    }

    #[test]
    fn blits_clip_at_frame_edges() {
        let mut cache = ImageCache::new();
        cache.insert(key("graphics/pair.png"), two_by_one());
        let mut list = DrawList::new();
        list.push(DrawCommand::Image {
            image: key("graphics/pair.png"),
            source: None,
            dest: Rect::new(-1, -5, 2, 10),
            fallback: [0; 4],
            silhouette: None,
        });
        let mut frame = vec![0u8; 3 * 3 * 4];
        rasterize(&mut frame, 3, 3, &list, &mut cache);
        assert_eq!(pixel_at(&frame, 3, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel_at(&frame, 3, 1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn missing_image_fills_fallback_colour() {
        let mut cache = ImageCache::new();
        let mut list = DrawList::new();
        list.push(DrawCommand::Image {
            image: key("graphics/none.png"),
            source: None,
            dest: Rect::new(1, 1, 1, 1),
            fallback: [9, 9, 9, 255],
            silhouette: None,
        });
        let mut frame = vec![0u8; 3 * 3 * 4];
        rasterize(&mut frame, 3, 3, &list, &mut cache);
        assert_eq!(pixel_at(&frame, 3, 1, 1), [9, 9, 9, 255]);
        assert_eq!(pixel_at(&frame, 3, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn silhouette_recolours_opaque_pixels() {
        let mut cache = ImageCache::new();
        cache.insert(key("graphics/pair.png"), two_by_one());
        let mut list = DrawList::new();
        list.push(DrawCommand::Image {
            image: key("graphics/pair.png"),
            source: None,
            dest: Rect::new(0, 0, 2, 1),
            fallback: [0; 4],
            silhouette: Some([255, 255, 255, 255]),
        });
        let mut frame = vec![0u8; 2 * 4];
        rasterize(&mut frame, 2, 1, &list, &mut cache);
        assert!(frame.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
    }

    #[test]
    fn overlay_blends_by_alpha() {
        let mut cache = ImageCache::new();
        let mut list = DrawList::new();
        list.push(DrawCommand::Clear { color: [200, 200, 200, 255] });
        list.push(DrawCommand::Overlay { color: [0, 0, 0, 255] });
        list.push(DrawCommand::Clear { color: [200, 100, 0, 255] });
        list.push(DrawCommand::Overlay { color: [0, 0, 0, 0] });
        let mut frame = vec![0u8; 4];
        rasterize(&mut frame, 1, 1, &list, &mut cache);
        assert_eq!(frame, vec![200, 100, 0, 255]);

        let mut half = DrawList::new();
        half.push(DrawCommand::Clear { color: [255, 255, 255, 255] });
        half.push(DrawCommand::Overlay { color: [0, 0, 0, 255 / 2] });
        rasterize(&mut frame, 1, 1, &half, &mut cache);
        assert_eq!(frame, vec![128, 128, 128, 255]);
    }

    #[test]
    fn preload_reads_png_and_remembers_failures() {
        let temp = TempDir::new().expect("temp");
        let graphics = temp.path().join("graphics");
        std::fs::create_dir_all(&graphics).expect("dir");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .save(graphics.join("tile.png"))
            .expect("write png");

        let assets = AssetResolver::new(temp.path());
        let keys = [key("graphics/tile.png"), key("graphics/missing.png")];
        let mut cache = ImageCache::new();

        assert_eq!(cache.preload(&assets, &keys), 1);
        assert_eq!(cache.preload(&assets, &keys), 0);
        let loaded = cache.get(&keys[0]).expect("loaded");
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert!(cache.get(&keys[1]).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(LoadedImage::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(LoadedImage::from_rgba(0, 2, Vec::new()).is_none());
    }
}
