mod camera;
mod canvas;
mod renderer;

pub use camera::{draw_entities, Camera};
pub use canvas::{rasterize, ImageCache, LoadedImage};
pub use renderer::Renderer;

use crate::assets::ImageKey;
use crate::geometry::Rect;

/// Logical frame size. The pixel buffer always has these dimensions; the window surface
/// scales it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear {
        color: [u8; 4],
    },
    Image {
        image: ImageKey,
        /// Sub-rectangle of the image; `None` blits the whole image.
        source: Option<Rect>,
        /// Screen-space destination. The source is scaled to fit.
        dest: Rect,
        /// Filled into `dest` when the image is not loaded.
        fallback: [u8; 4],
        silhouette: Option<[u8; 4]>,
    },
    /// Full-frame wash blended with the colour's alpha.
    Overlay {
        color: [u8; 4],
    },
}

/// Ordered draw commands for one frame; later commands paint over earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Keys of every image command in draw order.
    pub fn image_keys(&self) -> impl Iterator<Item = &ImageKey> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Image { image, .. } => Some(image),
            _ => None,
        })
    }
}
