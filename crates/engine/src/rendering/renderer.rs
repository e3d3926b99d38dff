use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::assets::{AssetResolver, ImageKey};

use super::{rasterize, DrawList, ImageCache, Viewport};

/// Window-backed software renderer. The pixel buffer stays at the logical viewport size and
/// the surface scales it to whatever the window currently is.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    assets: AssetResolver,
    images: ImageCache,
}

impl Renderer {
    pub fn new(window: Arc<Window>, viewport: Viewport, assets: AssetResolver) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), viewport, size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport,
            assets,
            images: ImageCache::new(),
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), self.viewport, width, height)?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        viewport: Viewport,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(surface_width, surface_height, window);
        Pixels::new(viewport.width, viewport.height, surface)
    }

    /// Decodes every image the scene may draw. Call once after the scene loads.
    pub fn preload<'k>(&mut self, keys: impl IntoIterator<Item = &'k ImageKey>) -> usize {
        self.images.preload(&self.assets, keys)
    }

    pub fn render(&mut self, list: &DrawList) -> Result<(), Error> {
        let Viewport { width, height } = self.viewport;
        rasterize(self.pixels.frame_mut(), width, height, list, &mut self.images);
        self.pixels.render()
    }
}
