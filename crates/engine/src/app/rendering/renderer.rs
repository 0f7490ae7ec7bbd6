use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::tools::{draw_console, draw_overlay, draw_param_panel, ParamSet};
use crate::app::{ConsoleState, OverlayData, SceneWorld};

use super::raster::draw_scene;

/// Software renderer presenting through a `pixels` surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

/// Debug layers composited over the scene, drawn in field order.
#[derive(Default)]
pub(crate) struct DebugLayers<'a> {
    pub params: Option<&'a ParamSet>,
    pub overlay: Option<&'a OverlayData>,
    pub console: Option<&'a ConsoleState>,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_world(
        &mut self,
        world: &SceneWorld,
        layers: DebugLayers<'_>,
    ) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let (width, height) = (self.width, self.height);
        let frame = self.pixels.frame_mut();
        draw_scene(frame, width, height, world);

        if let Some(params) = layers.params {
            draw_param_panel(frame, width, height, params);
        }
        if let Some(data) = layers.overlay {
            draw_overlay(frame, width, height, data);
        }
        if let Some(console) = layers.console {
            draw_console(frame, width, height, console);
        }

        self.pixels.render()
    }
}
