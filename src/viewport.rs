//! Viewport sizing shared by the camera, backdrop uniforms and render passes.

use glam::Vec2;
use log::debug;
use winit::dpi::PhysicalSize;

use crate::pipeline::RenderPipeline;
use crate::scene::SceneHandles;

/// Display area in logical pixels, the device pixel ratio, and the exact
/// device-pixel size the surface must match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub physical_width: u32,
    pub physical_height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
            physical_width: (width as f32 * pixel_ratio).round() as u32,
            physical_height: (height as f32 * pixel_ratio).round() as u32,
        }
    }

    /// Wrap a window's physical size. The device-pixel size is kept as given;
    /// the logical size is derived for the aspect ratio only.
    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self {
            width: logical.width.round() as u32,
            height: logical.height.round() as u32,
            pixel_ratio: scale_factor as f32,
            physical_width: size.width,
            physical_height: size.height,
        }
    }

    /// Size in device pixels
    pub fn physical(&self) -> (u32, u32) {
        (self.physical_width, self.physical_height)
    }

    pub fn aspect(&self) -> f32 {
        if self.physical_height > 0 {
            self.physical_width as f32 / self.physical_height as f32
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.physical_width == 0 || self.physical_height == 0
    }
}

/// Keeps camera, backdrop resolution and pipeline buffers in agreement
#[derive(Debug, Default)]
pub struct ViewportManager {
    current: Option<ViewportSize>,
}

impl ViewportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ViewportSize> {
        self.current
    }

    /// Recompute everything size-dependent. Empty sizes are ignored and
    /// return false.
    pub fn resize(
        &mut self,
        size: ViewportSize,
        scene: &mut SceneHandles,
        pipeline: &mut dyn RenderPipeline,
    ) -> bool {
        if size.is_empty() {
            debug!("Ignoring empty viewport {}x{}", size.width, size.height);
            return false;
        }

        scene.camera.aspect = size.aspect();
        scene.camera.update_projection_matrix();

        let (w, h) = size.physical();
        scene.backdrop.material.uniforms.resolution = Vec2::new(w as f32, h as f32);

        pipeline.set_size(size);
        self.current = Some(size);

        debug!(
            "Viewport {}x{} @{} ({}x{} device px)",
            size.width, size.height, size.pixel_ratio, w, h
        );
        true
    }
}
