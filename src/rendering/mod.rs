//! wgpu implementation of the render pipeline.

mod bloom_pass;
mod scene_pass;

use std::sync::Arc;

use log::{debug, info};

use crate::error::{EngineError, Result};
use crate::params::RenderConfig;
use crate::pipeline::{PassKind, RenderPipeline, PASS_ORDER};
use crate::scene::SceneHandles;
use crate::viewport::ViewportSize;

pub use bloom_pass::{mip_size, BloomPass};
pub use scene_pass::ScenePass;

/// Offscreen color format for scene and bloom buffers
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Offscreen texture sized to (part of) the viewport
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}

/// Window-backed renderer: scene pass, then bloom composited onto the surface
pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    scene_pass: ScenePass,
    bloom_pass: BloomPass,
}

impl GpuRenderer {
    pub async fn new(window: Arc<winit::window::Window>, render: &RenderConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Window must have 'static lifetime via Arc
        let surface = instance
            .create_surface(window)
            .map_err(|e| EngineError::GraphicsSetup(format!("Failed to create surface: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                EngineError::GraphicsSetup("Failed to find suitable GPU adapter".to_string())
            })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::GraphicsSetup(format!("Failed to request device: {}", e)))?;

        info!("GPU adapter: {}", adapter.get_info().name);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| {
                EngineError::GraphicsSetup("Surface reports no texture formats".to_string())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let scene_pass = ScenePass::new(&device);
        let bloom_pass = BloomPass::new(&device, surface_format, &render.bloom);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            scene_pass,
            bloom_pass,
        })
    }

    /// Blocking constructor for synchronous hosts
    pub fn create(window: Arc<winit::window::Window>, render: &RenderConfig) -> Result<Self> {
        pollster::block_on(Self::new(window, render))
    }

    fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl RenderPipeline for GpuRenderer {
    fn compile(&mut self, scene: &mut SceneHandles) -> Result<()> {
        self.scene_pass.compile(&self.device, scene);
        Ok(())
    }

    fn set_size(&mut self, size: ViewportSize) {
        let max = self.device.limits().max_texture_dimension_2d;
        let (width, height) = size.physical();
        let (width, height) = (width.clamp(1, max), height.clamp(1, max));

        self.config.width = width;
        self.config.height = height;
        self.reconfigure();

        self.scene_pass.resize(&self.device, width, height);
        if let Some(color) = self.scene_pass.color_target() {
            self.bloom_pass.resize(&self.device, color);
        }
        debug!("Render buffers resized to {}x{}", width, height);
    }

    fn render(&mut self, scene: &SceneHandles) -> Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return Err(EngineError::RenderPass(
                    "Surface lost; reconfigured".to_string(),
                ));
            }
            Err(e) => {
                return Err(EngineError::RenderPass(format!(
                    "Failed to acquire frame: {}",
                    e
                )))
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.scene_pass.prepare(&self.device, &self.queue, scene);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for pass in PASS_ORDER {
            let recorded = match pass {
                PassKind::Scene => self.scene_pass.record(&mut encoder, scene),
                PassKind::Bloom => self.bloom_pass.record(&mut encoder, &view),
            };
            if !recorded {
                // Dropping the unpresented frame leaves the surface untouched
                return Err(EngineError::RenderPass(format!(
                    "{:?} pass has no buffers yet",
                    pass
                )));
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
