//! Bloom: bright pass, blurred mip chain, additive composite onto the surface.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{RenderTarget, HDR_FORMAT};
use crate::params::BloomConfig;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PostUniforms {
    params: [f32; 4],
    weight: [f32; 4],
}

/// Fullscreen draw reading one texture
struct PostStep {
    group: wgpu::BindGroup,
}

/// One blur level: horizontal into `horizontal`, vertical into `vertical`
struct BlurLevel {
    horizontal: RenderTarget,
    vertical: RenderTarget,
    horizontal_step: PostStep,
    vertical_step: PostStep,
}

/// Everything that depends on the viewport size
struct BloomTargets {
    bright: RenderTarget,
    bright_step: PostStep,
    levels: Vec<BlurLevel>,
    scene_blit: PostStep,
    mip_blits: Vec<PostStep>,
}

pub struct BloomPass {
    config: BloomConfig,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    copy_pipeline: wgpu::RenderPipeline,
    add_pipeline: wgpu::RenderPipeline,
    targets: Option<BloomTargets>,
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::OVER,
};

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Size of blur level `level` for a viewport of `width`x`height`
pub fn mip_size(width: u32, height: u32, level: usize) -> (u32, u32) {
    let half = |v: u32| (v / 2).max(1);
    let mut size = (half(width), half(height));
    for _ in 0..level {
        size = (half(size.0), half(size.1));
    }
    size
}

impl BloomPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, config: &BloomConfig) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("post.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let bright_pipeline = fullscreen_pipeline(
            device,
            "Bloom Bright Pipeline",
            &shader,
            &pipeline_layout,
            "fs_bright",
            HDR_FORMAT,
            None,
        );
        let blur_pipeline = fullscreen_pipeline(
            device,
            "Bloom Blur Pipeline",
            &shader,
            &pipeline_layout,
            "fs_blur",
            HDR_FORMAT,
            None,
        );
        let copy_pipeline = fullscreen_pipeline(
            device,
            "Composite Copy Pipeline",
            &shader,
            &pipeline_layout,
            "fs_blit",
            surface_format,
            None,
        );
        let add_pipeline = fullscreen_pipeline(
            device,
            "Composite Add Pipeline",
            &shader,
            &pipeline_layout,
            "fs_blit",
            surface_format,
            Some(ADDITIVE),
        );

        Self {
            config: config.clone(),
            layout,
            sampler,
            bright_pipeline,
            blur_pipeline,
            copy_pipeline,
            add_pipeline,
            targets: None,
        }
    }

    fn step(
        &self,
        device: &wgpu::Device,
        label: &str,
        source: &RenderTarget,
        uniforms: PostUniforms,
    ) -> PostStep {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
        });
        PostStep { group }
    }

    /// Rebuild every buffer for a new viewport. `scene_color` is the scene
    /// pass output at full resolution.
    pub fn resize(&mut self, device: &wgpu::Device, scene_color: &RenderTarget) {
        let (width, height) = (scene_color.width, scene_color.height);
        let (bright_w, bright_h) = mip_size(width, height, 0);

        let bright = RenderTarget::new(device, "Bloom Bright", bright_w, bright_h, HDR_FORMAT);
        let bright_step = self.step(
            device,
            "Bloom Bright Step",
            scene_color,
            PostUniforms {
                params: [self.config.threshold, self.config.smooth_width, 0.0, 0.0],
                weight: [1.0; 4],
            },
        );

        let mut levels: Vec<BlurLevel> = Vec::with_capacity(self.config.levels());
        for (i, &kernel) in self.config.kernel_radii.iter().enumerate() {
            let (w, h) = mip_size(width, height, i);
            let horizontal = RenderTarget::new(device, "Bloom Horizontal", w, h, HDR_FORMAT);
            let vertical = RenderTarget::new(device, "Bloom Vertical", w, h, HDR_FORMAT);
            let texel = [1.0 / w as f32, 1.0 / h as f32];

            let source = levels.last().map_or(&bright, |previous| &previous.vertical);
            let horizontal_step = self.step(
                device,
                "Bloom Blur H",
                source,
                PostUniforms {
                    params: [texel[0], 0.0, kernel as f32, 0.0],
                    weight: [1.0; 4],
                },
            );
            let vertical_step = self.step(
                device,
                "Bloom Blur V",
                &horizontal,
                PostUniforms {
                    params: [0.0, texel[1], kernel as f32, 0.0],
                    weight: [1.0; 4],
                },
            );

            levels.push(BlurLevel {
                horizontal,
                vertical,
                horizontal_step,
                vertical_step,
            });
        }

        let scene_blit = self.step(
            device,
            "Composite Scene",
            scene_color,
            PostUniforms {
                params: [0.0; 4],
                weight: [1.0; 4],
            },
        );
        let mip_blits = levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                let w = self.config.mip_weight(i);
                self.step(
                    device,
                    "Composite Mip",
                    &level.vertical,
                    PostUniforms {
                        params: [0.0; 4],
                        weight: [w, w, w, 0.0],
                    },
                )
            })
            .collect();

        self.targets = Some(BloomTargets {
            bright,
            bright_step,
            levels,
            scene_blit,
            mip_blits,
        });
    }

    /// Record bloom and the composite into `output`. Returns false before
    /// the first resize.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) -> bool {
        let Some(targets) = &self.targets else {
            return false;
        };

        self.fullscreen(
            encoder,
            "Bloom Bright Pass",
            &self.bright_pipeline,
            &targets.bright.view,
            &targets.bright_step,
        );

        for level in &targets.levels {
            self.fullscreen(
                encoder,
                "Bloom Blur H Pass",
                &self.blur_pipeline,
                &level.horizontal.view,
                &level.horizontal_step,
            );
            self.fullscreen(
                encoder,
                "Bloom Blur V Pass",
                &self.blur_pipeline,
                &level.vertical.view,
                &level.vertical_step,
            );
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.copy_pipeline);
        pass.set_bind_group(0, &targets.scene_blit.group, &[]);
        pass.draw(0..3, 0..1);

        pass.set_pipeline(&self.add_pipeline);
        for blit in &targets.mip_blits {
            pass.set_bind_group(0, &blit.group, &[]);
            pass.draw(0..3, 0..1);
        }

        true
    }

    fn fullscreen(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        target: &wgpu::TextureView,
        step: &PostStep,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &step.group, &[]);
        pass.draw(0..3, 0..1); // Fullscreen triangle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_sizes_halve_from_half_resolution() {
        assert_eq!(mip_size(2560, 1440, 0), (1280, 720));
        assert_eq!(mip_size(2560, 1440, 1), (640, 360));
        assert_eq!(mip_size(2560, 1440, 4), (80, 45));
    }

    #[test]
    fn test_mip_sizes_never_reach_zero() {
        assert_eq!(mip_size(3, 1, 0), (1, 1));
        assert_eq!(mip_size(3, 1, 6), (1, 1));
    }
}
