//! Scene pass: backdrop and reactive sphere into the HDR target.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use log::{debug, info};
use wgpu::util::DeviceExt;

use super::{RenderTarget, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::{Geometry, PrefilteredEnvMap, SceneHandles, Side, Vertex, VertexStage};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BackdropGpu {
    view_proj: [[f32; 4]; 4],
    resolution: [f32; 2],
    rand: f32,
    _padding: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SphereGpu {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    camera_position: [f32; 4],
    color: [f32; 4],
    emissive: [f32; 4],
    input_data: [f32; 4],
    output_data: [f32; 4],
    params: [f32; 4],
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn new(device: &wgpu::Device, geometry: &Geometry, label: &str) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", label)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: geometry.indices.len() as u32,
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// GPU state created by `compile`
struct CompiledScene {
    backdrop_pipeline: wgpu::RenderPipeline,
    sphere_pipeline: wgpu::RenderPipeline,
    backdrop: MeshBuffers,
    sphere: MeshBuffers,
}

pub struct ScenePass {
    backdrop_shader: wgpu::ShaderModule,
    sphere_shader: wgpu::ShaderModule,
    backdrop_layout: wgpu::BindGroupLayout,
    sphere_layout: wgpu::BindGroupLayout,
    backdrop_uniforms: wgpu::Buffer,
    backdrop_group: wgpu::BindGroup,
    sphere_uniforms: wgpu::Buffer,
    sphere_group: wgpu::BindGroup,
    env_source: Option<Arc<PrefilteredEnvMap>>,
    env_levels: u32,
    compiled: Option<CompiledScene>,
    color: Option<RenderTarget>,
    depth: Option<RenderTarget>,
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn cull_mode(side: Side) -> wgpu::Face {
    match side {
        Side::Front => wgpu::Face::Back,
        Side::Back => wgpu::Face::Front,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// 1x1 black stand-in until the real map arrives
fn placeholder_env(device: &wgpu::Device) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Placeholder Env Map"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_env(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    map: &PrefilteredEnvMap,
) -> wgpu::TextureView {
    let (width, height) = map.base_size();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Env Map"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: map.level_count(),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip, level) in map.levels().iter().enumerate() {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&level.texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(level.width * 16), // RGBA32F
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn sphere_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    env: &wgpu::TextureView,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Sphere Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(env),
            },
        ],
    })
}

impl ScenePass {
    pub fn new(device: &wgpu::Device) -> Self {
        let backdrop_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Backdrop Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("backdrop.wgsl").into()),
        });
        let sphere_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sphere Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sphere.wgsl").into()),
        });

        let backdrop_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Backdrop Bind Group Layout"),
            entries: &[uniform_entry(0)],
        });
        let sphere_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sphere Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let backdrop_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Backdrop Uniform Buffer"),
            size: std::mem::size_of::<BackdropGpu>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let backdrop_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Backdrop Bind Group"),
            layout: &backdrop_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: backdrop_uniforms.as_entire_binding(),
            }],
        });

        let sphere_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sphere Uniform Buffer"),
            size: std::mem::size_of::<SphereGpu>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sphere_group = sphere_group(
            device,
            &sphere_layout,
            &sphere_uniforms,
            &placeholder_env(device),
        );

        Self {
            backdrop_shader,
            sphere_shader,
            backdrop_layout,
            sphere_layout,
            backdrop_uniforms,
            backdrop_group,
            sphere_uniforms,
            sphere_group,
            env_source: None,
            env_levels: 0,
            compiled: None,
            color: None,
            depth: None,
        }
    }

    fn mesh_pipeline(
        &self,
        device: &wgpu::Device,
        label: &str,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::BindGroupLayout,
        vertex_entry: &str,
        side: Side,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(vertex_entry),
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(cull_mode(side)),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Run material compile hooks and build pipelines for the resulting stages
    pub fn compile(&mut self, device: &wgpu::Device, scene: &mut SceneHandles) {
        scene.sphere.material.compile();

        let vertex_entry = match scene.sphere.material.vertex_stage {
            VertexStage::Standard => "vs_standard",
            VertexStage::AudioDisplacement => "vs_displaced",
        };
        debug!("Sphere vertex stage: {}", vertex_entry);

        let backdrop_pipeline = self.mesh_pipeline(
            device,
            "Backdrop Pipeline",
            &self.backdrop_shader,
            &self.backdrop_layout,
            "vs_main",
            scene.backdrop.material.side,
        );
        let sphere_pipeline = self.mesh_pipeline(
            device,
            "Sphere Pipeline",
            &self.sphere_shader,
            &self.sphere_layout,
            vertex_entry,
            scene.sphere.material.side,
        );

        self.compiled = Some(CompiledScene {
            backdrop_pipeline,
            sphere_pipeline,
            backdrop: MeshBuffers::new(device, &scene.backdrop.geometry, "Backdrop"),
            sphere: MeshBuffers::new(device, &scene.sphere.geometry, "Sphere"),
        });
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.color = Some(RenderTarget::new(
            device,
            "Scene Color",
            width,
            height,
            HDR_FORMAT,
        ));
        self.depth = Some(RenderTarget::new(
            device,
            "Scene Depth",
            width,
            height,
            DEPTH_FORMAT,
        ));
    }

    pub fn color_target(&self) -> Option<&RenderTarget> {
        self.color.as_ref()
    }

    /// Upload this frame's uniforms and any newly assigned environment map
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &SceneHandles) {
        if let Some(map) = &scene.sphere.material.env_map {
            let fresh = self
                .env_source
                .as_ref()
                .map_or(true, |current| !Arc::ptr_eq(current, map));
            if fresh {
                let view = upload_env(device, queue, map);
                self.sphere_group =
                    sphere_group(device, &self.sphere_layout, &self.sphere_uniforms, &view);
                self.env_levels = map.level_count();
                self.env_source = Some(Arc::clone(map));
                info!("Environment map uploaded ({} levels)", self.env_levels);
            }
        }

        let camera = &scene.camera;
        let view_proj = camera.view_proj().to_cols_array_2d();

        let backdrop = &scene.backdrop.material.uniforms;
        queue.write_buffer(
            &self.backdrop_uniforms,
            0,
            bytemuck::cast_slice(&[BackdropGpu {
                view_proj,
                resolution: backdrop.resolution.to_array(),
                rand: backdrop.rand,
                _padding: 0.0,
            }]),
        );

        let sphere = &scene.sphere;
        let material = &sphere.material;
        let reactive = material.uniforms().copied().unwrap_or_default();
        let model = Mat4::from_scale_rotation_translation(
            Vec3::splat(sphere.scale),
            Quat::IDENTITY,
            sphere.position,
        );
        let has_env = if self.env_source.is_some() { 1.0 } else { 0.0 };

        queue.write_buffer(
            &self.sphere_uniforms,
            0,
            bytemuck::cast_slice(&[SphereGpu {
                view_proj,
                model: model.to_cols_array_2d(),
                camera_position: camera.position.extend(1.0).to_array(),
                color: material.color.extend(material.metalness).to_array(),
                emissive: (material.emissive * material.emissive_intensity)
                    .extend(material.roughness)
                    .to_array(),
                input_data: reactive.input_data.to_array(),
                output_data: reactive.output_data.to_array(),
                params: [reactive.time, self.env_levels as f32, has_env, 0.0],
            }]),
        );
    }

    /// Record the pass. Returns false if the pass is not ready to draw.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, scene: &SceneHandles) -> bool {
        let (Some(compiled), Some(color), Some(depth)) = (&self.compiled, &self.color, &self.depth)
        else {
            return false;
        };

        let clear = scene.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.x as f64,
                        g: clear.y as f64,
                        b: clear.z as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if scene.backdrop.visible {
            pass.set_pipeline(&compiled.backdrop_pipeline);
            pass.set_bind_group(0, &self.backdrop_group, &[]);
            compiled.backdrop.draw(&mut pass);
        }

        if scene.sphere.visible {
            pass.set_pipeline(&compiled.sphere_pipeline);
            pass.set_bind_group(0, &self.sphere_group, &[]);
            compiled.sphere.draw(&mut pass);
        }

        true
    }
}
