use crate::bloom::{BloomPass, HDR_FORMAT, color_target};
use crate::context::GpuContext;
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use enigma_common::{Color, Geometry};
use enigma_render::{BackendKind, PostProcessing, RenderSettings, Renderer};
use enigma_scene::{DirectionalLight, MeshHandle, PerspectiveCamera, Scene};
use glam::Mat4;
use std::collections::BTreeMap;
use wgpu::util::DeviceExt;

const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    ambient: [f32; 4],
    key_dir: [f32; 4],
    key_color: [f32; 4],
    fill_dir: [f32; 4],
    fill_color: [f32; 4],
    shadow: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
    emissive: [f32; 4],
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let vertices: Vec<Vertex> = geometry
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| Vertex {
                position: *p,
                normal: geometry.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            })
            .collect();
        let indices = geometry.indices_or_sequential();
        Self {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertex_buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_index_buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: indices.len() as u32,
        }
    }
}

/// A rendered swapchain image, not yet presented. Overlays may draw onto
/// `view` before [`Frame::present`].
pub struct Frame {
    texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl Frame {
    pub fn present(self) {
        self.texture.present();
    }
}

fn direction_to_light(light: &DirectionalLight) -> [f32; 4] {
    (-light.direction()).extend(0.0).to_array()
}

fn radiance(color: Color, intensity: f32) -> [f32; 4] {
    let [r, g, b] = color.scaled(intensity);
    [r, g, b, 0.0]
}

/// wgpu scene renderer: shadow pass, lit HDR pass, bloom composite.
pub struct WgpuRenderer {
    ctx: GpuContext,
    lit_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    lit_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    shadow_view: wgpu::TextureView,
    shadow_map_size: u32,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    meshes: BTreeMap<MeshHandle, GpuMesh>,
    hdr_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    bloom: BloomPass,
    post: PostProcessing,
    shadows_enabled: bool,
    environment_tint: Option<Color>,
}

impl WgpuRenderer {
    pub fn new(ctx: GpuContext, settings: &RenderSettings, post: &PostProcessing, shadow_map_size: u32) -> Self {
        let device = ctx.device();
        let (width, height) = ctx.size();

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals_buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let globals_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let lit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lit_bind_group_layout"),
            entries: &[
                globals_entry,
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_bind_group_layout"),
            entries: &[globals_entry],
        });

        let shadow_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("shadow_map"),
                size: wgpu::Extent3d {
                    width: shadow_map_size,
                    height: shadow_map_size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SHADOW_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&Default::default());
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let lit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lit_bind_group"),
            layout: &lit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let vertex_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![
                    0 => Float32x3,
                    1 => Float32x3,
                ],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<InstanceData>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    2 => Float32x4,
                    3 => Float32x4,
                    4 => Float32x4,
                    5 => Float32x4,
                    6 => Float32x4,
                    7 => Float32x4,
                ],
            },
        ];

        let lit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lit_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::LIT_SHADER.into()),
        });
        let lit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit_pipeline_layout"),
            bind_group_layouts: &[&lit_layout],
            push_constant_ranges: &[],
        });
        let lit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lit_pipeline"),
            layout: Some(&lit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &lit_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &vertex_layouts,
            },
            fragment: Some(wgpu::FragmentState {
                module: &lit_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SHADOW_SHADER.into()),
        });
        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&shadow_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs_shadow"),
                compilation_options: Default::default(),
                buffers: &vertex_layouts,
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let instance_capacity = 64;
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);
        let hdr_view = color_target(device, "hdr_target", HDR_FORMAT, width, height);
        let depth_view = Self::create_depth_texture(device, width, height);
        let bloom = BloomPass::new(device, &hdr_view, ctx.surface_format(), width, height);

        Self {
            ctx,
            lit_pipeline,
            shadow_pipeline,
            globals_buffer,
            lit_bind_group,
            shadow_bind_group,
            shadow_view,
            shadow_map_size,
            instance_buffer,
            instance_capacity,
            meshes: BTreeMap::new(),
            hdr_view,
            depth_view,
            bloom,
            post: *post,
            shadows_enabled: settings.shadows_enabled,
            environment_tint: None,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.ctx.backend()
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Apply surface and post-processing settings. Size-dependent targets are
    /// recreated only when the physical size changes.
    pub fn configure(&mut self, settings: &RenderSettings, post: &PostProcessing) {
        self.shadows_enabled = settings.shadows_enabled;
        self.post = *post;
        let (width, height) = settings.physical_size();
        if self.ctx.resize(width, height) {
            let device = self.ctx.device();
            self.hdr_view = color_target(device, "hdr_target", HDR_FORMAT, width, height);
            self.depth_view = Self::create_depth_texture(device, width, height);
            self.bloom.resize(device, &self.hdr_view, width, height);
            tracing::debug!(width, height, "render targets recreated");
        }
    }

    /// Ambient tint sampled from the active environment map.
    pub fn set_environment_tint(&mut self, tint: Option<Color>) {
        self.environment_tint = tint;
    }

    pub fn uploaded_meshes(&self) -> usize {
        self.meshes.len()
    }

    fn globals(&self, scene: &Scene, camera: &PerspectiveCamera) -> Globals {
        let lights = &scene.lights;
        let key_shadow = lights.key.shadow.filter(|_| self.shadows_enabled);
        let light_view_proj = if key_shadow.is_some() {
            lights.key.light_view_projection().unwrap_or(Mat4::IDENTITY)
        } else {
            Mat4::IDENTITY
        };
        let mut ambient = radiance(lights.ambient.color, lights.ambient.intensity);
        if let Some(tint) = self.environment_tint {
            for (channel, t) in ambient.iter_mut().zip(tint.scaled(0.5)) {
                *channel += t;
            }
        }
        Globals {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            ambient,
            key_dir: direction_to_light(&lights.key),
            key_color: radiance(lights.key.color, lights.key.intensity),
            fill_dir: direction_to_light(&lights.fill),
            fill_color: radiance(lights.fill.color, lights.fill.intensity),
            shadow: [
                key_shadow.map_or(0.0, |s| s.bias),
                if key_shadow.is_some() { 1.0 } else { 0.0 },
                1.0 / self.shadow_map_size as f32,
                0.0,
            ],
        }
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (capacity * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }

    fn draw_meshes(&self, pass: &mut wgpu::RenderPass<'_>, draws: &[MeshHandle]) {
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (i, handle) in draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(handle) else {
                continue;
            };
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            let i = i as u32;
            pass.draw_indexed(0..mesh.index_count, 0, i..i + 1);
        }
    }
}

impl Renderer for WgpuRenderer {
    type Output = Option<Frame>;

    /// Drop the GPU buffers of a mesh. Returns whether it was uploaded.
    fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        self.meshes.remove(&handle).is_some()
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Option<Frame> {
        let mut instances = Vec::new();
        let mut draws = Vec::new();
        for (_, node) in scene.graph.iter() {
            let Some(mesh) = node.mesh.as_ref().filter(|_| node.visible) else {
                continue;
            };
            if !self.meshes.contains_key(&mesh.handle) {
                self.meshes
                    .insert(mesh.handle, GpuMesh::upload(self.ctx.device(), &mesh.geometry));
            }
            let cols = node.transform.matrix().to_cols_array_2d();
            let m = node.material;
            instances.push(InstanceData {
                model_0: cols[0],
                model_1: cols[1],
                model_2: cols[2],
                model_3: cols[3],
                color: [m.color.r, m.color.g, m.color.b, m.metalness],
                emissive: [m.emissive.r, m.emissive.g, m.emissive.b, m.roughness],
            });
            draws.push(mesh.handle);
        }

        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(self.ctx.device(), self.instance_capacity);
        }

        let frame = self.ctx.acquire()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let device = self.ctx.device();
        let queue = self.ctx.queue();
        let globals = self.globals(scene, camera);
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        self.bloom.update(queue, &self.post.bloom);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            if globals.shadow[1] > 0.0 {
                pass.set_pipeline(&self.shadow_pipeline);
                pass.set_bind_group(0, &self.shadow_bind_group, &[]);
                self.draw_meshes(&mut pass, &draws);
            }
        }

        {
            let bg = scene.background;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.hdr_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg.r as f64,
                            g: bg.g as f64,
                            b: bg.b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_pipeline(&self.lit_pipeline);
            pass.set_bind_group(0, &self.lit_bind_group, &[]);
            self.draw_meshes(&mut pass, &draws);
        }

        self.bloom.encode(&mut encoder, &view);
        queue.submit(std::iter::once(encoder.finish()));

        Some(Frame {
            texture: frame,
            view,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enigma_scene::Lights;

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<Globals>(), 240);
        assert_eq!(std::mem::size_of::<InstanceData>(), 96);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn key_light_points_towards_light() {
        let lights = Lights::default();
        let dir = direction_to_light(&lights.key);
        let expected = lights.key.position.normalize();
        assert!((glam::Vec3::new(dir[0], dir[1], dir[2]) - expected).length() < 1e-5);
        assert_eq!(dir[3], 0.0);
    }

    #[test]
    fn radiance_scales_color() {
        assert_eq!(radiance(Color::WHITE, 2.0), [2.0, 2.0, 2.0, 0.0]);
    }
}
