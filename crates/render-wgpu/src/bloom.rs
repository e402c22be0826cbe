use crate::shaders;
use bytemuck::{Pod, Zeroable};
use enigma_render::BloomSettings;

pub(crate) const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BloomParams {
    direction: [f32; 2],
    texel_size: [f32; 2],
    threshold: f32,
    strength: f32,
    radius: f32,
    _pad: f32,
}

/// Size-dependent half-resolution ping/pong targets and the bind groups
/// reading from them.
struct BloomTargets {
    ping: wgpu::TextureView,
    pong: wgpu::TextureView,
    bright: wgpu::BindGroup,
    blur_h: wgpu::BindGroup,
    blur_v: wgpu::BindGroup,
    composite: wgpu::BindGroup,
    half_size: (u32, u32),
}

/// Size-independent layouts, sampler and parameter buffers.
struct BloomResources {
    single_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bright_params: wgpu::Buffer,
    blur_h_params: wgpu::Buffer,
    blur_v_params: wgpu::Buffer,
    composite_params: wgpu::Buffer,
}

/// Bright pass, separable blur and additive composite onto the surface.
pub struct BloomPass {
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    res: BloomResources,
    targets: BloomTargets,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn layout_entries(with_bloom: bool) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![
        texture_entry(0),
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
    ];
    if with_bloom {
        entries.push(texture_entry(3));
    }
    entries
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    fs_entry: &str,
    format: wgpu::TextureFormat,
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
            module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fs_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: Default::default(),
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn params_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<BloomParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Colour target usable both as a render attachment and a sampled texture.
pub(crate) fn color_target(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&Default::default())
}

impl BloomPass {
    pub fn new(
        device: &wgpu::Device,
        hdr: &wgpu::TextureView,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLOOM_SHADER.into()),
        });
        let single_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_single_layout"),
            entries: &layout_entries(false),
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_composite_layout"),
            entries: &layout_entries(true),
        });

        let bright_pipeline =
            fullscreen_pipeline(device, "bloom_bright", &single_layout, &module, "fs_bright", HDR_FORMAT);
        let blur_pipeline =
            fullscreen_pipeline(device, "bloom_blur", &single_layout, &module, "fs_blur", HDR_FORMAT);
        let composite_pipeline = fullscreen_pipeline(
            device,
            "bloom_composite",
            &composite_layout,
            &module,
            "fs_composite",
            output_format,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let res = BloomResources {
            single_layout,
            composite_layout,
            sampler,
            bright_params: params_buffer(device, "bloom_bright_params"),
            blur_h_params: params_buffer(device, "bloom_blur_h_params"),
            blur_v_params: params_buffer(device, "bloom_blur_v_params"),
            composite_params: params_buffer(device, "bloom_composite_params"),
        };
        let targets = res.build_targets(device, hdr, width, height);

        Self {
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            res,
            targets,
        }
    }

    /// Recreate the half-resolution targets for a new HDR target.
    pub fn resize(&mut self, device: &wgpu::Device, hdr: &wgpu::TextureView, width: u32, height: u32) {
        self.targets = self.res.build_targets(device, hdr, width, height);
    }

    pub fn update(&self, queue: &wgpu::Queue, settings: &BloomSettings) {
        let (w, h) = self.targets.half_size;
        let base = BloomParams {
            direction: [0.0, 0.0],
            texel_size: [1.0 / w as f32, 1.0 / h as f32],
            threshold: settings.threshold,
            strength: settings.strength,
            radius: settings.radius,
            _pad: 0.0,
        };
        queue.write_buffer(&self.res.bright_params, 0, bytemuck::bytes_of(&base));
        queue.write_buffer(&self.res.composite_params, 0, bytemuck::bytes_of(&base));
        let horizontal = BloomParams {
            direction: [1.0, 0.0],
            ..base
        };
        queue.write_buffer(&self.res.blur_h_params, 0, bytemuck::bytes_of(&horizontal));
        let vertical = BloomParams {
            direction: [0.0, 1.0],
            ..base
        };
        queue.write_buffer(&self.res.blur_v_params, 0, bytemuck::bytes_of(&vertical));
    }

    /// Encode bright, blur and composite passes; the composite writes `output`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let t = &self.targets;
        self.fullscreen(encoder, "bloom_bright_pass", &t.ping, &self.bright_pipeline, &t.bright);
        self.fullscreen(encoder, "bloom_blur_h_pass", &t.pong, &self.blur_pipeline, &t.blur_h);
        self.fullscreen(encoder, "bloom_blur_v_pass", &t.ping, &self.blur_pipeline, &t.blur_v);
        self.fullscreen(encoder, "bloom_composite_pass", output, &self.composite_pipeline, &t.composite);
    }

    fn fullscreen(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
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
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

impl BloomResources {
    fn build_targets(
        &self,
        device: &wgpu::Device,
        hdr: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> BloomTargets {
        let half_size = ((width / 2).max(1), (height / 2).max(1));
        let ping = color_target(device, "bloom_ping", HDR_FORMAT, half_size.0, half_size.1);
        let pong = color_target(device, "bloom_pong", HDR_FORMAT, half_size.0, half_size.1);

        let single = |label: &str, source: &wgpu::TextureView, params: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.single_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                ],
            })
        };
        let bright = single("bloom_bright_bind_group", hdr, &self.bright_params);
        let blur_h = single("bloom_blur_h_bind_group", &ping, &self.blur_h_params);
        let blur_v = single("bloom_blur_v_bind_group", &pong, &self.blur_v_params);

        let composite = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom_composite_bind_group"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(hdr),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.composite_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&ping),
                },
            ],
        });

        BloomTargets {
            ping,
            pong,
            bright,
            blur_h,
            blur_v,
            composite,
            half_size,
        }
    }
}
