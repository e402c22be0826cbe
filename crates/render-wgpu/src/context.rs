use enigma_render::{BackendKind, RenderError, RenderSettings, select_backend};

/// Surface, device and queue for one window.
pub struct GpuContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    backend: BackendKind,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Create a context for `target`, preferring the native backends and
    /// falling back to GL once if they are missing or fail.
    pub fn new<T>(target: T, settings: &RenderSettings) -> Result<Self, RenderError>
    where
        T: Into<wgpu::SurfaceTarget<'static>> + Clone,
    {
        let probe = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let preferred_supported = !probe.enumerate_adapters(wgpu::Backends::PRIMARY).is_empty();
        drop(probe);

        let fallback_target = target.clone();
        let (backend, ctx) = select_backend(
            preferred_supported,
            || Self::build(BackendKind::Preferred, target, settings),
            || Self::build(BackendKind::Fallback, fallback_target, settings),
        )?;
        tracing::info!(
            backend = %backend,
            api = ctx.adapter_info.backend.to_str(),
            adapter = %ctx.adapter_info.name,
            "GPU initialized"
        );
        Ok(ctx)
    }

    fn build<T>(kind: BackendKind, target: T, settings: &RenderSettings) -> Result<Self, RenderError>
    where
        T: Into<wgpu::SurfaceTarget<'static>>,
    {
        let backends = match kind {
            BackendKind::Preferred => wgpu::Backends::PRIMARY,
            BackendKind::Fallback => wgpu::Backends::GL,
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter(kind))?;

        let required_limits = match kind {
            BackendKind::Preferred => wgpu::Limits::default(),
            BackendKind::Fallback => {
                wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
            }
        };
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("enigma_device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::Device(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (width, height) = settings.physical_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            backend: kind,
            adapter_info: adapter.get_info(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current surface size in device pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface. Returns whether the size actually changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == self.size() {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    /// Next swapchain image. A lost or outdated surface is reconfigured and
    /// the frame skipped.
    pub fn acquire(&self) -> Option<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(texture) => Some(texture),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                None
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                None
            }
        }
    }
}
