mod config;
mod engine;
mod source;

use anyhow::Result;
use clap::Parser;
use config::AppConfig;
use egui::Context as EguiContext;
use engine::{Engine, PlatformRequest};
use enigma_common::QualityTier;
use enigma_offline::{ClientAction, WorkerHandle};
use enigma_render::PostProcessing;
use enigma_render_wgpu::{GpuContext, WgpuRenderer};
use enigma_scene::ShadowConfig;
use enigma_ui::DEFAULT_TOAST_DURATION;
use source::AssetSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowId};

/// Longest frame time fed to the engine, so a stall does not fling bodies.
const MAX_FRAME_TIME: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "enigma-desktop", about = "Enigma interactive scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long, default_value = "enigma.yaml")]
    config: PathBuf,

    /// Rendering quality: low, medium, high or ultra
    #[arg(short, long)]
    quality: Option<QualityTier>,

    /// Directory assets are loaded from
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Read assets straight from disk, bypassing the offline cache
    #[arg(long)]
    no_offline: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(root) = &self.asset_root {
            config.asset_root = root.clone();
        }
        if self.no_offline {
            config.offline.enabled = false;
        }
    }
}

struct GpuApp {
    config: AppConfig,
    engine: Engine<WgpuRenderer, AssetSource>,
    source: Option<AssetSource>,
    offline: Option<WorkerHandle>,
    window: Option<Arc<Window>>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    dragging: bool,
    cursor: Option<PhysicalPosition<f64>>,
    last_frame: Instant,
}

impl GpuApp {
    fn new(config: AppConfig) -> Self {
        let (source, offline) = source::asset_source(&config);
        Self {
            engine: Engine::new(config.clone()),
            config,
            source: Some(source),
            offline,
            window: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
            dragging: false,
            cursor: None,
            last_frame: Instant::now(),
        }
    }

    fn poll_offline_actions(&mut self) {
        let Some(offline) = &self.offline else {
            return;
        };
        for action in offline.poll_actions() {
            match action {
                ClientAction::ShowNotification { title, body, .. } => {
                    self.engine
                        .show_message(format!("{title}: {body}"), DEFAULT_TOAST_DURATION);
                }
                ClientAction::OpenWindow(url) => {
                    tracing::info!(%url, "focus requested");
                    if let Some(window) = &self.window {
                        window.focus_window();
                    }
                }
            }
        }
    }

    fn handle_requests(&mut self) {
        let Some(window) = &self.window else {
            return;
        };
        for request in self.engine.take_requests() {
            match request {
                PlatformRequest::ToggleFullscreen => {
                    let next = match window.fullscreen() {
                        Some(_) => None,
                        None => Some(Fullscreen::Borderless(None)),
                    };
                    tracing::debug!(fullscreen = next.is_some(), "toggling fullscreen");
                    window.set_fullscreen(next);
                }
            }
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).min(MAX_FRAME_TIME);
        self.last_frame = now;

        self.poll_offline_actions();
        self.engine.configure_renderer(|renderer, settings, post, tint| {
            renderer.configure(settings, post);
            renderer.set_environment_tint(tint);
        });
        let frame = self.engine.frame(dt).flatten();
        self.handle_requests();

        let (Some(frame), Some(window), Some(egui_winit), Some(egui_renderer)) = (
            frame,
            self.window.as_ref(),
            self.egui_winit.as_mut(),
            self.egui_renderer.as_mut(),
        ) else {
            return;
        };

        let raw_input = egui_winit.take_egui_input(window);
        let engine = &mut self.engine;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            engine.overlay_mut().draw(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let Some(renderer) = self.engine.renderer() else {
            return;
        };
        let gpu = renderer.context();
        let (device, queue) = (gpu.device(), gpu.queue());
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let (width, height) = gpu.size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("overlay_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        frame.present();
    }

    fn shutdown(&mut self) {
        self.engine.dispose();
        self.egui_renderer = None;
        // Joins the worker thread.
        self.offline = None;
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.canvas_id.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let scale = window.scale_factor();
        let size = window.inner_size().to_logical::<u32>(scale);
        self.engine.set_device_pixel_ratio(scale as f32);
        self.engine.resize(size.width, size.height);

        if let Some(source) = self.source.take() {
            let target = window.clone();
            let booted = pollster::block_on(self.engine.bootstrap(
                |settings| {
                    let ctx = GpuContext::new(target, settings)?;
                    let post = PostProcessing::new(settings.width, settings.height);
                    Ok(WgpuRenderer::new(ctx, settings, &post, ShadowConfig::default().map_size))
                },
                source,
            ));
            if booted.is_err() {
                tracing::warn!("running without a renderer");
            }
        }

        if let Some(renderer) = self.engine.renderer() {
            let gpu = renderer.context();
            tracing::info!(backend = %renderer.backend(), "renderer ready");
            self.egui_renderer = Some(egui_wgpu::Renderer::new(
                gpu.device(),
                gpu.surface_format(),
                None,
                1,
                false,
            ));
        }
        enigma_ui::apply_style(&self.egui_ctx);
        self.egui_winit = Some(egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(scale as f32),
            None,
            None,
        ));
        self.window = Some(window);
        self.last_frame = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(window) = &self.window {
                    let size = new_size.to_logical::<u32>(window.scale_factor());
                    self.engine.resize(size.width.max(1), size.height.max(1));
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.engine.set_device_pixel_ratio(scale_factor as f32);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.dragging, self.cursor) {
                    if let Some(scene) = self.engine.scene_mut() {
                        scene
                            .controls
                            .rotate((position.x - last.x) as f32, (position.y - last.y) as f32);
                    }
                }
                self.cursor = Some(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 50.0) as f32,
                };
                if let Some(scene) = self.engine.scene_mut() {
                    scene.controls.zoom(steps);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load(&cli.config)?;
    cli.apply(&mut config);
    tracing::info!(quality = %config.quality, offline = config.offline.enabled, "enigma-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
