//! Startup sequence and frame loop, independent of any window or GPU.
//!
//! The window shell owns an [`Engine`], feeds it sizes and frame times, and
//! carries out the [`PlatformRequest`]s it cannot satisfy itself.

use crate::config::AppConfig;
use enigma_assets::{AssetKind, AssetManager, Released};
use enigma_common::{Color, Fetcher, Geometry, ObjectId, QualityTier};
use enigma_events::{AppEvent, EventBus};
use enigma_physics::{BodyConfig, ColliderKind, PhysicsError, PhysicsSystem};
use enigma_render::{
    BloomSettings, PostProcessing, RenderError, RenderSettings, Renderer, ResizeNotifier,
    apply_quality,
};
use enigma_scene::{Material, Mesh, MeshHandle, Scene, SceneNode};
use enigma_ui::{DEFAULT_TOAST_DURATION, Overlay, UiAction, UiActionKind, UiHandlers};
use glam::Quat;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

pub const FAILURE_MESSAGE: &str = "Failed to initialize the experience. Try reloading.";
pub const FAILURE_TOAST: Duration = Duration::from_millis(5000);
pub const ASSET_FAILURE_MESSAGE: &str = "Some assets could not be loaded";
pub const ASSET_FAILURE_TOAST: Duration = Duration::from_millis(3000);

/// Radians per second of the example object's idle spin.
const SPIN_RATE: f32 = 0.4;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("renderer: {0}")]
    Render(#[from] RenderError),
    #[error("physics: {0}")]
    Physics(#[from] PhysicsError),
}

/// Something only the window shell can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformRequest {
    ToggleFullscreen,
}

pub struct Engine<R, F> {
    config: AppConfig,
    bus: EventBus<AppEvent>,
    overlay: Overlay,
    handlers: UiHandlers<Engine<R, F>>,
    settings: RenderSettings,
    post: PostProcessing,
    resize: ResizeNotifier,
    quality: QualityTier,
    device_pixel_ratio: f32,
    renderer: Option<R>,
    scene: Option<Scene>,
    assets: Option<AssetManager<F>>,
    physics: Option<PhysicsSystem>,
    example: Option<ObjectId>,
    released: Rc<RefCell<Vec<Released>>>,
    requests: Vec<PlatformRequest>,
    running: bool,
    elapsed: f32,
    renderer_dirty: bool,
}

impl<R: Renderer + 'static, F: Fetcher + 'static> Engine<R, F> {
    /// Show the loading screen and wire the overlay's actions. Nothing else
    /// exists until [`Engine::bootstrap`] runs.
    pub fn new(config: AppConfig) -> Self {
        let bus = EventBus::new();
        let resize = ResizeNotifier::new(bus.emitter());
        let settings = RenderSettings::new(config.width, config.height, config.device_pixel_ratio);
        let post = PostProcessing::new(config.width, config.height);
        let mut engine = Self {
            quality: config.quality,
            device_pixel_ratio: config.device_pixel_ratio,
            config,
            bus,
            overlay: Overlay::new(),
            handlers: UiHandlers::new(),
            settings,
            post,
            resize,
            renderer: None,
            scene: None,
            assets: None,
            physics: None,
            example: None,
            released: Rc::new(RefCell::new(Vec::new())),
            requests: Vec::new(),
            running: false,
            elapsed: 0.0,
            renderer_dirty: false,
        };
        engine.overlay.init();
        engine.overlay.show_loading_screen();
        engine.overlay.set_quality(engine.quality);
        engine.register_ui_handlers();
        engine
    }

    fn register_ui_handlers(&mut self) {
        self.handlers.on(UiActionKind::Quality, |engine: &mut Self, action| {
            if let UiAction::QualityChanged(tier) = action {
                engine.set_quality(*tier);
            }
        });
        self.handlers.on(UiActionKind::Fullscreen, |engine: &mut Self, _| {
            engine.requests.push(PlatformRequest::ToggleFullscreen);
        });
        self.handlers.on(UiActionKind::Audio, |engine: &mut Self, _| {
            engine
                .overlay
                .show_message("Audio toggled", DEFAULT_TOAST_DURATION);
        });
        self.handlers.on(UiActionKind::LoadingComplete, |engine: &mut Self, _| {
            if let Some(scene) = engine.scene.as_mut() {
                scene.controls.enabled = true;
            }
        });
    }

    /// Bring every subsystem up in order, reporting progress on the loading
    /// screen, then start the frame loop.
    ///
    /// The first failing stage aborts the sequence; the user sees a single
    /// generic message and nothing is retried.
    pub async fn bootstrap(
        &mut self,
        make_renderer: impl FnOnce(&RenderSettings) -> Result<R, RenderError>,
        fetcher: F,
    ) -> Result<(), BootstrapError> {
        match self.run_stages(make_renderer, fetcher).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "failed to initialize");
                self.overlay.show_message(FAILURE_MESSAGE, FAILURE_TOAST);
                Err(err)
            }
        }
    }

    async fn run_stages(
        &mut self,
        make_renderer: impl FnOnce(&RenderSettings) -> Result<R, RenderError>,
        fetcher: F,
    ) -> Result<(), BootstrapError> {
        self.overlay.update_progress(10.0, Some("Initializing renderer..."));
        self.renderer = Some(make_renderer(&self.settings)?);

        self.overlay.update_progress(20.0, Some("Setting up scene..."));
        self.scene = Some(Scene::new(self.settings.width, self.settings.height));

        self.overlay.update_progress(30.0, Some("Preparing asset loading..."));
        let mut assets = AssetManager::new(fetcher, self.bus.emitter());
        let released = self.released.clone();
        assets.set_release_hook(move |resource| released.borrow_mut().push(resource));
        self.assets = Some(assets);

        self.overlay.update_progress(40.0, Some("Initializing physics..."));
        let mut physics = PhysicsSystem::new(self.config.gravity());
        physics.init().await?;
        self.physics = Some(physics);

        self.overlay.update_progress(50.0, Some("Configuring visual effects..."));
        self.post = PostProcessing::new(self.settings.width, self.settings.height);
        self.post.bloom = BloomSettings::default();
        self.set_quality(self.quality);

        self.overlay.update_progress(60.0, Some("Loading assets..."));
        if self.load_initial_assets().await > 0 {
            self.overlay
                .show_message(ASSET_FAILURE_MESSAGE, ASSET_FAILURE_TOAST);
        }
        self.pump_events();

        self.overlay.update_progress(80.0, Some("Setting up initial scene..."));
        self.setup_initial_scene()?;

        self.overlay.update_progress(100.0, Some("Ready!"));
        self.start();
        Ok(())
    }

    /// Returns how many configured assets failed to load.
    async fn load_initial_assets(&mut self) -> usize {
        let Some(assets) = self.assets.as_mut() else {
            return 0;
        };
        let mut failed = 0;
        for spec in &self.config.assets {
            let result = match spec.kind {
                AssetKind::Model => assets
                    .load_model(&spec.name, &spec.locator, None)
                    .await
                    .map(drop),
                AssetKind::Texture => assets.load_texture(&spec.name, &spec.locator).await.map(drop),
                AssetKind::Environment => assets
                    .load_environment(&spec.name, &spec.locator)
                    .await
                    .map(drop),
            };
            if let Err(err) = result {
                tracing::warn!(name = %spec.name, error = %err, "initial asset not loaded");
                failed += 1;
            }
        }
        failed
    }

    fn setup_initial_scene(&mut self) -> Result<(), BootstrapError> {
        let (Some(scene), Some(physics)) = (self.scene.as_mut(), self.physics.as_mut()) else {
            return Ok(());
        };
        scene.set_background(self.config.background());

        let material = Material {
            color: Color::from_hex(0x8b00ff),
            emissive: Color::from_hex(0x440088),
            metalness: 0.7,
            roughness: 0.2,
        };
        let knot = SceneNode::new("example").with_mesh(
            Mesh::new(Geometry::torus_knot(1.2, 0.4, 120, 12, 2, 3)),
            material,
        );
        let id = scene.graph.add(knot);
        if let Some(node) = scene.graph.get_mut(id) {
            let body = BodyConfig {
                mass: 1.0,
                ..BodyConfig::dynamic(ColliderKind::TriMesh)
            };
            physics.add_rigid_body(id, node, &body)?;
        }
        self.example = Some(id);

        if let Some(assets) = self.assets.as_ref() {
            for spec in &self.config.assets {
                match spec.kind {
                    AssetKind::Model => {
                        if let Some(model) = assets.get_model(&spec.name) {
                            model.instantiate(&mut scene.graph);
                        }
                    }
                    AssetKind::Environment => {
                        if assets.get_environment(&spec.name).is_some() {
                            scene.set_environment(Some(spec.name.clone()));
                            self.renderer_dirty = true;
                        }
                    }
                    AssetKind::Texture => {}
                }
            }
        }
        Ok(())
    }

    /// Pin pixel ratio and bloom for `tier` and tell the user.
    pub fn set_quality(&mut self, tier: QualityTier) {
        self.quality = tier;
        apply_quality(tier, self.device_pixel_ratio, &mut self.settings, &mut self.post.bloom);
        self.renderer_dirty = true;
        self.overlay.set_quality(tier);
        self.overlay
            .show_message(format!("Quality changed to: {tier}"), DEFAULT_TOAST_DURATION);
    }

    /// The display's pixel density changed. Re-resolves the current tier
    /// without announcing it.
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if !ratio.is_finite() || ratio <= 0.0 {
            return;
        }
        self.device_pixel_ratio = ratio;
        apply_quality(self.quality, ratio, &mut self.settings, &mut self.post.bloom);
        self.renderer_dirty = true;
    }

    /// New logical surface size. Camera and post-processing follow on the
    /// next frame, through the resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.resize.resize(&mut self.settings, width, height);
        self.renderer_dirty = true;
    }

    /// Start the frame loop. Does nothing when already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.elapsed = 0.0;
        tracing::info!("frame loop started");
    }

    pub fn stop(&mut self) {
        if self.running {
            tracing::info!("frame loop stopped");
        }
        self.running = false;
    }

    /// Advance everything by `dt` and, while running, render one frame.
    pub fn frame(&mut self, dt: Duration) -> Option<R::Output> {
        self.pump_events();
        self.overlay.advance(dt);
        self.dispatch_ui_actions();
        self.release_pending();

        if !self.running {
            return None;
        }
        let dt = dt.as_secs_f32();
        self.elapsed += dt;

        let (Some(scene), Some(renderer)) = (self.scene.as_mut(), self.renderer.as_mut()) else {
            return None;
        };
        if let Some(physics) = self.physics.as_mut() {
            physics.update(dt, &mut scene.graph);
        }
        scene.update();
        if let Some(node) = self.example.and_then(|id| scene.graph.get_mut(id)) {
            if !node.is_physics_controlled() {
                node.transform.rotation = Quat::from_rotation_y(self.elapsed * SPIN_RATE);
            }
        }
        Some(renderer.render(scene, &scene.camera))
    }

    /// Hand pending surface, post-processing and environment changes to the
    /// renderer. Returns whether anything was pending.
    pub fn configure_renderer(
        &mut self,
        apply: impl FnOnce(&mut R, &RenderSettings, &PostProcessing, Option<Color>),
    ) -> bool {
        if !self.renderer_dirty {
            return false;
        }
        let tint = self.environment_tint();
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };
        apply(renderer, &self.settings, &self.post, tint);
        self.renderer_dirty = false;
        true
    }

    /// Ambient tint of the scene's environment map, if one is loaded.
    pub fn environment_tint(&self) -> Option<Color> {
        let name = self.scene.as_ref()?.environment.as_ref()?;
        let env = self.assets.as_ref()?.get_environment(name)?;
        Some(env.average_color())
    }

    /// Tear everything down: loop, physics, assets, overlay, scene meshes,
    /// then the renderer.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut physics) = self.physics.take() {
            match self.scene.as_mut() {
                Some(scene) => physics.dispose(&mut scene.graph),
                None => physics.dispose(&mut Default::default()),
            }
        }
        if let Some(mut assets) = self.assets.take() {
            assets.dispose();
        }
        self.overlay.dispose();
        let freed = self.release_pending();

        if let Some(mut scene) = self.scene.take() {
            // Instantiated models share their handles with the asset registry.
            let mut meshes = Vec::new();
            scene.graph.release_meshes(|handle| {
                if !freed.contains(&handle) {
                    meshes.push(handle);
                }
            });
            if let Some(renderer) = self.renderer.as_mut() {
                for handle in meshes {
                    renderer.release_mesh(handle);
                }
            }
        }
        self.renderer = None;
        self.example = None;
        tracing::info!("engine disposed");
    }

    /// Route queued bus events to the overlay and the resize listeners.
    fn pump_events(&mut self) {
        for event in self.bus.dispatch() {
            self.overlay.handle_event(&event);
            if let AppEvent::RendererResize { width, height } = event {
                if let Some(scene) = self.scene.as_mut() {
                    scene.on_resize(width, height);
                }
                self.post.set_size(width, height);
                self.renderer_dirty = true;
            }
        }
    }

    fn dispatch_ui_actions(&mut self) {
        let actions = self.overlay.drain_actions();
        if actions.is_empty() {
            return;
        }
        let mut handlers = std::mem::take(&mut self.handlers);
        for action in &actions {
            if !handlers.dispatch(self, action) {
                tracing::debug!(?action, "no handler for ui action");
            }
        }
        self.handlers = handlers;
    }

    /// Free renderer resources for assets the manager let go of. Returns the
    /// mesh handles that were freed.
    fn release_pending(&mut self) -> BTreeSet<MeshHandle> {
        let released: Vec<Released> = self.released.borrow_mut().drain(..).collect();
        let mut freed = BTreeSet::new();
        let Some(renderer) = self.renderer.as_mut() else {
            return freed;
        };
        for resource in released {
            if let Released::Model { meshes, .. } = resource {
                for handle in meshes {
                    if freed.insert(handle) {
                        renderer.release_mesh(handle);
                    }
                }
            }
        }
        freed
    }

    pub fn show_message(&mut self, text: impl Into<String>, duration: Duration) {
        self.overlay.show_message(text, duration);
    }

    /// Take the requests queued since the last call.
    pub fn take_requests(&mut self) -> Vec<PlatformRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    pub fn assets(&self) -> Option<&AssetManager<F>> {
        self.assets.as_ref()
    }

    pub fn physics(&self) -> Option<&PhysicsSystem> {
        self.physics.as_ref()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn post(&self) -> &PostProcessing {
        &self.post
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn example(&self) -> Option<ObjectId> {
        self.example
    }
}
