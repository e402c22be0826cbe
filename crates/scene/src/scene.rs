use crate::{Lights, OrbitControls, PerspectiveCamera, SceneGraph};
use enigma_common::Color;

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone)]
pub struct Scene {
    pub graph: SceneGraph,
    pub camera: PerspectiveCamera,
    pub lights: Lights,
    pub controls: OrbitControls,
    pub background: Color,
    /// Name of a registered environment map used for reflections.
    pub environment: Option<String>,
}

impl Scene {
    /// Build the default scene for a surface of the given logical size.
    /// Orbit controls start disabled until loading completes.
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(width, height);
        let mut controls = OrbitControls::new();
        controls.set_viewport(width, height);
        controls.enabled = false;
        Self {
            graph: SceneGraph::new(),
            camera,
            lights: Lights::default(),
            controls,
            background: Color::from_hex(0x0a0a14),
            environment: None,
        }
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn set_environment(&mut self, name: Option<String>) {
        self.environment = name;
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
        self.controls.set_viewport(width, height);
    }

    /// Advance camera controls by one frame.
    pub fn update(&mut self) {
        self.controls.update(&mut self.camera);
    }
}
