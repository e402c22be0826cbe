use enigma_scene::{MeshHandle, PerspectiveCamera, Scene};
use std::fmt::Write;

/// Renderer-agnostic interface. All backends implement this trait.
///
/// A renderer reads the scene and a camera and produces output. It never
/// mutates the scene.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Self::Output;

    /// Drop whatever the backend holds for `handle`. Returns whether anything
    /// was held.
    fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        let _ = handle;
        false
    }
}

/// Headless renderer producing a readable summary of each frame.
///
/// Used by the CLI and by tests that exercise the frame loop without a GPU.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> String {
        self.frames += 1;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Frame {} (background=#{:06x}) ===",
            self.frames,
            scene.background.to_hex()
        );
        let _ = writeln!(out, "Objects: {}", scene.graph.len());
        let (e, t) = (camera.position, camera.target);
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            e.x, e.y, e.z, t.x, t.y, t.z, camera.fov_degrees
        );
        if let Some(env) = &scene.environment {
            let _ = writeln!(out, "Environment: {env}");
        }

        for (id, node) in scene.graph.iter() {
            let p = node.transform.position;
            let tris = node.mesh.as_ref().map_or(0, |m| m.geometry.triangle_count());
            let _ = writeln!(
                out,
                "  [{}] {} pos=({:.2}, {:.2}, {:.2}) tris={}{}",
                id.short(),
                node.name,
                p.x,
                p.y,
                p.z,
                tris,
                if node.physics.is_some() { " physics" } else { "" }
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enigma_common::{Geometry, Transform};
    use enigma_scene::{Material, Mesh, SceneNode};
    use glam::Vec3;

    #[test]
    fn empty_scene() {
        let scene = Scene::new(1280, 720);
        let mut renderer = DebugTextRenderer::new();
        let output = renderer.render(&scene, &scene.camera);
        assert!(output.contains("Frame 1"));
        assert!(output.contains("#0a0a14"));
        assert!(output.contains("Objects: 0"));
    }

    #[test]
    fn lists_nodes() {
        let mut scene = Scene::new(1280, 720);
        scene.graph.add(
            SceneNode::new("cube")
                .with_mesh(Mesh::new(Geometry::cuboid(Vec3::ONE)), Material::default())
                .with_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0))),
        );
        let mut renderer = DebugTextRenderer::new();
        renderer.render(&scene, &scene.camera);
        let output = renderer.render(&scene, &scene.camera);
        assert!(output.contains("Frame 2"));
        assert!(output.contains("cube pos=(1.00, 2.00, 3.00) tris=12"));
        assert_eq!(renderer.frames(), 2);
    }
}
