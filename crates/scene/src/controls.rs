use crate::camera::PerspectiveCamera;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

const EPS: f32 = 1e-6;

/// Spherical coordinates around the orbit target (Y up).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Orbit camera controls with exponential damping.
///
/// Input accumulates rotation/zoom deltas; [`OrbitControls::update`] applies a
/// fraction of them each frame, so motion eases out after input stops.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enabled: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    viewport_height: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enabled: true,
            enable_damping: true,
            damping_factor: 0.05,
            min_distance: 1.0,
            max_distance: 50.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI / 1.8,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            viewport_height: 720.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }
}

impl OrbitControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the controls to a render surface of the given size.
    pub fn set_viewport(&mut self, _width: u32, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Pointer drag in physical pixels. A drag across the full surface height
    /// turns the camera once around.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }
        self.delta_theta -= TAU * dx / self.viewport_height * self.rotate_speed;
        self.delta_phi -= TAU * dy / self.viewport_height * self.rotate_speed;
    }

    /// Scroll input: positive steps move the camera closer.
    pub fn zoom(&mut self, steps: f32) {
        if !self.enabled || steps == 0.0 {
            return;
        }
        let factor = 0.95_f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= factor;
        } else {
            self.scale /= factor;
        }
    }

    /// Whether rotation deltas are still being eased out.
    pub fn is_settling(&self) -> bool {
        self.delta_theta.abs() > EPS || self.delta_phi.abs() > EPS || (self.scale - 1.0).abs() > EPS
    }

    /// Apply pending deltas to the camera. Call once per frame.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        let mut spherical = Spherical::from_offset(camera.position - self.target);

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.position = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spherical_roundtrip() {
        let offset = Vec3::new(1.0, 2.0, 3.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-5);
    }

    #[test]
    fn distance_is_clamped() {
        let mut controls = OrbitControls::new();
        let mut cam = PerspectiveCamera::default();
        cam.position = Vec3::new(0.0, 0.0, 100.0);
        controls.update(&mut cam);
        assert!((cam.position.length() - 50.0).abs() < 1e-3);

        cam.position = Vec3::new(0.0, 0.1, 0.2);
        controls.update(&mut cam);
        assert!((cam.position.length() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_never_passes_limit() {
        let mut controls = OrbitControls::new();
        controls.enable_damping = false;
        let mut cam = PerspectiveCamera::default();
        controls.rotate(0.0, -10_000.0);
        controls.update(&mut cam);
        let phi = Spherical::from_offset(cam.position - controls.target).phi;
        assert!(phi <= PI / 1.8 + 1e-4);
    }

    #[test]
    fn damping_eases_rotation_out() {
        let mut controls = OrbitControls::new();
        let mut cam = PerspectiveCamera::default();
        controls.update(&mut cam);
        let start = cam.position;

        controls.rotate(100.0, 0.0);
        controls.update(&mut cam);
        let first_step = (cam.position - start).length();
        assert!(first_step > 0.0);
        assert!(controls.is_settling());

        let before = cam.position;
        controls.update(&mut cam);
        let second_step = (cam.position - before).length();
        assert!(second_step < first_step);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let mut controls = OrbitControls::new();
        controls.enabled = false;
        controls.rotate(50.0, 50.0);
        controls.zoom(3.0);
        assert!(!controls.is_settling());
    }

    #[test]
    fn zoom_in_moves_closer() {
        let mut controls = OrbitControls::new();
        controls.enable_damping = false;
        let mut cam = PerspectiveCamera::default();
        let before = cam.position.length();
        controls.zoom(2.0);
        controls.update(&mut cam);
        assert!(cam.position.length() < before);
    }
}
