use enigma_common::Color;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Uniform light applied to every surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Orthographic shadow frustum for a directional light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Shadow map width and height in texels.
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
    /// Half the width of the square orthographic frustum.
    pub half_extent: f32,
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 2048,
            near: 0.5,
            far: 50.0,
            half_extent: 10.0,
            bias: -0.0001,
        }
    }
}

/// Light shining from `position` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    /// Present when the light casts shadows.
    pub shadow: Option<ShadowConfig>,
}

impl DirectionalLight {
    pub fn new(color: Color, intensity: f32, position: Vec3) -> Self {
        Self {
            color,
            intensity,
            position,
            target: Vec3::ZERO,
            shadow: None,
        }
    }

    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = Some(shadow);
        self
    }

    pub fn casts_shadow(&self) -> bool {
        self.shadow.is_some()
    }

    /// Unit vector pointing from the light towards its target.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Y)
    }

    /// Light-space view-projection used to render and sample the shadow map.
    pub fn light_view_projection(&self) -> Option<Mat4> {
        let shadow = self.shadow?;
        let up = if self.direction().abs_diff_eq(Vec3::Y, 1e-3)
            || self.direction().abs_diff_eq(Vec3::NEG_Y, 1e-3)
        {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, self.target, up);
        let e = shadow.half_extent;
        let proj = Mat4::orthographic_rh(-e, e, -e, e, shadow.near, shadow.far);
        Some(proj * view)
    }
}

/// The fixed lighting rig: ambient fill, a shadow-casting key light and a
/// cool back fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lights {
    pub ambient: AmbientLight,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for Lights {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: Color::WHITE,
                intensity: 0.6,
            },
            key: DirectionalLight::new(Color::WHITE, 2.0, Vec3::new(5.0, 10.0, 8.0))
                .with_shadow(ShadowConfig::default()),
            fill: DirectionalLight::new(Color::from_hex(0x8088ff), 0.7, Vec3::new(-5.0, 2.0, -8.0)),
        }
    }
}

impl Lights {
    pub fn directional(&self) -> [&DirectionalLight; 2] {
        [&self.key, &self.fill]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rig() {
        let lights = Lights::default();
        assert_eq!(lights.ambient.intensity, 0.6);
        assert!(lights.key.casts_shadow());
        assert!(!lights.fill.casts_shadow());
        assert_eq!(lights.fill.color.to_hex(), 0x8088ff);
        let shadow = lights.key.shadow.unwrap();
        assert_eq!(shadow.map_size, 2048);
        assert_eq!(shadow.bias, -0.0001);
    }

    #[test]
    fn origin_lands_inside_shadow_frustum() {
        let key = Lights::default().key;
        let clip = key.light_view_projection().unwrap() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn light_without_shadow_has_no_frustum() {
        assert!(Lights::default().fill.light_view_projection().is_none());
    }
}
