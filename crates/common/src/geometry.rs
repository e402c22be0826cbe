//! CPU-side triangle geometry shared by the renderer and the physics colliders.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Indexed (or non-indexed) triangle list with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// The index buffer, or a generated `0..vertex_count` sequence when the
    /// geometry is not indexed.
    pub fn indices_or_sequential(&self) -> Vec<u32> {
        match &self.indices {
            Some(indices) => indices.clone(),
            None => (0..self.positions.len() as u32).collect(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Axis-aligned bounds as `(min, max)`. Empty geometry yields zero bounds.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        if self.positions.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        self.positions.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), p| {
                let p = Vec3::from_array(*p);
                (min.min(p), max.max(p))
            },
        )
    }

    /// Torus knot following the `(p, q)` winding, tube swept along the curve.
    pub fn torus_knot(
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    ) -> Self {
        let curve = |u: f32| {
            let cu = u.cos();
            let su = u.sin();
            let qu_over_p = q as f32 / p as f32 * u;
            let cs = qu_over_p.cos();
            Vec3::new(
                radius * (2.0 + cs) * 0.5 * cu,
                radius * (2.0 + cs) * su * 0.5,
                radius * qu_over_p.sin() * 0.5,
            )
        };

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * p as f32 * TAU;
            let p1 = curve(u);
            let p2 = curve(u + 0.01);

            let t = p2 - p1;
            let n = p2 + p1;
            let b = t.cross(n).normalize();
            let n = b.cross(t).normalize();

            for j in 0..=radial_segments {
                let v = j as f32 / radial_segments as f32 * TAU;
                let cx = -tube * v.cos();
                let cy = tube * v.sin();
                let vertex = p1 + n * cx + b * cy;
                positions.push(vertex.to_array());
                normals.push((vertex - p1).normalize_or_zero().to_array());
            }
        }

        let mut indices = Vec::new();
        let row = radial_segments + 1;
        for j in 1..=tubular_segments {
            for i in 1..=radial_segments {
                let a = row * (j - 1) + (i - 1);
                let b = row * j + (i - 1);
                let c = row * j + i;
                let d = row * (j - 1) + i;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self {
            positions,
            normals,
            indices: Some(indices),
        }
    }

    /// Box centred on the origin with the given full extents.
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, right, up) in faces {
            let base = positions.len() as u32;
            let centre = normal * h;
            let r = right * h;
            let u = up * h;
            for corner in [centre - r - u, centre + r - u, centre + r + u, centre - r + u] {
                positions.push(corner.to_array());
                normals.push(normal.to_array());
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            positions,
            normals,
            indices: Some(indices),
        }
    }

    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for ring in 0..=rings {
            let theta = ring as f32 / rings as f32 * std::f32::consts::PI;
            for seg in 0..=segments {
                let phi = seg as f32 / segments as f32 * TAU;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                positions.push((n * radius).to_array());
                normals.push(n.to_array());
            }
        }

        let mut indices = Vec::new();
        let row = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * row + seg;
                let b = a + row;
                indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
            }
        }

        Self {
            positions,
            normals,
            indices: Some(indices),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torus_knot_vertex_and_index_counts() {
        let g = Geometry::torus_knot(1.2, 0.4, 120, 12, 2, 3);
        assert_eq!(g.vertex_count(), 121 * 13);
        assert_eq!(g.triangle_count(), 120 * 12 * 2);
        assert_eq!(g.normals.len(), g.positions.len());
        let max = *g.indices.as_ref().unwrap().iter().max().unwrap();
        assert!((max as usize) < g.vertex_count());
    }

    #[test]
    fn sequential_indices_generated_when_missing() {
        let g = Geometry {
            positions: vec![[0.0; 3]; 6],
            normals: vec![[0.0, 1.0, 0.0]; 6],
            indices: None,
        };
        assert_eq!(g.indices_or_sequential(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(g.triangle_count(), 2);
    }

    #[test]
    fn cuboid_bounds_match_size() {
        let g = Geometry::cuboid(Vec3::new(2.0, 4.0, 6.0));
        let (min, max) = g.bounds();
        assert_eq!(min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(g.vertex_count(), 24);
        assert_eq!(g.triangle_count(), 12);
    }

    #[test]
    fn sphere_points_lie_on_radius() {
        let g = Geometry::uv_sphere(2.0, 8, 6);
        for p in &g.positions {
            assert!((Vec3::from_array(*p).length() - 2.0).abs() < 1e-4);
        }
    }
}
